use std::str::FromStr;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use solana_instruction::{AccountMeta, Instruction};
use solana_pubkey::Pubkey;

use crate::{
    errors::{Error, Result},
    fragment::{InstructionSet, UnsignedFragment},
};

/// Aggregator quote. Fields the client does not read are kept in `extra` so
/// the quote can be posted back unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub input_mint: String,
    pub in_amount: String,
    pub output_mint: String,
    pub out_amount: String,
    #[serde(default)]
    pub other_amount_threshold: String,
    #[serde(default)]
    pub swap_mode: String,
    #[serde(default)]
    pub slippage_bps: u16,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Swap routing collaborator. Transport and decoding failures surface as
/// `None`; callers treat that as "no route".
#[async_trait]
pub trait SwapAggregator: Send + Sync {
    async fn get_quote(
        &self,
        input_mint: &Pubkey,
        output_mint: &Pubkey,
        amount: u64,
        slippage_bps: u16,
    ) -> Option<Quote>;

    async fn get_swap_instructions(&self, quote: &Quote, wallet: &Pubkey)
    -> Option<UnsignedFragment>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiAccountMeta {
    pubkey: String,
    is_signer: bool,
    is_writable: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiInstruction {
    program_id: String,
    accounts: Vec<ApiAccountMeta>,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapInstructionsResponse {
    swap_instruction: ApiInstruction,
    #[serde(default)]
    address_lookup_table_addresses: Vec<String>,
}

fn parse_key(value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value)
        .map_err(|e| Error::Deserialization(format!("aggregator key {value}: {e}").into()))
}

impl ApiInstruction {
    fn into_instruction(self) -> Result<Instruction> {
        let accounts = self
            .accounts
            .iter()
            .map(|meta| {
                let pubkey = parse_key(&meta.pubkey)?;
                Ok(if meta.is_writable {
                    AccountMeta::new(pubkey, meta.is_signer)
                } else {
                    AccountMeta::new_readonly(pubkey, meta.is_signer)
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let data = STANDARD
            .decode(&self.data)
            .map_err(|e| Error::Deserialization(format!("swap instruction data: {e}").into()))?;
        Ok(Instruction {
            program_id: parse_key(&self.program_id)?,
            accounts,
            data,
        })
    }
}

impl SwapInstructionsResponse {
    fn into_fragment(self) -> Result<UnsignedFragment> {
        let tables = self
            .address_lookup_table_addresses
            .iter()
            .map(|address| parse_key(address))
            .collect::<Result<Vec<_>>>()?;
        let instruction = self.swap_instruction.into_instruction()?;
        Ok(UnsignedFragment::new(InstructionSet::from(instruction), tables))
    }
}

/// Jupiter-compatible aggregator over HTTP.
pub struct JupiterClient {
    client: reqwest::Client,
    base_url: String,
    max_accounts: u8,
}

impl JupiterClient {
    pub fn new(base_url: impl Into<String>, max_accounts: u8) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, max_accounts)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>, max_accounts: u8) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_accounts,
        }
    }

    async fn fetch_quote(
        &self,
        input_mint: &Pubkey,
        output_mint: &Pubkey,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<Quote> {
        let quote = self
            .client
            .get(format!("{}/quote", self.base_url))
            .query(&[
                ("inputMint", input_mint.to_string()),
                ("outputMint", output_mint.to_string()),
                ("amount", amount.to_string()),
                ("slippageBps", slippage_bps.to_string()),
                ("swapMode", "ExactIn".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<Quote>()
            .await?;
        Ok(quote)
    }

    async fn fetch_swap_instructions(
        &self,
        quote: &Quote,
        wallet: &Pubkey,
    ) -> Result<UnsignedFragment> {
        let body = json!({
            "quoteResponse": quote,
            "userPublicKey": wallet.to_string(),
            "maxAccounts": self.max_accounts,
        });
        self.client
            .post(format!("{}/swap-instructions", self.base_url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<SwapInstructionsResponse>()
            .await?
            .into_fragment()
    }
}

#[async_trait]
impl SwapAggregator for JupiterClient {
    async fn get_quote(
        &self,
        input_mint: &Pubkey,
        output_mint: &Pubkey,
        amount: u64,
        slippage_bps: u16,
    ) -> Option<Quote> {
        match self
            .fetch_quote(input_mint, output_mint, amount, slippage_bps)
            .await
        {
            Ok(quote) => {
                debug!(
                    "quote {input_mint} -> {output_mint}: {} in, {} out",
                    quote.in_amount, quote.out_amount
                );
                Some(quote)
            }
            Err(e) => {
                warn!("quote {input_mint} -> {output_mint} failed: {e}");
                None
            }
        }
    }

    async fn get_swap_instructions(
        &self,
        quote: &Quote,
        wallet: &Pubkey,
    ) -> Option<UnsignedFragment> {
        self.fetch_swap_instructions(quote, wallet)
            .await
            .inspect_err(|e| warn!("swap instructions for {wallet} failed: {e}"))
            .ok()
    }
}
