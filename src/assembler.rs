use std::{sync::Arc, time::Duration};

use log::debug;
use solana_instruction::Instruction;
use solana_pubkey::Pubkey;
use solana_sdk::{
    message::{AddressLookupTableAccount, VersionedMessage, v0},
    signature::Signer,
    transaction::VersionedTransaction,
};
use tokio::time::timeout;

use crate::{
    errors::{Error, Result},
    fragment::{AssembledTransaction, UnsignedFragment},
    lookup::{dedup_addresses, resolve_lookup_tables},
    rpc::{ChainRpc, FreshnessAnchor},
};

/// Turns instruction fragments into signed, submit-ready transactions.
#[derive(Clone)]
pub struct TransactionAssembler {
    rpc: Arc<dyn ChainRpc>,
    anchor_timeout: Duration,
}

impl TransactionAssembler {
    pub fn new(rpc: Arc<dyn ChainRpc>, anchor_timeout: Duration) -> Self {
        Self {
            rpc,
            anchor_timeout,
        }
    }

    pub fn rpc(&self) -> &Arc<dyn ChainRpc> {
        &self.rpc
    }

    pub async fn fetch_anchor(&self) -> Result<FreshnessAnchor> {
        timeout(self.anchor_timeout, self.rpc.get_latest_anchor())
            .await
            .map_err(|_| Error::Timeout {
                operation: "anchor fetch",
                after: self.anchor_timeout,
            })?
    }

    /// Fetch an anchor, resolve the fragment's lookup tables, compile one v0
    /// message paid by `payer` and sign it with every required signer.
    pub async fn assemble(
        &self,
        fragment: &UnsignedFragment,
        payer: &Pubkey,
        signers: &[&dyn Signer],
    ) -> Result<AssembledTransaction> {
        let (anchor, tables) = tokio::try_join!(
            self.fetch_anchor(),
            resolve_lookup_tables(self.rpc.as_ref(), &fragment.lookup_tables),
        )?;
        self.compile_and_sign(
            &fragment.instructions.instructions,
            &fragment.lookup_tables,
            tables,
            anchor,
            payer,
            signers,
        )
    }

    /// Like `assemble`, for callers that already hold the resolved tables.
    pub(crate) async fn assemble_resolved(
        &self,
        instructions: &[Instruction],
        tables: Vec<AddressLookupTableAccount>,
        payer: &Pubkey,
        signers: &[&dyn Signer],
    ) -> Result<AssembledTransaction> {
        let anchor = self.fetch_anchor().await?;
        let addresses: Vec<Pubkey> = tables.iter().map(|t| t.key).collect();
        self.compile_and_sign(instructions, &addresses, tables, anchor, payer, signers)
    }

    fn compile_and_sign(
        &self,
        instructions: &[Instruction],
        table_addresses: &[Pubkey],
        tables: Vec<AddressLookupTableAccount>,
        anchor: FreshnessAnchor,
        payer: &Pubkey,
        signers: &[&dyn Signer],
    ) -> Result<AssembledTransaction> {
        let message = v0::Message::try_compile(payer, instructions, &tables, anchor.blockhash)
            .map_err(|e| Error::Compile(e.to_string().into()))?;

        let required = &message.account_keys[..message.header.num_required_signatures as usize];
        let mut chosen: Vec<&dyn Signer> = Vec::with_capacity(required.len());
        for key in required {
            let signer = signers
                .iter()
                .find(|s| s.pubkey() == *key)
                .ok_or_else(|| Error::Signing(format!("missing signer {key}").into()))?;
            chosen.push(*signer);
        }

        let transaction = VersionedTransaction::try_new(VersionedMessage::V0(message), &chosen)
            .map_err(|e| Error::Signing(e.to_string().into()))?;

        debug!(
            "assembled transaction with {} instructions, {} signers, {} lookup tables",
            instructions.len(),
            chosen.len(),
            table_addresses.len()
        );

        Ok(AssembledTransaction {
            transaction,
            anchor,
            lookup_tables: dedup_addresses(table_addresses.iter().copied()),
        })
    }
}
