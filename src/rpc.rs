use async_trait::async_trait;
use futures::future::try_join_all;
use solana_account::Account;
use solana_client::{nonblocking::rpc_client::RpcClient, rpc_config::RpcSendTransactionConfig};
use solana_pubkey::Pubkey;
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, signature::Signature,
    transaction::VersionedTransaction,
};

use crate::errors::{Error, Result};

/// `getMultipleAccounts` accepts at most this many keys per request.
const MAX_MULTIPLE_ACCOUNTS: usize = 100;

/// Recent block reference bounding a transaction's validity window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreshnessAnchor {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubmitOptions {
    pub skip_preflight: bool,
    pub max_retries: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfirmationStatus {
    Pending,
    Confirmed,
    Failed(String),
    /// The anchor's validity window closed before the transaction landed.
    Expired,
}

impl ConfirmationStatus {
    pub fn is_final(&self) -> bool {
        !matches!(self, ConfirmationStatus::Pending)
    }
}

/// The chain operations the vault client needs.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn get_latest_anchor(&self) -> Result<FreshnessAnchor>;

    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>>;

    /// Results are positional: `result[i]` belongs to `addresses[i]`.
    async fn get_multiple_accounts(&self, addresses: &[Pubkey]) -> Result<Vec<Option<Account>>>;

    async fn submit(
        &self,
        transaction: &VersionedTransaction,
        options: &SubmitOptions,
    ) -> Result<Signature>;

    async fn confirm(
        &self,
        signature: &Signature,
        anchor: &FreshnessAnchor,
    ) -> Result<ConfirmationStatus>;
}

/// `ChainRpc` over the nonblocking JSON-RPC client.
pub struct SolanaRpc {
    client: RpcClient,
}

impl SolanaRpc {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_commitment(url, CommitmentConfig::confirmed())
    }

    pub fn with_commitment(url: impl Into<String>, commitment: CommitmentConfig) -> Self {
        Self {
            client: RpcClient::new_with_commitment(url.into(), commitment),
        }
    }
}

#[async_trait]
impl ChainRpc for SolanaRpc {
    async fn get_latest_anchor(&self) -> Result<FreshnessAnchor> {
        let (blockhash, last_valid_block_height) = self
            .client
            .get_latest_blockhash_with_commitment(self.client.commitment())
            .await
            .map_err(|e| Error::AnchorFetch(e.to_string().into()))?;
        Ok(FreshnessAnchor {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>> {
        self.client
            .get_account_with_commitment(address, self.client.commitment())
            .await
            .map(|response| response.value)
            .map_err(|e| Error::Rpc(e.to_string().into()))
    }

    async fn get_multiple_accounts(&self, addresses: &[Pubkey]) -> Result<Vec<Option<Account>>> {
        let chunks = try_join_all(addresses.chunks(MAX_MULTIPLE_ACCOUNTS).map(|chunk| async move {
            self.client
                .get_multiple_accounts_with_commitment(chunk, self.client.commitment())
                .await
                .map(|response| response.value)
                .map_err(|e| Error::Rpc(e.to_string().into()))
        }))
        .await?;
        Ok(chunks.into_iter().flatten().collect())
    }

    async fn submit(
        &self,
        transaction: &VersionedTransaction,
        options: &SubmitOptions,
    ) -> Result<Signature> {
        let config = RpcSendTransactionConfig {
            skip_preflight: options.skip_preflight,
            max_retries: Some(options.max_retries),
            preflight_commitment: Some(self.client.commitment().commitment),
            ..Default::default()
        };
        self.client
            .send_transaction_with_config(transaction, config)
            .await
            .map_err(|e| Error::Submission(e.to_string().into()))
    }

    async fn confirm(
        &self,
        signature: &Signature,
        anchor: &FreshnessAnchor,
    ) -> Result<ConfirmationStatus> {
        let commitment = self.client.commitment();
        let status = self
            .client
            .get_signature_status_with_commitment(signature, commitment)
            .await
            .map_err(|e| Error::Rpc(e.to_string().into()))?;

        match status {
            Some(Ok(())) => Ok(ConfirmationStatus::Confirmed),
            Some(Err(e)) => Ok(ConfirmationStatus::Failed(e.to_string())),
            None => {
                let height = self
                    .client
                    .get_block_height_with_commitment(commitment)
                    .await
                    .map_err(|e| Error::Rpc(e.to_string().into()))?;
                if height > anchor.last_valid_block_height {
                    Ok(ConfirmationStatus::Expired)
                } else {
                    Ok(ConfirmationStatus::Pending)
                }
            }
        }
    }
}
