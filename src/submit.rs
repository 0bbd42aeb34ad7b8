use std::{sync::Arc, time::Duration};

use log::{debug, info, warn};
use solana_sdk::signature::Signature;
use tokio::time::{sleep, timeout};

use crate::{
    config::VaultsConfig,
    errors::{Error, Result},
    fragment::AssembledTransaction,
    rpc::{ChainRpc, ConfirmationStatus, FreshnessAnchor, SubmitOptions},
};

/// Sends assembled transactions and polls for their confirmation.
#[derive(Clone)]
pub struct TransactionSubmitter {
    rpc: Arc<dyn ChainRpc>,
    options: SubmitOptions,
    submit_timeout: Duration,
    confirmation_polls: u32,
    confirmation_interval: Duration,
}

impl TransactionSubmitter {
    pub fn new(rpc: Arc<dyn ChainRpc>, config: &VaultsConfig) -> Self {
        Self {
            rpc,
            options: SubmitOptions {
                skip_preflight: config.skip_preflight,
                max_retries: config.submit_max_retries,
            },
            submit_timeout: config.submit_timeout(),
            confirmation_polls: config.confirmation_polls,
            confirmation_interval: config.confirmation_interval(),
        }
    }

    pub async fn submit(&self, transaction: &AssembledTransaction) -> Result<Signature> {
        let signature = timeout(
            self.submit_timeout,
            self.rpc.submit(&transaction.transaction, &self.options),
        )
        .await
        .map_err(|_| Error::Timeout {
            operation: "submit",
            after: self.submit_timeout,
        })??;
        info!("submitted transaction {signature}");
        Ok(signature)
    }

    /// Poll until the transaction reaches a final status or the poll budget
    /// runs out, in which case `Pending` is returned.
    pub async fn wait_for_confirmation(
        &self,
        signature: &Signature,
        anchor: &FreshnessAnchor,
    ) -> Result<ConfirmationStatus> {
        for attempt in 0..self.confirmation_polls {
            let status = self.rpc.confirm(signature, anchor).await?;
            if status.is_final() {
                debug!("{signature} reached {status:?} after {} polls", attempt + 1);
                return Ok(status);
            }
            sleep(self.confirmation_interval).await;
        }
        warn!(
            "{signature} still pending after {} polls",
            self.confirmation_polls
        );
        Ok(ConfirmationStatus::Pending)
    }
}
