use std::{borrow::Cow, fmt, sync::Arc, time::Duration};

use solana_pubkey::Pubkey;
use thiserror::Error;

use crate::constants::{NO_PRIOR_CREDIT_SIGNAL, NO_SOL_FUNDS_MESSAGE, UNEXPECTED_ERROR_MESSAGE};
use crate::program::AccountRole;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Typed failures of the derivation, building, assembly and merge layers.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid seed: {0}")]
    InvalidSeed(Cow<'static, str>),

    #[error("no address resolved for account role {0:?}")]
    AccountResolution(AccountRole),

    #[error("program interface unavailable for {0}")]
    ProgramInterfaceUnavailable(Pubkey),

    #[error("failed to fetch freshness anchor: {0}")]
    AnchorFetch(Cow<'static, str>),

    #[error("lookup table {0} could not be resolved")]
    LookupResolution(Pubkey),

    #[error("transaction submission failed: {0}")]
    Submission(Cow<'static, str>),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("yield vault info unavailable for token {0}")]
    ProvideLiquidity(Pubkey),

    #[error("account {0} not found")]
    NoAccountFound(Pubkey),

    #[error("rpc request failed: {0}")]
    Rpc(Cow<'static, str>),

    #[error("http request failed: {0}")]
    Http(Cow<'static, str>),

    #[error("failed to compile transaction message: {0}")]
    Compile(Cow<'static, str>),

    #[error("failed to sign transaction: {0}")]
    Signing(Cow<'static, str>),

    #[error("deserialization failed: {0}")]
    Deserialization(Cow<'static, str>),

    #[error("invalid configuration: {0}")]
    Config(Cow<'static, str>),

    #[error(transparent)]
    Math(#[from] MathError),
}

impl Error {
    /// Whether the caller may retry the same operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::AnchorFetch(_) | Error::Submission(_) | Error::Timeout { .. } | Error::Rpc(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e.to_string().into())
    }
}

#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MathError {
    #[error("Invalid Amount")]
    InvalidAmount = 0,

    #[error("Math Overflow")]
    MathOverflow = 1,

    #[error("Invalid Decimals")]
    InvalidDecimals = 2,
}

/// User-facing failure of an orchestrator operation.
///
/// The message is what a wallet UI shows; `source` keeps the typed error for
/// diagnostics.
#[derive(Clone, Debug)]
pub struct VaultError {
    pub message: String,
    pub source: Option<Arc<Error>>,
}

impl VaultError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Degrade a typed error to its user-facing message.
    pub fn from_error(error: Error) -> Self {
        let message = if error.to_string().contains(NO_PRIOR_CREDIT_SIGNAL) {
            NO_SOL_FUNDS_MESSAGE
        } else {
            UNEXPECTED_ERROR_MESSAGE
        };
        Self {
            message: message.to_string(),
            source: Some(Arc::new(error)),
        }
    }
}

impl fmt::Display for VaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for VaultError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl PartialEq for VaultError {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message
    }
}
