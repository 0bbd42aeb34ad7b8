//! Client for a Solana savings-vault program: derives the program's
//! accounts, builds its instructions, merges multi-step flows into single
//! versioned transactions and submits them.

pub mod assembler;
pub mod config;
pub mod constants;
pub mod derive;
pub mod errors;
pub mod fragment;
pub mod info;
pub mod locks;
pub mod lookup;
pub mod math;
pub mod merger;
pub mod orchestrator;
pub mod program;
pub mod rpc;
pub mod state;
pub mod submit;
pub mod swap;
pub mod token;
pub mod yield_protocol;

pub use config::{Environment, VaultsConfig};
pub use errors::{Error, Result, VaultError};
pub use orchestrator::{Collaborators, TxSuccess, VaultOrchestrator, VaultUpdate};
pub use state::{SpareLevel, VaultDescriptor, VaultEarningsData};
