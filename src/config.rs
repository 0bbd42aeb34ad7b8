use std::{env, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use solana_pubkey::Pubkey;

use crate::{
    constants::*,
    errors::{Error, Result},
};

/// Deployment environment; selects a preset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Environment {
    Production,
    Development,
    Local,
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PRODUCTION" => Ok(Environment::Production),
            "DEVELOPMENT" => Ok(Environment::Development),
            "LOCAL" => Ok(Environment::Local),
            other => Err(Error::Config(format!("unknown environment {other}").into())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VaultsConfig {
    pub environment: Environment,
    pub rpc_url: String,
    #[serde(with = "pubkey_string")]
    pub vault_program: Pubkey,
    #[serde(with = "pubkey_string")]
    pub yield_vault_program: Pubkey,
    pub vault_info_url: String,
    pub swap_api_url: String,
    #[serde(with = "pubkey_string_vec")]
    pub allowed_tokens: Vec<Pubkey>,
    #[serde(default = "default_slippage_bps")]
    pub swap_slippage_bps: u16,
    #[serde(default = "default_max_accounts")]
    pub swap_max_accounts: u8,
    /// `None` re-fetches vault info on every read.
    #[serde(default = "default_info_cache_ttl_secs")]
    pub info_cache_ttl_secs: Option<u64>,
    #[serde(default = "default_anchor_timeout_ms")]
    pub anchor_timeout_ms: u64,
    #[serde(default = "default_submit_timeout_ms")]
    pub submit_timeout_ms: u64,
    #[serde(default = "default_submit_max_retries")]
    pub submit_max_retries: usize,
    #[serde(default = "default_skip_preflight")]
    pub skip_preflight: bool,
    #[serde(default = "default_confirmation_polls")]
    pub confirmation_polls: u32,
    #[serde(default = "default_confirmation_interval_ms")]
    pub confirmation_interval_ms: u64,
}

fn default_slippage_bps() -> u16 {
    DEFAULT_SWAP_SLIPPAGE_BPS
}
fn default_max_accounts() -> u8 {
    DEFAULT_SWAP_MAX_ACCOUNTS
}
fn default_info_cache_ttl_secs() -> Option<u64> {
    Some(30)
}
fn default_anchor_timeout_ms() -> u64 {
    10_000
}
fn default_submit_timeout_ms() -> u64 {
    30_000
}
fn default_submit_max_retries() -> usize {
    2
}
fn default_skip_preflight() -> bool {
    true
}
fn default_confirmation_polls() -> u32 {
    DEFAULT_CONFIRMATION_POLLS
}
fn default_confirmation_interval_ms() -> u64 {
    500
}

impl VaultsConfig {
    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            vault_program: VAULT_PROGRAM,
            yield_vault_program: YIELD_VAULT_PROGRAM,
            vault_info_url: "https://merv2-api.mercurial.finance/vault_info".to_string(),
            swap_api_url: "https://quote-api.jup.ag/v6".to_string(),
            allowed_tokens: vec![USDC_MINT, USDT_MINT, NATIVE_MINT],
            ..Self::defaults()
        }
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            rpc_url: "https://api.devnet.solana.com".to_string(),
            vault_info_url: "https://dev-keeper.raccoons.dev/vault_info".to_string(),
            allowed_tokens: vec![DEVNET_USDC_MINT, NATIVE_MINT],
            ..Self::production()
        }
    }

    pub fn local() -> Self {
        Self {
            environment: Environment::Local,
            rpc_url: "http://127.0.0.1:8899".to_string(),
            yield_vault_program: YIELD_VAULT_PROGRAM_LOCAL,
            ..Self::development()
        }
    }

    fn defaults() -> Self {
        Self {
            environment: Environment::Local,
            rpc_url: String::new(),
            vault_program: VAULT_PROGRAM,
            yield_vault_program: YIELD_VAULT_PROGRAM,
            vault_info_url: String::new(),
            swap_api_url: String::new(),
            allowed_tokens: Vec::new(),
            swap_slippage_bps: default_slippage_bps(),
            swap_max_accounts: default_max_accounts(),
            info_cache_ttl_secs: default_info_cache_ttl_secs(),
            anchor_timeout_ms: default_anchor_timeout_ms(),
            submit_timeout_ms: default_submit_timeout_ms(),
            submit_max_retries: default_submit_max_retries(),
            skip_preflight: default_skip_preflight(),
            confirmation_polls: default_confirmation_polls(),
            confirmation_interval_ms: default_confirmation_interval_ms(),
        }
    }

    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::production(),
            Environment::Development => Self::development(),
            Environment::Local => Self::local(),
        }
    }

    /// Preset chosen by `VAULTS_ENV` (default production), with the RPC
    /// endpoint overridable through `SOLANA_RPC_URL`.
    pub fn from_env() -> Result<Self> {
        let environment = match env::var("VAULTS_ENV") {
            Ok(value) => value.parse()?,
            Err(_) => Environment::Production,
        };
        let mut config = Self::for_environment(environment);
        if let Ok(rpc_url) = env::var("SOLANA_RPC_URL") {
            config.rpc_url = rpc_url;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(e.to_string().into()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() {
            return Err(Error::Config("rpc_url is empty".into()));
        }
        if self.vault_info_url.is_empty() {
            return Err(Error::Config("vault_info_url is empty".into()));
        }
        if self.swap_slippage_bps > 10_000 {
            return Err(Error::Config(
                format!("slippage {} bps exceeds 100%", self.swap_slippage_bps).into(),
            ));
        }
        Ok(())
    }

    pub fn is_allowed_token(&self, mint: &Pubkey) -> bool {
        self.allowed_tokens.contains(mint)
    }

    pub fn info_cache_ttl(&self) -> Option<Duration> {
        self.info_cache_ttl_secs.map(Duration::from_secs)
    }

    pub fn anchor_timeout(&self) -> Duration {
        Duration::from_millis(self.anchor_timeout_ms)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    pub fn confirmation_interval(&self) -> Duration {
        Duration::from_millis(self.confirmation_interval_ms)
    }
}

/// Base58 string (de)serialization for a `Pubkey`.
pub mod pubkey_string {
    use std::str::FromStr;

    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};
    use solana_pubkey::Pubkey;

    pub fn serialize<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&key.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
        let s = String::deserialize(deserializer)?;
        Pubkey::from_str(&s).map_err(D::Error::custom)
    }
}

pub mod pubkey_string_vec {
    use std::str::FromStr;

    use serde::{Deserialize, Deserializer, Serializer, de::Error as _, ser::SerializeSeq};
    use solana_pubkey::Pubkey;

    pub fn serialize<S: Serializer>(keys: &[Pubkey], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(keys.len()))?;
        for key in keys {
            seq.serialize_element(&key.to_string())?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Pubkey>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|s| Pubkey::from_str(s).map_err(D::Error::custom))
            .collect()
    }
}
