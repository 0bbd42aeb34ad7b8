use std::{
    str::FromStr,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use solana_pubkey::Pubkey;
use tokio::sync::RwLock;

use crate::errors::{Error, Result};

/// One yield-protocol vault as reported by the info endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VaultInfo {
    pub symbol: String,
    pub token_address: String,
    /// The yield vault's own address.
    pub pubkey: String,
    pub lp_mint: String,
    pub virtual_price: String,
    pub closest_apy: f64,
    pub average_apy: f64,
    pub long_apy: f64,
    #[serde(default)]
    pub is_monitoring: bool,
    #[serde(default)]
    pub vault_order: u32,
    #[serde(default)]
    pub usd_rate: f64,
    #[serde(default)]
    pub earned_amount: f64,
    #[serde(default)]
    pub enabled: u8,
    #[serde(default)]
    pub fee_pubkey: String,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub total_amount_with_profit: f64,
    #[serde(default)]
    pub token_amount: f64,
    #[serde(default)]
    pub fee_amount: f64,
    #[serde(default)]
    pub lp_supply: f64,
    #[serde(default)]
    pub earned_usd_amount: f64,
    #[serde(default)]
    pub strategies: Vec<VaultStrategy>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VaultStrategy {
    pub pubkey: String,
    #[serde(default)]
    pub reserve: String,
    #[serde(default)]
    pub strategy_type: String,
    #[serde(default)]
    pub strategy_name: String,
    #[serde(default)]
    pub liquidity: f64,
    #[serde(default)]
    pub max_allocation: f64,
    #[serde(default)]
    pub isolated: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub safe_utilization_threshold: f64,
}

fn parse_pubkey(field: &str, value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value)
        .map_err(|e| Error::Deserialization(format!("vault info {field} {value}: {e}").into()))
}

impl VaultInfo {
    pub fn token_mint(&self) -> Result<Pubkey> {
        parse_pubkey("token_address", &self.token_address)
    }

    pub fn vault_address(&self) -> Result<Pubkey> {
        parse_pubkey("pubkey", &self.pubkey)
    }

    pub fn lp_mint_address(&self) -> Result<Pubkey> {
        parse_pubkey("lp_mint", &self.lp_mint)
    }

    pub fn virtual_price(&self) -> Result<f64> {
        self.virtual_price.parse().map_err(|e| {
            Error::Deserialization(
                format!("vault info virtual_price {}: {e}", self.virtual_price).into(),
            )
        })
    }

    pub fn is_for_token(&self, token: &Pubkey) -> bool {
        self.token_address == token.to_string()
    }
}

/// Source of the full vault-info snapshot.
#[async_trait]
pub trait VaultInfoSource: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<VaultInfo>>;
}

/// `GET <url>` returning a JSON array of `VaultInfo`.
pub struct HttpVaultInfoSource {
    client: reqwest::Client,
    url: String,
}

impl HttpVaultInfoSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl VaultInfoSource for HttpVaultInfoSource {
    async fn fetch_all(&self) -> Result<Vec<VaultInfo>> {
        let vaults = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<VaultInfo>>()
            .await?;
        debug!("fetched {} vault infos from {}", vaults.len(), self.url);
        Ok(vaults)
    }
}

struct Snapshot {
    fetched_at: Instant,
    vaults: Arc<Vec<VaultInfo>>,
}

/// Memoizes the vault-info snapshot for `ttl`; without a TTL every read
/// fetches.
pub struct VaultInfoCache {
    source: Arc<dyn VaultInfoSource>,
    ttl: Option<Duration>,
    snapshot: RwLock<Option<Snapshot>>,
}

impl VaultInfoCache {
    pub fn new(source: Arc<dyn VaultInfoSource>, ttl: Option<Duration>) -> Self {
        Self {
            source,
            ttl,
            snapshot: RwLock::new(None),
        }
    }

    pub async fn get_vault_info(&self, token: &Pubkey) -> Result<Option<VaultInfo>> {
        let vaults = self.snapshot().await?;
        Ok(vaults.iter().find(|v| v.is_for_token(token)).cloned())
    }

    pub async fn snapshot(&self) -> Result<Arc<Vec<VaultInfo>>> {
        let Some(ttl) = self.ttl else {
            return Ok(Arc::new(self.source.fetch_all().await?));
        };

        if let Some(vaults) = Self::fresh(&*self.snapshot.read().await, ttl) {
            return Ok(vaults);
        }

        let mut guard = self.snapshot.write().await;
        // Another reader may have refreshed while we waited for the lock.
        if let Some(vaults) = Self::fresh(&guard, ttl) {
            return Ok(vaults);
        }
        let vaults = Arc::new(self.source.fetch_all().await?);
        *guard = Some(Snapshot {
            fetched_at: Instant::now(),
            vaults: vaults.clone(),
        });
        Ok(vaults)
    }

    pub async fn invalidate(&self) {
        *self.snapshot.write().await = None;
    }

    fn fresh(snapshot: &Option<Snapshot>, ttl: Duration) -> Option<Arc<Vec<VaultInfo>>> {
        snapshot
            .as_ref()
            .filter(|s| s.fetched_at.elapsed() < ttl)
            .map(|s| s.vaults.clone())
    }
}
