use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use solana_pubkey::Pubkey;

const DISCRIMINATOR_SIZE: usize = 8;
const NAME_CAPACITY: usize = 32;
const IDENTIFIER_CAPACITY: usize = 32;

/// Auto-routing of excess token balance into a vault.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpareLevel {
    #[default]
    None,
    Spare,
    Spare2X,
    Spare3X,
}

impl SpareLevel {
    /// Variant index used by the vault program's argument encoding.
    pub fn as_u8(self) -> u8 {
        match self {
            SpareLevel::None => 0,
            SpareLevel::Spare => 1,
            SpareLevel::Spare2X => 2,
            SpareLevel::Spare3X => 3,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(SpareLevel::None),
            1 => Some(SpareLevel::Spare),
            2 => Some(SpareLevel::Spare2X),
            3 => Some(SpareLevel::Spare3X),
            _ => None,
        }
    }

    pub fn is_enabled(self) -> bool {
        self != SpareLevel::None
    }
}

/// A user's configured vault, as listed from the program's data account and
/// enriched with balances and token metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct VaultDescriptor {
    pub name: String,
    pub token_address: Pubkey,
    pub owner_address: Pubkey,
    pub account_address: Pubkey,
    pub identifier: String,
    pub spare: SpareLevel,
    pub earnings_enabled: bool,
    pub token_decimals: u8,
    /// UI balance; see `VaultOrchestrator::load_vaults` for the policy.
    pub balance: f64,
    pub symbol: Option<String>,
    pub logo_uri: Option<String>,
    pub earnings: Option<VaultEarningsData>,
}

impl VaultDescriptor {
    pub fn identifier_bytes(&self) -> &[u8] {
        self.identifier.as_bytes()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VaultEarningsData {
    pub amount_in_tokens: f64,
    pub amount_lp_tokens: u64,
    pub lp_token_decimals: u8,
    pub virtual_price: f64,
    pub one_hour_apy: f64,
    pub average_apy: f64,
    pub seven_days_apy: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EarningsErrorKind {
    VaultNotLoaded,
    UserNotActive,
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EarningsError {
    pub kind: EarningsErrorKind,
    pub message: String,
}

impl EarningsError {
    pub fn vault_not_loaded() -> Self {
        Self {
            kind: EarningsErrorKind::VaultNotLoaded,
            message: "Couldn't load data from vault".to_string(),
        }
    }

    pub fn user_not_active() -> Self {
        Self {
            kind: EarningsErrorKind::UserNotActive,
            message: "Vault not initialized".to_string(),
        }
    }

    pub fn unknown() -> Self {
        Self {
            kind: EarningsErrorKind::Unknown,
            message: "Unknown error".to_string(),
        }
    }
}

/// Display metadata for a fungible token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    #[serde(with = "crate::config::pubkey_string")]
    pub address: Pubkey,
    pub symbol: String,
    pub decimals: u8,
    #[serde(default)]
    pub logo_uri: Option<String>,
}

/// The vault program's per-owner data account.
///
/// Layout (after the 8-byte account discriminator):
///
/// ```text
/// [0..32]   owner
/// [32..36]  record count: u32 (little-endian)
/// [36..]    records, VaultRecord::LEN bytes each
/// ```
#[derive(Clone, Debug)]
pub struct VaultManagerAccount {
    pub owner: Pubkey,
    pub records: Vec<VaultRecord>,
}

impl VaultManagerAccount {
    pub fn load(account_data: &[u8]) -> Result<Self> {
        let d = DISCRIMINATOR_SIZE;
        if account_data.len() < d + 36 {
            bail!("vault manager account too small: {} bytes", account_data.len());
        }

        let owner = Pubkey::new_from_array(account_data[d..d + 32].try_into()?);
        let count = u32::from_le_bytes(account_data[d + 32..d + 36].try_into()?) as usize;

        let body = &account_data[d + 36..];
        let needed = count
            .checked_mul(VaultRecord::LEN)
            .ok_or_else(|| anyhow::anyhow!("record count overflow"))?;
        if body.len() < needed {
            bail!("vault manager account truncated: {count} records need {needed} bytes");
        }

        let records = body
            .chunks_exact(VaultRecord::LEN)
            .take(count)
            .map(VaultRecord::load)
            .collect::<Result<Vec<_>>>()?;

        Ok(VaultManagerAccount { owner, records })
    }

    /// Records of vaults that exist; deleted slots have an empty name.
    pub fn active_records(&self) -> impl Iterator<Item = &VaultRecord> {
        self.records.iter().filter(|r| r.name_length > 0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VaultRecord {
    pub name: [u8; NAME_CAPACITY],
    pub name_length: u8,
    pub identifier: [u8; IDENTIFIER_CAPACITY],
    pub identifier_length: u8,
    pub token_pubkey: Pubkey,
    pub pubkey: Pubkey,
    pub owner_pubkey: Pubkey,
    pub spare_type: u8,
    pub earnings_enabled: bool,
}

impl VaultRecord {
    pub const LEN: usize = NAME_CAPACITY + 1 + IDENTIFIER_CAPACITY + 1 + 32 * 3 + 1 + 1;

    pub fn load(data: &[u8]) -> Result<Self> {
        if data.len() < Self::LEN {
            bail!("vault record too small: {} bytes", data.len());
        }
        Ok(VaultRecord {
            name: data[0..32].try_into()?,
            name_length: data[32],
            identifier: data[33..65].try_into()?,
            identifier_length: data[65],
            token_pubkey: Pubkey::new_from_array(data[66..98].try_into()?),
            pubkey: Pubkey::new_from_array(data[98..130].try_into()?),
            owner_pubkey: Pubkey::new_from_array(data[130..162].try_into()?),
            spare_type: data[162],
            earnings_enabled: data[163] != 0,
        })
    }

    pub fn name(&self) -> String {
        let len = (self.name_length as usize).min(NAME_CAPACITY);
        String::from_utf8_lossy(&self.name[..len]).into_owned()
    }

    pub fn identifier(&self) -> String {
        let len = (self.identifier_length as usize).min(IDENTIFIER_CAPACITY);
        String::from_utf8_lossy(&self.identifier[..len]).into_owned()
    }

    pub fn spare(&self) -> SpareLevel {
        SpareLevel::from_u8(self.spare_type).unwrap_or_default()
    }

    /// Descriptor with zero balance and no token metadata yet.
    pub fn to_descriptor(&self) -> VaultDescriptor {
        VaultDescriptor {
            name: self.name(),
            token_address: self.token_pubkey,
            owner_address: self.owner_pubkey,
            account_address: self.pubkey,
            identifier: self.identifier(),
            spare: self.spare(),
            earnings_enabled: self.earnings_enabled,
            token_decimals: 0,
            balance: 0.0,
            symbol: None,
            logo_uri: None,
            earnings: None,
        }
    }

    /// Inverse of `load`, used to seed fixtures.
    pub fn pack(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::LEN);
        out.extend_from_slice(&self.name);
        out.push(self.name_length);
        out.extend_from_slice(&self.identifier);
        out.push(self.identifier_length);
        out.extend_from_slice(self.token_pubkey.as_ref());
        out.extend_from_slice(self.pubkey.as_ref());
        out.extend_from_slice(self.owner_pubkey.as_ref());
        out.push(self.spare_type);
        out.push(self.earnings_enabled as u8);
        out
    }
}

/// Build a fixed-width field from a string, truncating at `N` bytes.
pub fn fixed_bytes<const N: usize>(value: &str) -> ([u8; N], u8) {
    let mut out = [0u8; N];
    let len = value.len().min(N);
    out[..len].copy_from_slice(&value.as_bytes()[..len]);
    (out, len as u8)
}

/// Serialize a vault manager account, discriminator included.
pub fn pack_vault_manager(owner: &Pubkey, records: &[VaultRecord]) -> Vec<u8> {
    let mut out = vec![0u8; DISCRIMINATOR_SIZE];
    out.extend_from_slice(owner.as_ref());
    out.extend_from_slice(&(records.len() as u32).to_le_bytes());
    for record in records {
        out.extend_from_slice(&record.pack());
    }
    out
}
