use solana_pubkey::Pubkey;

use crate::{
    constants::*,
    errors::{Error, Result},
};

/// Derive a program-owned address from `seeds` under `program_id`.
///
/// Seeds are used in the order given; the canonical bump is discarded.
pub fn derive(seeds: &[&[u8]], program_id: &Pubkey) -> Result<Pubkey> {
    if seeds.len() > MAX_SEEDS - 1 {
        return Err(Error::InvalidSeed(
            format!("{} seeds exceed the limit of {}", seeds.len(), MAX_SEEDS - 1).into(),
        ));
    }
    if let Some((index, seed)) = seeds
        .iter()
        .enumerate()
        .find(|(_, seed)| seed.len() > MAX_SEED_LEN)
    {
        return Err(Error::InvalidSeed(
            format!(
                "seed {index} is {} bytes, limit is {MAX_SEED_LEN}",
                seed.len()
            )
            .into(),
        ));
    }
    Pubkey::try_find_program_address(seeds, program_id)
        .map(|(address, _)| address)
        .ok_or_else(|| Error::InvalidSeed("no viable bump seed".into()))
}

/// Addresses of the vault program's accounts for one owner.
///
/// Every address is `derive([tag, owner, (identifier)])`; the seed order is
/// fixed by accounts already created on-chain.
#[derive(Clone, Copy, Debug)]
pub struct VaultAddresses {
    pub owner: Pubkey,
    pub program_id: Pubkey,
}

impl VaultAddresses {
    pub fn new(owner: Pubkey, program_id: Pubkey) -> Self {
        Self { owner, program_id }
    }

    /// The owner's vault-manager data account listing every vault.
    pub fn data_account(&self) -> Result<Pubkey> {
        derive(&[VAULTS_PDA_DATA_SEED, self.owner.as_ref()], &self.program_id)
    }

    /// Token account holding a vault's balance.
    pub fn vault_account(&self, identifier: &[u8]) -> Result<Pubkey> {
        derive(
            &[VAULTS_PDA_ACCOUNT_SEED, self.owner.as_ref(), identifier],
            &self.program_id,
        )
    }

    /// Authority over `vault_account`; also owns the vault's LP position.
    pub fn vault_account_owner(&self, identifier: &[u8]) -> Result<Pubkey> {
        derive(
            &[VAULTS_PDA_ACCOUNT_OWNER_SEED, self.owner.as_ref(), identifier],
            &self.program_id,
        )
    }

    /// Checkpoint of the owner's token balance used by diff-balance deposits.
    pub fn ledger_account(&self) -> Result<Pubkey> {
        derive(&[LEDGER_PDA_DATA_SEED, self.owner.as_ref()], &self.program_id)
    }
}

/// Token vault of a yield-protocol vault.
pub fn derive_yield_token_vault(yield_vault: &Pubkey, yield_program: &Pubkey) -> Result<Pubkey> {
    derive(&[TOKEN_VAULT_SEED, yield_vault.as_ref()], yield_program)
}
