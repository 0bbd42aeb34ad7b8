use futures::future::try_join_all;
use log::debug;
use solana_instruction::{AccountMeta, Instruction};
use solana_pubkey::Pubkey;
use solana_sdk::{
    address_lookup_table::state::AddressLookupTable,
    message::{AddressLookupTableAccount, VersionedMessage},
};

use crate::{
    errors::{Error, Result},
    rpc::ChainRpc,
};

/// Keep the first occurrence of every address.
pub fn dedup_addresses(addresses: impl IntoIterator<Item = Pubkey>) -> Vec<Pubkey> {
    let mut unique = Vec::new();
    for address in addresses {
        if !unique.contains(&address) {
            unique.push(address);
        }
    }
    unique
}

pub fn decode_lookup_table(address: Pubkey, data: &[u8]) -> Result<AddressLookupTableAccount> {
    let table = AddressLookupTable::deserialize(data)
        .map_err(|e| Error::Deserialization(format!("lookup table {address}: {e}").into()))?;
    Ok(AddressLookupTableAccount {
        key: address,
        addresses: table.addresses.to_vec(),
    })
}

/// Fetch and decode every table, one request per unique address.
///
/// A table with no account on-chain is a fatal `LookupResolution` error.
pub async fn resolve_lookup_tables(
    rpc: &dyn ChainRpc,
    addresses: &[Pubkey],
) -> Result<Vec<AddressLookupTableAccount>> {
    let unique = dedup_addresses(addresses.iter().copied());
    if !unique.is_empty() {
        debug!("resolving {} lookup tables", unique.len());
    }
    try_join_all(unique.into_iter().map(|address| async move {
        let account = rpc
            .get_account(&address)
            .await?
            .ok_or(Error::LookupResolution(address))?;
        decode_lookup_table(address, &account.data)
    }))
    .await
}

/// Rebuild the instruction list of a compiled message.
///
/// Loaded keys follow the static keys: all writable keys of every lookup in
/// order, then all readonly keys. Every table the message references must be
/// present in `tables`.
pub fn decompile(
    message: &VersionedMessage,
    tables: &[AddressLookupTableAccount],
) -> Result<Vec<Instruction>> {
    let header = message.header();
    let static_keys = message.static_account_keys();
    let num_signed = header.num_required_signatures as usize;
    let num_readonly_signed = header.num_readonly_signed_accounts as usize;
    let num_readonly_unsigned = header.num_readonly_unsigned_accounts as usize;

    let mut keys: Vec<(Pubkey, bool)> = static_keys
        .iter()
        .enumerate()
        .map(|(i, key)| {
            let is_writable = if i < num_signed {
                i < num_signed.saturating_sub(num_readonly_signed)
            } else {
                i < static_keys.len().saturating_sub(num_readonly_unsigned)
            };
            (*key, is_writable)
        })
        .collect();

    if let Some(lookups) = message.address_table_lookups() {
        let mut writable = Vec::new();
        let mut readonly = Vec::new();
        for lookup in lookups {
            let table = tables
                .iter()
                .find(|t| t.key == lookup.account_key)
                .ok_or(Error::LookupResolution(lookup.account_key))?;
            let load = |index: &u8| {
                table.addresses.get(*index as usize).copied().ok_or_else(|| {
                    Error::Deserialization(
                        format!("index {index} out of range for table {}", table.key).into(),
                    )
                })
            };
            for index in &lookup.writable_indexes {
                writable.push((load(index)?, true));
            }
            for index in &lookup.readonly_indexes {
                readonly.push((load(index)?, false));
            }
        }
        keys.extend(writable);
        keys.extend(readonly);
    }

    let key_at = |index: u8| {
        keys.get(index as usize).copied().ok_or_else(|| {
            Error::Deserialization(format!("account index {index} out of range").into())
        })
    };

    message
        .instructions()
        .iter()
        .map(|compiled| {
            let (program_id, _) = key_at(compiled.program_id_index)?;
            let accounts = compiled
                .accounts
                .iter()
                .map(|index| {
                    let (pubkey, is_writable) = key_at(*index)?;
                    let is_signer = (*index as usize) < num_signed;
                    Ok(AccountMeta {
                        pubkey,
                        is_signer,
                        is_writable,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Instruction {
                program_id,
                accounts,
                data: compiled.data.clone(),
            })
        })
        .collect()
}
