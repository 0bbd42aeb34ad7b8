use log::debug;
use solana_instruction::Instruction;
use solana_pubkey::Pubkey;
use solana_sdk::signature::Signer;

use crate::{
    assembler::TransactionAssembler,
    errors::Result,
    fragment::{AssembledTransaction, Fragment},
    lookup::{decompile, dedup_addresses, resolve_lookup_tables},
};

/// Merges independently built fragments into one atomic transaction.
///
/// Assembled fragments are decompiled back to instructions, so nothing of
/// their anchor or signatures survives; the result is compiled and signed
/// afresh. Instruction order is exactly the caller's fragment order.
#[derive(Clone)]
pub struct TransactionMerger {
    assembler: TransactionAssembler,
}

impl TransactionMerger {
    pub fn new(assembler: TransactionAssembler) -> Self {
        Self { assembler }
    }

    pub async fn merge(
        &self,
        fragments: Vec<Fragment>,
        payer: &Pubkey,
        signers: &[&dyn Signer],
    ) -> Result<AssembledTransaction> {
        let table_addresses = dedup_addresses(fragments.iter().flat_map(|f| match f {
            Fragment::Unsigned(fragment) => fragment.lookup_tables.clone(),
            Fragment::Assembled(tx) => tx
                .lookup_tables
                .iter()
                .copied()
                .chain(tx.referenced_lookup_tables())
                .collect(),
        }));

        let tables =
            resolve_lookup_tables(self.assembler.rpc().as_ref(), &table_addresses).await?;

        let mut instructions: Vec<Instruction> = Vec::new();
        for fragment in &fragments {
            match fragment {
                Fragment::Unsigned(fragment) => {
                    instructions.extend(fragment.instructions.instructions.iter().cloned())
                }
                Fragment::Assembled(tx) => instructions.extend(decompile(tx.message(), &tables)?),
            }
        }

        debug!(
            "merging {} fragments into {} instructions over {} lookup tables",
            fragments.len(),
            instructions.len(),
            tables.len()
        );

        self.assembler
            .assemble_resolved(&instructions, tables, payer, signers)
            .await
    }

}
