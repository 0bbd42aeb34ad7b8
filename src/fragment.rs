use solana_instruction::Instruction;
use solana_pubkey::Pubkey;
use solana_sdk::{
    message::VersionedMessage, signature::Signature, transaction::VersionedTransaction,
};

use crate::rpc::FreshnessAnchor;

/// Ordered instructions plus the keys that must sign them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstructionSet {
    pub instructions: Vec<Instruction>,
    pub signers: Vec<Pubkey>,
}

impl InstructionSet {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        let mut signers: Vec<Pubkey> = Vec::new();
        for meta in instructions.iter().flat_map(|ix| ix.accounts.iter()) {
            if meta.is_signer && !signers.contains(&meta.pubkey) {
                signers.push(meta.pubkey);
            }
        }
        Self {
            instructions,
            signers,
        }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Append `other` after this set's instructions.
    pub fn extend(&mut self, other: InstructionSet) {
        for signer in other.signers {
            if !self.signers.contains(&signer) {
                self.signers.push(signer);
            }
        }
        self.instructions.extend(other.instructions);
    }
}

impl From<Instruction> for InstructionSet {
    fn from(instruction: Instruction) -> Self {
        InstructionSet::new(vec![instruction])
    }
}

impl From<Vec<Instruction>> for InstructionSet {
    fn from(instructions: Vec<Instruction>) -> Self {
        InstructionSet::new(instructions)
    }
}

/// Instructions not yet bound to an anchor, with the lookup tables they may use.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnsignedFragment {
    pub instructions: InstructionSet,
    pub lookup_tables: Vec<Pubkey>,
}

impl UnsignedFragment {
    pub fn new(instructions: InstructionSet, lookup_tables: Vec<Pubkey>) -> Self {
        let mut fragment = Self {
            instructions,
            lookup_tables: Vec::with_capacity(lookup_tables.len()),
        };
        fragment.add_lookup_tables(lookup_tables);
        fragment
    }

    pub fn add_lookup_tables(&mut self, tables: impl IntoIterator<Item = Pubkey>) {
        for table in tables {
            if !self.lookup_tables.contains(&table) {
                self.lookup_tables.push(table);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl From<InstructionSet> for UnsignedFragment {
    fn from(instructions: InstructionSet) -> Self {
        UnsignedFragment::new(instructions, Vec::new())
    }
}

/// A signed, submit-ready transaction and the anchor it was compiled against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssembledTransaction {
    pub transaction: VersionedTransaction,
    pub anchor: FreshnessAnchor,
    /// Tables offered to the compiler, deduplicated.
    pub lookup_tables: Vec<Pubkey>,
}

impl AssembledTransaction {
    pub fn message(&self) -> &VersionedMessage {
        &self.transaction.message
    }

    /// The fee payer's signature, which is also the transaction id.
    pub fn signature(&self) -> Option<&Signature> {
        self.transaction.signatures.first()
    }

    /// Tables the compiled message actually references.
    pub fn referenced_lookup_tables(&self) -> Vec<Pubkey> {
        self.transaction
            .message
            .address_table_lookups()
            .map(|lookups| lookups.iter().map(|l| l.account_key).collect())
            .unwrap_or_default()
    }
}

/// Input to the merger: raw instructions or an already assembled transaction.
#[derive(Clone, Debug)]
pub enum Fragment {
    Unsigned(UnsignedFragment),
    Assembled(AssembledTransaction),
}

impl From<UnsignedFragment> for Fragment {
    fn from(fragment: UnsignedFragment) -> Self {
        Fragment::Unsigned(fragment)
    }
}

impl From<InstructionSet> for Fragment {
    fn from(instructions: InstructionSet) -> Self {
        Fragment::Unsigned(instructions.into())
    }
}

impl From<AssembledTransaction> for Fragment {
    fn from(transaction: AssembledTransaction) -> Self {
        Fragment::Assembled(transaction)
    }
}
