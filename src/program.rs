use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use log::{debug, warn};
use solana_instruction::{AccountMeta, Instruction};
use solana_pubkey::Pubkey;
use tokio::sync::OnceCell;

use crate::{
    constants::*,
    errors::{Error, Result},
    fragment::InstructionSet,
    rpc::ChainRpc,
    state::SpareLevel,
};

/// Seed Anchor appends to the program's base address for its IDL account.
const ANCHOR_IDL_SEED: &str = "anchor:idl";
/// discriminator + authority + data length
const ANCHOR_IDL_HEADER_LEN: usize = 8 + 32 + 4;

/// Compute Anchor's 8-byte instruction discriminator for a given method name.
pub fn anchor_discriminator(name: &str) -> [u8; 8] {
    let preimage = format!("global:{}", name);
    let mut sighash = [0u8; 8];
    sighash.copy_from_slice(&solana_sdk::hash::hash(preimage.as_bytes()).to_bytes()[..8]);
    sighash
}

/// Address of the IDL account Anchor publishes for `program_id`.
pub fn anchor_idl_address(program_id: &Pubkey) -> Result<Pubkey> {
    let (base, _) = Pubkey::find_program_address(&[], program_id);
    Pubkey::create_with_seed(&base, ANCHOR_IDL_SEED, program_id)
        .map_err(|e| Error::InvalidSeed(e.to_string().into()))
}

/// Operations exposed by the vault program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    CreateVault,
    UpdateVault,
    DeleteVault,
    DepositLiquidity,
    DepositLiquidityWithDiffBalance,
    WithdrawLiquidity,
    /// Deposit whatever the owner's token account gained since the ledger checkpoint.
    DepositToVault,
    WithdrawFromVault,
    SaveLedgerBalance,
}

impl Capability {
    pub const ALL: [Capability; 9] = [
        Capability::CreateVault,
        Capability::UpdateVault,
        Capability::DeleteVault,
        Capability::DepositLiquidity,
        Capability::DepositLiquidityWithDiffBalance,
        Capability::WithdrawLiquidity,
        Capability::DepositToVault,
        Capability::WithdrawFromVault,
        Capability::SaveLedgerBalance,
    ];

    pub fn method_name(self) -> &'static str {
        match self {
            Capability::CreateVault => "create_vault",
            Capability::UpdateVault => "update_vault",
            Capability::DeleteVault => "delete_vault",
            Capability::DepositLiquidity => "deposit_liquidity",
            Capability::DepositLiquidityWithDiffBalance => "deposit_liquidity_with_diff_balance",
            Capability::WithdrawLiquidity => "withdraw_liquidity",
            Capability::DepositToVault => "deposit_to_vault_with_diff_balance",
            Capability::WithdrawFromVault => "withdraw_from_vault",
            Capability::SaveLedgerBalance => "save_account_balance",
        }
    }

    /// Account list of the instruction, in program order.
    pub fn account_layout(self) -> &'static [AccountSlot] {
        use AccountRole::*;
        match self {
            Capability::CreateVault => const { &[
                AccountSlot::signer(Owner),
                AccountSlot::writable(DataAccount),
                AccountSlot::writable(VaultAccount),
                AccountSlot::readonly(VaultAccountOwner),
                AccountSlot::readonly(Mint),
                AccountSlot::readonly(SystemProgram),
                AccountSlot::readonly(TokenProgram),
                AccountSlot::readonly(AssociatedTokenProgram),
                AccountSlot::readonly(Rent),
            ] },
            Capability::UpdateVault => const { &[
                AccountSlot::signer(Owner),
                AccountSlot::writable(DataAccount),
                AccountSlot::writable(VaultAccount),
                AccountSlot::readonly(VaultAccountOwner),
                AccountSlot::readonly(Mint),
            ] },
            Capability::DeleteVault => const { &[
                AccountSlot::signer(Owner),
                AccountSlot::writable(DataAccount),
                AccountSlot::writable(VaultAccount),
                AccountSlot::readonly(VaultAccountOwner),
                AccountSlot::readonly(Mint),
                AccountSlot::writable(UserTokenAccount),
                AccountSlot::readonly(TokenProgram),
            ] },
            Capability::DepositLiquidity | Capability::WithdrawLiquidity => const { &[
                AccountSlot::signer(Owner),
                AccountSlot::writable(DataAccount),
                AccountSlot::writable(VaultAccount),
                AccountSlot::readonly(VaultAccountOwner),
                AccountSlot::readonly(Mint),
                AccountSlot::readonly(User),
                AccountSlot::writable(UserToken),
                AccountSlot::readonly(TokenProgram),
                AccountSlot::readonly(YieldVaultProgram),
                AccountSlot::writable(YieldVault),
                AccountSlot::writable(YieldTokenVault),
                AccountSlot::writable(YieldLpMint),
                AccountSlot::writable(YieldUserLp),
            ] },
            Capability::DepositLiquidityWithDiffBalance => const { &[
                AccountSlot::signer(Owner),
                AccountSlot::writable(DataAccount),
                AccountSlot::writable(VaultAccount),
                AccountSlot::readonly(VaultAccountOwner),
                AccountSlot::readonly(Mint),
                AccountSlot::readonly(User),
                AccountSlot::writable(UserToken),
                AccountSlot::readonly(TokenProgram),
                AccountSlot::writable(LedgerData),
                AccountSlot::readonly(YieldVaultProgram),
                AccountSlot::writable(YieldVault),
                AccountSlot::writable(YieldTokenVault),
                AccountSlot::writable(YieldLpMint),
                AccountSlot::writable(YieldUserLp),
            ] },
            Capability::DepositToVault => const { &[
                AccountSlot::signer(Owner),
                AccountSlot::writable(DataAccount),
                AccountSlot::readonly(Mint),
                AccountSlot::readonly(VaultAccountOwner),
                AccountSlot::writable(VaultAccount),
                AccountSlot::writable(UserTokenAccount),
                AccountSlot::writable(LedgerData),
                AccountSlot::readonly(TokenProgram),
            ] },
            Capability::WithdrawFromVault => const { &[
                AccountSlot::signer(Owner),
                AccountSlot::writable(DataAccount),
                AccountSlot::writable(VaultAccount),
                AccountSlot::readonly(VaultAccountOwner),
                AccountSlot::readonly(Mint),
                AccountSlot::writable(UserTokenAccount),
                AccountSlot::readonly(TokenProgram),
            ] },
            Capability::SaveLedgerBalance => const { &[
                AccountSlot::signer(Owner),
                AccountSlot::readonly(Mint),
                AccountSlot::readonly(UserTokenAccount),
                AccountSlot::writable(LedgerData),
                AccountSlot::readonly(SystemProgram),
                AccountSlot::readonly(Rent),
            ] },
        }
    }
}

/// The part an account plays in a vault program instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccountRole {
    Owner,
    DataAccount,
    VaultAccount,
    VaultAccountOwner,
    Mint,
    UserTokenAccount,
    LedgerData,
    /// Authority over the liquidity position (the vault-account-owner PDA).
    User,
    /// Token account liquidity is moved from and to (the vault account).
    UserToken,
    SystemProgram,
    TokenProgram,
    AssociatedTokenProgram,
    Rent,
    YieldVaultProgram,
    YieldVault,
    YieldTokenVault,
    YieldLpMint,
    YieldUserLp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccountSlot {
    pub role: AccountRole,
    pub is_writable: bool,
    pub is_signer: bool,
}

impl AccountSlot {
    const fn signer(role: AccountRole) -> Self {
        Self {
            role,
            is_writable: true,
            is_signer: true,
        }
    }

    const fn writable(role: AccountRole) -> Self {
        Self {
            role,
            is_writable: true,
            is_signer: false,
        }
    }

    const fn readonly(role: AccountRole) -> Self {
        Self {
            role,
            is_writable: false,
            is_signer: false,
        }
    }
}

/// Addresses bound to account roles for one instruction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedAccounts(BTreeMap<AccountRole, Pubkey>);

impl ResolvedAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// System, token, associated-token programs and the rent sysvar.
    pub fn with_programs() -> Self {
        Self::new()
            .with(AccountRole::SystemProgram, SYSTEM_PROGRAM)
            .with(AccountRole::TokenProgram, TOKEN_PROGRAM)
            .with(AccountRole::AssociatedTokenProgram, ATA_PROGRAM)
            .with(AccountRole::Rent, RENT_SYSVAR)
    }

    pub fn with(mut self, role: AccountRole, address: Pubkey) -> Self {
        self.0.insert(role, address);
        self
    }

    pub fn insert(&mut self, role: AccountRole, address: Pubkey) {
        self.0.insert(role, address);
    }

    pub fn get(&self, role: AccountRole) -> Option<&Pubkey> {
        self.0.get(&role)
    }

    /// Account metas for `capability`, in program order.
    pub fn metas_for(&self, capability: Capability) -> Result<Vec<AccountMeta>> {
        capability
            .account_layout()
            .iter()
            .map(|slot| {
                let address = *self
                    .get(slot.role)
                    .ok_or(Error::AccountResolution(slot.role))?;
                Ok(if slot.is_writable {
                    AccountMeta::new(address, slot.is_signer)
                } else {
                    AccountMeta::new_readonly(address, slot.is_signer)
                })
            })
            .collect()
    }
}

/// A capability together with its arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CapabilityRequest {
    CreateVault {
        name: String,
        identifier: String,
        spare: SpareLevel,
        earnings_enabled: bool,
    },
    UpdateVault {
        identifier: String,
        name: String,
        spare: SpareLevel,
        earnings_enabled: bool,
    },
    DeleteVault {
        identifier: String,
    },
    DepositLiquidity {
        identifier: String,
        amount: u64,
    },
    DepositLiquidityWithDiffBalance {
        identifier: String,
    },
    WithdrawLiquidity {
        identifier: String,
        lp_amount: u64,
    },
    DepositToVault {
        identifier: String,
    },
    WithdrawFromVault {
        identifier: String,
        amount: u64,
    },
    SaveLedgerBalance,
}

impl CapabilityRequest {
    pub fn capability(&self) -> Capability {
        match self {
            CapabilityRequest::CreateVault { .. } => Capability::CreateVault,
            CapabilityRequest::UpdateVault { .. } => Capability::UpdateVault,
            CapabilityRequest::DeleteVault { .. } => Capability::DeleteVault,
            CapabilityRequest::DepositLiquidity { .. } => Capability::DepositLiquidity,
            CapabilityRequest::DepositLiquidityWithDiffBalance { .. } => {
                Capability::DepositLiquidityWithDiffBalance
            }
            CapabilityRequest::WithdrawLiquidity { .. } => Capability::WithdrawLiquidity,
            CapabilityRequest::DepositToVault { .. } => Capability::DepositToVault,
            CapabilityRequest::WithdrawFromVault { .. } => Capability::WithdrawFromVault,
            CapabilityRequest::SaveLedgerBalance => Capability::SaveLedgerBalance,
        }
    }

    /// Borsh encoding of the arguments, in declaration order.
    ///
    /// ```text
    /// bytes   u32 length (LE) + raw bytes
    /// enum    u8 variant index
    /// bool    u8
    /// u64     8 bytes LE
    /// ```
    pub fn encode_args(&self, out: &mut Vec<u8>) {
        fn bytes(out: &mut Vec<u8>, value: &str) {
            out.extend_from_slice(&(value.len() as u32).to_le_bytes());
            out.extend_from_slice(value.as_bytes());
        }

        match self {
            CapabilityRequest::CreateVault {
                name,
                identifier,
                spare,
                earnings_enabled,
            } => {
                bytes(out, name);
                bytes(out, identifier);
                out.push(spare.as_u8());
                out.push(*earnings_enabled as u8);
            }
            CapabilityRequest::UpdateVault {
                identifier,
                name,
                spare,
                earnings_enabled,
            } => {
                bytes(out, identifier);
                bytes(out, name);
                out.push(spare.as_u8());
                out.push(*earnings_enabled as u8);
            }
            CapabilityRequest::DeleteVault { identifier }
            | CapabilityRequest::DepositLiquidityWithDiffBalance { identifier }
            | CapabilityRequest::DepositToVault { identifier } => bytes(out, identifier),
            CapabilityRequest::DepositLiquidity { identifier, amount }
            | CapabilityRequest::WithdrawFromVault { identifier, amount } => {
                bytes(out, identifier);
                out.extend_from_slice(&amount.to_le_bytes());
            }
            CapabilityRequest::WithdrawLiquidity {
                identifier,
                lp_amount,
            } => {
                bytes(out, identifier);
                out.extend_from_slice(&lp_amount.to_le_bytes());
            }
            CapabilityRequest::SaveLedgerBalance => {}
        }
    }
}

/// What the client knows about a deployed program's interface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    pub program_id: Pubkey,
    pub idl_address: Pubkey,
    discriminators: BTreeMap<Capability, [u8; 8]>,
}

impl InterfaceDescriptor {
    pub fn anchor(program_id: Pubkey, idl_address: Pubkey) -> Self {
        let discriminators = Capability::ALL
            .iter()
            .map(|c| (*c, anchor_discriminator(c.method_name())))
            .collect();
        Self {
            program_id,
            idl_address,
            discriminators,
        }
    }

    pub fn discriminator(&self, capability: Capability) -> Option<[u8; 8]> {
        self.discriminators.get(&capability).copied()
    }
}

/// Boundary to an on-chain program: fetch its interface, build instructions.
#[async_trait]
pub trait ProgramAdapter: Send + Sync {
    /// `None` when the program publishes no interface.
    async fn fetch_interface_descriptor(
        &self,
        program_id: &Pubkey,
    ) -> Result<Option<InterfaceDescriptor>>;

    fn build_instruction(
        &self,
        descriptor: &InterfaceDescriptor,
        request: &CapabilityRequest,
        accounts: &ResolvedAccounts,
    ) -> Result<Instruction>;
}

/// Adapter for Anchor programs: the interface is the IDL account, instruction
/// data is discriminator followed by Borsh arguments.
pub struct AnchorProgramAdapter {
    rpc: Arc<dyn ChainRpc>,
}

impl AnchorProgramAdapter {
    pub fn new(rpc: Arc<dyn ChainRpc>) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl ProgramAdapter for AnchorProgramAdapter {
    async fn fetch_interface_descriptor(
        &self,
        program_id: &Pubkey,
    ) -> Result<Option<InterfaceDescriptor>> {
        let idl_address = anchor_idl_address(program_id)?;
        let Some(account) = self.rpc.get_account(&idl_address).await? else {
            return Ok(None);
        };
        if account.owner != *program_id || account.data.len() < ANCHOR_IDL_HEADER_LEN {
            debug!("IDL account {idl_address} of {program_id} is not a valid Anchor IDL");
            return Ok(None);
        }
        Ok(Some(InterfaceDescriptor::anchor(*program_id, idl_address)))
    }

    fn build_instruction(
        &self,
        descriptor: &InterfaceDescriptor,
        request: &CapabilityRequest,
        accounts: &ResolvedAccounts,
    ) -> Result<Instruction> {
        let capability = request.capability();
        let discriminator = descriptor
            .discriminator(capability)
            .ok_or(Error::ProgramInterfaceUnavailable(descriptor.program_id))?;
        let accounts = accounts.metas_for(capability)?;

        let mut data = Vec::with_capacity(64);
        data.extend_from_slice(&discriminator);
        request.encode_args(&mut data);

        Ok(Instruction {
            program_id: descriptor.program_id,
            accounts,
            data,
        })
    }
}

/// Builds vault program instructions, fetching the interface descriptor once.
pub struct InstructionBuilder {
    program_id: Pubkey,
    adapter: Arc<dyn ProgramAdapter>,
    descriptor: OnceCell<InterfaceDescriptor>,
}

impl InstructionBuilder {
    pub fn new(program_id: Pubkey, adapter: Arc<dyn ProgramAdapter>) -> Self {
        Self {
            program_id,
            adapter,
            descriptor: OnceCell::new(),
        }
    }

    /// A failed fetch is not cached; the next build retries it.
    pub async fn descriptor(&self) -> Result<&InterfaceDescriptor> {
        self.descriptor
            .get_or_try_init(|| async {
                self.adapter
                    .fetch_interface_descriptor(&self.program_id)
                    .await
                    .map_err(|e| {
                        warn!("interface of {} could not be fetched: {e}", self.program_id);
                        Error::ProgramInterfaceUnavailable(self.program_id)
                    })?
                    .ok_or(Error::ProgramInterfaceUnavailable(self.program_id))
            })
            .await
    }

    pub async fn build(
        &self,
        request: &CapabilityRequest,
        accounts: &ResolvedAccounts,
    ) -> Result<InstructionSet> {
        let descriptor = self.descriptor().await?;
        let instruction = self
            .adapter
            .build_instruction(descriptor, request, accounts)?;
        debug!(
            "built {} instruction with {} accounts",
            request.capability().method_name(),
            instruction.accounts.len()
        );
        Ok(InstructionSet::new(vec![instruction]))
    }
}
