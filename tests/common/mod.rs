//! In-memory collaborators for the integration tests.
#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use solana_account::Account;
use solana_instruction::{AccountMeta, Instruction};
use solana_program_pack::Pack;
use solana_pubkey::Pubkey;
use solana_sdk::{
    hash::Hash,
    signature::{Keypair, Signature, Signer},
    transaction::VersionedTransaction,
};
use spl_token::state::{Account as TokenAccount, AccountState, Mint};

use savings_vault_client::{
    config::VaultsConfig,
    constants::*,
    errors::{Error, Result},
    fragment::{AssembledTransaction, InstructionSet, UnsignedFragment},
    info::{VaultInfo, VaultInfoSource},
    lookup::{decompile, resolve_lookup_tables},
    orchestrator::{Collaborators, VaultOrchestrator},
    program::{AnchorProgramAdapter, anchor_idl_address},
    rpc::{ChainRpc, ConfirmationStatus, FreshnessAnchor, SubmitOptions},
    state::{
        SpareLevel, TokenMetadata, VaultDescriptor, VaultRecord, fixed_bytes, pack_vault_manager,
    },
    swap::{Quote, SwapAggregator},
};

pub const PRIOR_CREDIT_FAILURE: &str = "Transaction simulation failed: Attempt to debit an account but found no record of a prior credit.";

pub fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Accounts in a map; submissions are recorded, never executed.
///
/// Anchor fetches and submissions can be stalled or failed, and overlapping
/// submissions are counted.
#[derive(Default)]
pub struct FakeChain {
    accounts: Mutex<HashMap<Pubkey, Account>>,
    submitted: Mutex<Vec<VersionedTransaction>>,
    anchors: AtomicUsize,
    anchor_delay: Mutex<Duration>,
    anchor_failure: Mutex<Option<String>>,
    submit_delay: Mutex<Duration>,
    unreachable: Mutex<HashSet<Pubkey>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_account(&self, address: Pubkey, account: Account) {
        self.accounts.lock().unwrap().insert(address, account);
    }

    pub fn remove_account(&self, address: &Pubkey) {
        self.accounts.lock().unwrap().remove(address);
    }

    pub fn airdrop(&self, address: Pubkey, lamports: u64) {
        self.set_account(
            address,
            Account {
                lamports,
                data: vec![],
                owner: SYSTEM_PROGRAM,
                executable: false,
                rent_epoch: 0,
            },
        );
    }

    pub fn submitted(&self) -> Vec<VersionedTransaction> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn anchors_fetched(&self) -> usize {
        self.anchors.load(Ordering::SeqCst)
    }

    /// Publish an IDL account so the vault program's interface resolves.
    pub fn publish_idl(&self, program_id: &Pubkey) {
        self.set_account(
            anchor_idl_address(program_id).unwrap(),
            Account {
                lamports: 1,
                data: vec![0u8; 128],
                owner: *program_id,
                executable: false,
                rent_epoch: 0,
            },
        );
    }

    pub fn add_lookup_table(&self, address: Pubkey, addresses: &[Pubkey]) {
        self.set_account(address, lookup_table_account(addresses));
    }

    pub fn stall_anchor(&self, delay: Duration) {
        *self.anchor_delay.lock().unwrap() = delay;
    }

    pub fn fail_anchor(&self, message: &str) {
        *self.anchor_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn stall_submit(&self, delay: Duration) {
        *self.submit_delay.lock().unwrap() = delay;
    }

    /// Reads of `address` fail at the transport level until `restore`.
    pub fn make_unreachable(&self, address: Pubkey) {
        self.unreachable.lock().unwrap().insert(address);
    }

    pub fn restore(&self, address: &Pubkey) {
        self.unreachable.lock().unwrap().remove(address);
    }

    /// Highest number of submissions in progress at the same time.
    pub fn max_concurrent_submits(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainRpc for FakeChain {
    async fn get_latest_anchor(&self) -> Result<FreshnessAnchor> {
        self.anchors.fetch_add(1, Ordering::SeqCst);
        let delay = *self.anchor_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.anchor_failure.lock().unwrap().clone() {
            return Err(Error::AnchorFetch(message.into()));
        }
        Ok(FreshnessAnchor {
            blockhash: Hash::new_unique(),
            last_valid_block_height: 1_000,
        })
    }

    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>> {
        if self.unreachable.lock().unwrap().contains(address) {
            return Err(Error::Rpc(format!("connection reset reading {address}").into()));
        }
        Ok(self.accounts.lock().unwrap().get(address).cloned())
    }

    async fn get_multiple_accounts(&self, addresses: &[Pubkey]) -> Result<Vec<Option<Account>>> {
        let accounts = self.accounts.lock().unwrap();
        Ok(addresses.iter().map(|a| accounts.get(a).cloned()).collect())
    }

    async fn submit(
        &self,
        transaction: &VersionedTransaction,
        _options: &SubmitOptions,
    ) -> Result<Signature> {
        let payer = transaction.message.static_account_keys()[0];
        let lamports = self
            .accounts
            .lock()
            .unwrap()
            .get(&payer)
            .map_or(0, |a| a.lamports);
        if lamports == 0 {
            return Err(Error::Submission(PRIOR_CREDIT_FAILURE.into()));
        }

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let delay = *self.submit_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.submitted.lock().unwrap().push(transaction.clone());
        Ok(transaction.signatures[0])
    }

    async fn confirm(
        &self,
        signature: &Signature,
        _anchor: &FreshnessAnchor,
    ) -> Result<ConfirmationStatus> {
        let landed = self
            .submitted
            .lock()
            .unwrap()
            .iter()
            .any(|tx| tx.signatures.first() == Some(signature));
        Ok(if landed {
            ConfirmationStatus::Confirmed
        } else {
            ConfirmationStatus::Pending
        })
    }
}

/// Fixed snapshot; counts fetches.
#[derive(Default)]
pub struct FakeInfoSource {
    vaults: Mutex<Vec<VaultInfo>>,
    fetches: AtomicUsize,
}

impl FakeInfoSource {
    pub fn new(vaults: Vec<VaultInfo>) -> Arc<Self> {
        Arc::new(Self {
            vaults: Mutex::new(vaults),
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn push(&self, info: VaultInfo) {
        self.vaults.lock().unwrap().push(info);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VaultInfoSource for FakeInfoSource {
    async fn fetch_all(&self) -> Result<Vec<VaultInfo>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.vaults.lock().unwrap().clone())
    }
}

/// Returns the configured route, or none.
pub struct FakeSwap {
    pub route: Option<UnsignedFragment>,
    pub quotes: AtomicUsize,
}

impl FakeSwap {
    pub fn new(route: Option<UnsignedFragment>) -> Arc<Self> {
        Arc::new(Self {
            route,
            quotes: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SwapAggregator for FakeSwap {
    async fn get_quote(
        &self,
        input_mint: &Pubkey,
        output_mint: &Pubkey,
        amount: u64,
        slippage_bps: u16,
    ) -> Option<Quote> {
        self.quotes.fetch_add(1, Ordering::SeqCst);
        self.route.as_ref()?;
        Some(Quote {
            input_mint: input_mint.to_string(),
            in_amount: amount.to_string(),
            output_mint: output_mint.to_string(),
            out_amount: amount.to_string(),
            other_amount_threshold: amount.to_string(),
            swap_mode: "ExactIn".to_string(),
            slippage_bps,
            extra: Default::default(),
        })
    }

    async fn get_swap_instructions(
        &self,
        _quote: &Quote,
        _wallet: &Pubkey,
    ) -> Option<UnsignedFragment> {
        self.route.clone()
    }
}

/// Serialized lookup table: 56-byte meta (active, no authority) then keys.
pub fn lookup_table_bytes(addresses: &[Pubkey]) -> Vec<u8> {
    let mut data = Vec::with_capacity(56 + addresses.len() * 32);
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&u64::MAX.to_le_bytes());
    data.extend_from_slice(&0u64.to_le_bytes());
    data.push(0);
    data.push(0);
    data.resize(56, 0);
    for address in addresses {
        data.extend_from_slice(address.as_ref());
    }
    data
}

pub fn lookup_table_account(addresses: &[Pubkey]) -> Account {
    Account {
        lamports: 1,
        data: lookup_table_bytes(addresses),
        owner: Pubkey::from_str_const("AddressLookupTab1e1111111111111111111111111"),
        executable: false,
        rent_epoch: 0,
    }
}

pub fn token_account(mint: Pubkey, owner: Pubkey, amount: u64) -> Account {
    let mut data = vec![0u8; TokenAccount::LEN];
    TokenAccount::pack(
        TokenAccount {
            mint,
            owner,
            amount,
            state: AccountState::Initialized,
            ..TokenAccount::default()
        },
        &mut data,
    )
    .unwrap();
    Account {
        lamports: 2_039_280,
        data,
        owner: TOKEN_PROGRAM,
        executable: false,
        rent_epoch: 0,
    }
}

pub fn mint_account(decimals: u8) -> Account {
    let mut data = vec![0u8; Mint::LEN];
    Mint::pack(
        Mint {
            decimals,
            is_initialized: true,
            supply: 1_000_000_000_000,
            ..Mint::default()
        },
        &mut data,
    )
    .unwrap();
    Account {
        lamports: 1_461_600,
        data,
        owner: TOKEN_PROGRAM,
        executable: false,
        rent_epoch: 0,
    }
}

/// Yield-vault info for `token` with an LP mint of its own.
pub fn vault_info(token: &Pubkey, virtual_price: &str) -> VaultInfo {
    VaultInfo {
        symbol: "TKN".to_string(),
        token_address: token.to_string(),
        pubkey: Pubkey::new_unique().to_string(),
        lp_mint: Pubkey::new_unique().to_string(),
        virtual_price: virtual_price.to_string(),
        closest_apy: 4.0,
        average_apy: 5.0,
        long_apy: 6.0,
        is_monitoring: false,
        vault_order: 0,
        usd_rate: 1.0,
        earned_amount: 0.0,
        enabled: 1,
        fee_pubkey: Pubkey::new_unique().to_string(),
        total_amount: 0.0,
        total_amount_with_profit: 0.0,
        token_amount: 0.0,
        fee_amount: 0.0,
        lp_supply: 0.0,
        earned_usd_amount: 0.0,
        strategies: vec![],
    }
}

/// A single no-op instruction signed by `payer` touching `extra` accounts.
pub fn noop(program: Pubkey, payer: Pubkey, tag: u8, extra: &[Pubkey]) -> Instruction {
    let mut accounts = vec![AccountMeta::new(payer, true)];
    accounts.extend(extra.iter().map(|a| AccountMeta::new(*a, false)));
    Instruction::new_with_bytes(program, &[tag], accounts)
}

/// Instructions of `tx`, resolving its tables against `chain`.
pub async fn instructions_of(chain: &FakeChain, tx: &AssembledTransaction) -> Vec<Instruction> {
    let tables = resolve_lookup_tables(chain, &tx.referenced_lookup_tables())
        .await
        .unwrap();
    decompile(tx.message(), &tables).unwrap()
}

pub fn fragment(instructions: Vec<Instruction>, tables: Vec<Pubkey>) -> UnsignedFragment {
    UnsignedFragment::new(InstructionSet::new(instructions), tables)
}

pub struct Harness {
    pub chain: Arc<FakeChain>,
    pub info: Arc<FakeInfoSource>,
    pub signer: Arc<Keypair>,
    pub orchestrator: VaultOrchestrator,
}

pub fn test_config() -> VaultsConfig {
    VaultsConfig {
        info_cache_ttl_secs: Some(60),
        confirmation_polls: 3,
        confirmation_interval_ms: 1,
        ..VaultsConfig::local()
    }
}

pub fn tokens() -> Vec<TokenMetadata> {
    vec![
        TokenMetadata {
            address: DEVNET_USDC_MINT,
            symbol: "USDC".to_string(),
            decimals: 6,
            logo_uri: Some("https://example.org/usdc.png".to_string()),
        },
        TokenMetadata {
            address: NATIVE_MINT,
            symbol: "SOL".to_string(),
            decimals: 9,
            logo_uri: None,
        },
        TokenMetadata {
            address: USDT_MINT,
            symbol: "USDT".to_string(),
            decimals: 6,
            logo_uri: None,
        },
    ]
}

/// Orchestrator over fakes; the owner is funded and the IDL published.
pub fn harness(infos: Vec<VaultInfo>, route: Option<UnsignedFragment>) -> Harness {
    harness_with(test_config(), infos, route)
}

pub fn harness_with(
    config: VaultsConfig,
    infos: Vec<VaultInfo>,
    route: Option<UnsignedFragment>,
) -> Harness {
    init_test_logger();
    let chain = FakeChain::new();
    let info = FakeInfoSource::new(infos);
    let signer = Arc::new(Keypair::new());
    chain.publish_idl(&config.vault_program);
    chain.airdrop(signer.pubkey(), 10 * LAMPORTS_PER_SOL);

    let rpc: Arc<dyn ChainRpc> = chain.clone();
    let collaborators = Collaborators {
        program: Arc::new(AnchorProgramAdapter::new(rpc.clone())),
        info: info.clone(),
        swap: FakeSwap::new(route),
        rpc,
    };
    let orchestrator = VaultOrchestrator::new(config, signer.clone(), collaborators, tokens());
    Harness {
        chain,
        info,
        signer,
        orchestrator,
    }
}

impl Harness {
    pub fn owner(&self) -> Pubkey {
        self.signer.pubkey()
    }

    /// Descriptor of an existing vault, addresses derived as on-chain.
    pub fn vault(
        &self,
        identifier: &str,
        token: Pubkey,
        decimals: u8,
        spare: SpareLevel,
        earnings_enabled: bool,
    ) -> VaultDescriptor {
        let addresses = self.orchestrator.addresses();
        VaultDescriptor {
            name: "Savings".to_string(),
            token_address: token,
            owner_address: addresses
                .vault_account_owner(identifier.as_bytes())
                .unwrap(),
            account_address: addresses.vault_account(identifier.as_bytes()).unwrap(),
            identifier: identifier.to_string(),
            spare,
            earnings_enabled,
            token_decimals: decimals,
            balance: 0.0,
            symbol: None,
            logo_uri: None,
            earnings: None,
        }
    }

    /// Write the owner's vault data account listing `vaults`.
    pub fn store_vaults(&self, vaults: &[VaultDescriptor]) {
        let records: Vec<VaultRecord> = vaults
            .iter()
            .map(|v| {
                let (name, name_length) = fixed_bytes::<32>(&v.name);
                let (identifier, identifier_length) = fixed_bytes::<32>(&v.identifier);
                VaultRecord {
                    name,
                    name_length,
                    identifier,
                    identifier_length,
                    token_pubkey: v.token_address,
                    pubkey: v.account_address,
                    owner_pubkey: v.owner_address,
                    spare_type: v.spare.as_u8(),
                    earnings_enabled: v.earnings_enabled,
                }
            })
            .collect();
        let data_account = self.orchestrator.addresses().data_account().unwrap();
        self.chain.set_account(
            data_account,
            Account {
                lamports: 1,
                data: pack_vault_manager(&self.owner(), &records),
                owner: VAULT_PROGRAM,
                executable: false,
                rent_epoch: 0,
            },
        );
    }

    /// Seed the LP position of `vault` in the yield vault described by `info`.
    pub fn store_lp_position(&self, vault: &VaultDescriptor, info: &VaultInfo, amount: u64, decimals: u8) {
        let lp_mint = info.lp_mint_address().unwrap();
        let user_lp = spl_associated_token_account::get_associated_token_address_with_program_id(
            &vault.owner_address,
            &lp_mint,
            &TOKEN_PROGRAM,
        );
        self.chain
            .set_account(user_lp, token_account(lp_mint, vault.owner_address, amount));
        self.chain.set_account(lp_mint, mint_account(decimals));
    }

    pub fn owner_ata(&self, mint: &Pubkey) -> Pubkey {
        spl_associated_token_account::get_associated_token_address_with_program_id(
            &self.owner(),
            mint,
            &TOKEN_PROGRAM,
        )
    }
}
