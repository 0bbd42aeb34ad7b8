use solana_pubkey::Pubkey;

pub const VAULT_PROGRAM: Pubkey =
    Pubkey::from_str_const("NEDXqFFWdkRYUE9oRRAteiS22tXDvBiSZgNcGn9G5QA");

/// Affiliate deployment of the Meteora dynamic vault program used on mainnet.
pub const YIELD_VAULT_PROGRAM: Pubkey =
    Pubkey::from_str_const("24Uqj9JCLxUeoC3hGfh5W3s9FM9uCHDS2SG3LYwBpyTi");
pub const YIELD_VAULT_PROGRAM_LOCAL: Pubkey =
    Pubkey::from_str_const("GacY9YuN16HNRTy7ZWwULPccwvfFSBeNLuAQP7y38Du3");

pub const TOKEN_PROGRAM: Pubkey =
    Pubkey::from_str_const("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
pub const TOKEN_22_PROGRAM: Pubkey =
    Pubkey::from_str_const("TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb");
pub const ATA_PROGRAM: Pubkey =
    Pubkey::from_str_const("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");
pub const SYSTEM_PROGRAM: Pubkey = Pubkey::from_str_const("11111111111111111111111111111111");
pub const RENT_SYSVAR: Pubkey =
    Pubkey::from_str_const("SysvarRent111111111111111111111111111111111");

pub const NATIVE_MINT: Pubkey =
    Pubkey::from_str_const("So11111111111111111111111111111111111111112");
pub const USDC_MINT: Pubkey =
    Pubkey::from_str_const("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");
pub const USDT_MINT: Pubkey =
    Pubkey::from_str_const("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB");
pub const DEVNET_USDC_MINT: Pubkey =
    Pubkey::from_str_const("4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU");

// Seed tags. Changing any of these orphans every vault already created on-chain.
pub const VAULTS_PDA_DATA_SEED: &[u8] = b"VAULTS_PDA_DATA";
pub const VAULTS_PDA_ACCOUNT_SEED: &[u8] = b"VAULTS_PDA_ACCOUNT";
pub const VAULTS_PDA_ACCOUNT_OWNER_SEED: &[u8] = b"VAULTS_PDA_ACCOUNT_OWNER";
pub const LEDGER_PDA_DATA_SEED: &[u8] = b"LEDGER_PDA_DATA";
pub const TOKEN_VAULT_SEED: &[u8] = b"token_vault";

/// Per-seed length bound of the host chain's address derivation.
pub const MAX_SEED_LEN: usize = 32;
/// Maximum number of seeds accepted by a single derivation.
pub const MAX_SEEDS: usize = 16;

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

pub const DEFAULT_SWAP_SLIPPAGE_BPS: u16 = 100;
pub const DEFAULT_SWAP_MAX_ACCOUNTS: u8 = 30;
pub const DEFAULT_CONFIRMATION_POLLS: u32 = 20;

/// Chain signal for a payer with no lamports.
pub const NO_PRIOR_CREDIT_SIGNAL: &str = "no record of a prior credit";
pub const NO_SOL_FUNDS_MESSAGE: &str = "No SOL funds to deposit";
pub const UNEXPECTED_ERROR_MESSAGE: &str = "Unexpected error. Code: E0";
