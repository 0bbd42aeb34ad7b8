use std::sync::Arc;

use log::{debug, warn};
use solana_instruction::Instruction;
use solana_pubkey::Pubkey;

use crate::{
    constants::TOKEN_PROGRAM,
    derive::derive_yield_token_vault,
    errors::Result,
    info::{VaultInfo, VaultInfoCache},
    math::lp_value_in_tokens,
    program::{AccountRole, ResolvedAccounts},
    rpc::ChainRpc,
    state::{EarningsError, VaultEarningsData},
    token::{
        associated_token_address, create_associated_token_account, decode_mint_decimals,
        decode_token_account,
    },
};

/// Yield-vault accounts a liquidity instruction needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiquidityAccounts {
    pub vault_program: Pubkey,
    pub vault: Pubkey,
    pub token_vault: Pubkey,
    pub lp_mint: Pubkey,
    pub user_lp: Pubkey,
    /// Set when `user_lp` does not exist yet and must be created first.
    pub create_user_lp: Option<Instruction>,
}

impl LiquidityAccounts {
    pub fn apply(&self, accounts: &mut ResolvedAccounts) {
        accounts.insert(AccountRole::YieldVaultProgram, self.vault_program);
        accounts.insert(AccountRole::YieldVault, self.vault);
        accounts.insert(AccountRole::YieldTokenVault, self.token_vault);
        accounts.insert(AccountRole::YieldLpMint, self.lp_mint);
        accounts.insert(AccountRole::YieldUserLp, self.user_lp);
    }
}

/// Earnings of a vault that does not provide liquidity: no position, but the
/// yield vault's price and APYs are still reported.
pub fn idle_earnings(info: &VaultInfo) -> Result<VaultEarningsData> {
    Ok(VaultEarningsData {
        amount_in_tokens: 0.0,
        amount_lp_tokens: 0,
        lp_token_decimals: 0,
        virtual_price: info.virtual_price()?,
        one_hour_apy: info.closest_apy,
        average_apy: info.average_apy,
        seven_days_apy: info.long_apy,
    })
}

/// Account resolution and position valuation against the yield vault program.
pub struct YieldProtocol {
    program_id: Pubkey,
    info: Arc<VaultInfoCache>,
    rpc: Arc<dyn ChainRpc>,
}

impl YieldProtocol {
    pub fn new(program_id: Pubkey, info: Arc<VaultInfoCache>, rpc: Arc<dyn ChainRpc>) -> Self {
        Self {
            program_id,
            info,
            rpc,
        }
    }

    pub async fn vault_info(&self, token: &Pubkey) -> Result<Option<VaultInfo>> {
        self.info.get_vault_info(token).await
    }

    /// LP token account of `lp_owner`.
    pub fn user_lp_address(&self, lp_mint: &Pubkey, lp_owner: &Pubkey) -> Pubkey {
        associated_token_address(lp_owner, lp_mint, &TOKEN_PROGRAM)
    }

    /// `None` when the info endpoint knows no yield vault for `token`.
    pub async fn liquidity_accounts(
        &self,
        token: &Pubkey,
        lp_owner: &Pubkey,
        payer: &Pubkey,
    ) -> Result<Option<LiquidityAccounts>> {
        let Some(info) = self.vault_info(token).await? else {
            return Ok(None);
        };
        let vault = info.vault_address()?;
        let lp_mint = info.lp_mint_address()?;
        let token_vault = derive_yield_token_vault(&vault, &self.program_id)?;
        let user_lp = self.user_lp_address(&lp_mint, lp_owner);

        let create_user_lp = match self.rpc.get_account(&user_lp).await? {
            Some(_) => None,
            None => {
                debug!("user LP account {user_lp} missing, creating it in the same transaction");
                Some(create_associated_token_account(
                    payer,
                    lp_owner,
                    &lp_mint,
                    &TOKEN_PROGRAM,
                ))
            }
        };

        Ok(Some(LiquidityAccounts {
            vault_program: self.program_id,
            vault,
            token_vault,
            lp_mint,
            user_lp,
            create_user_lp,
        }))
    }

    /// Value of `lp_owner`'s LP position in the yield vault described by `info`.
    pub async fn earnings(
        &self,
        info: Option<&VaultInfo>,
        lp_owner: &Pubkey,
    ) -> std::result::Result<VaultEarningsData, EarningsError> {
        let Some(info) = info else {
            return Err(EarningsError::vault_not_loaded());
        };
        let unknown = |e: crate::errors::Error| {
            warn!("earnings of {lp_owner} in {}: {e}", info.pubkey);
            EarningsError::unknown()
        };

        let lp_mint = info.lp_mint_address().map_err(unknown)?;
        let virtual_price = info.virtual_price().map_err(unknown)?;
        let user_lp = self.user_lp_address(&lp_mint, lp_owner);

        let accounts = self
            .rpc
            .get_multiple_accounts(&[user_lp, lp_mint])
            .await
            .map_err(unknown)?;
        let (Some(Some(lp_account)), Some(mint_account)) = (accounts.first(), accounts.get(1))
        else {
            return Err(EarningsError::user_not_active());
        };

        let position = decode_token_account(&user_lp, lp_account).map_err(unknown)?;
        if !position.is_initialized {
            return Err(EarningsError::user_not_active());
        }
        let lp_decimals = match mint_account {
            Some(mint) => decode_mint_decimals(&lp_mint, mint).map_err(unknown)?,
            None => return Err(unknown(crate::errors::Error::NoAccountFound(lp_mint))),
        };

        let amount_in_tokens = lp_value_in_tokens(position.amount, lp_decimals, virtual_price)
            .map_err(|e| unknown(e.into()))?;

        Ok(VaultEarningsData {
            amount_in_tokens,
            amount_lp_tokens: position.amount,
            lp_token_decimals: lp_decimals,
            virtual_price,
            one_hour_apy: info.closest_apy,
            average_apy: info.average_apy,
            seven_days_apy: info.long_apy,
        })
    }
}
