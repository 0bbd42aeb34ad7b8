use solana_account::Account;
use solana_instruction::Instruction;
use solana_program::system_instruction;
use solana_program_pack::Pack;
use solana_pubkey::Pubkey;
use spl_associated_token_account::{
    get_associated_token_address_with_program_id,
    instruction::create_associated_token_account_idempotent,
};
use spl_token_2022::{
    extension::StateWithExtensions,
    state::{Account as Account22, Mint as Mint22},
};

use crate::{
    constants::*,
    errors::{Error, Result},
};

pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey, token_program: &Pubkey) -> Pubkey {
    get_associated_token_address_with_program_id(owner, mint, token_program)
}

/// Create `owner`'s associated account for `mint`; a no-op on-chain when it
/// already exists.
pub fn create_associated_token_account(
    payer: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
    token_program: &Pubkey,
) -> Instruction {
    create_associated_token_account_idempotent(payer, owner, mint, token_program)
}

pub fn transfer_checked(
    token_program: &Pubkey,
    source: &Pubkey,
    mint: &Pubkey,
    destination: &Pubkey,
    authority: &Pubkey,
    amount: u64,
    decimals: u8,
) -> Result<Instruction> {
    let instruction = if *token_program == TOKEN_22_PROGRAM {
        spl_token_2022::instruction::transfer_checked(
            token_program,
            source,
            mint,
            destination,
            authority,
            &[],
            amount,
            decimals,
        )
    } else {
        spl_token::instruction::transfer_checked(
            token_program,
            source,
            mint,
            destination,
            authority,
            &[],
            amount,
            decimals,
        )
    };
    instruction.map_err(|e| Error::Compile(e.to_string().into()))
}

/// Move lamports into a wrapped-SOL account and resync its token balance.
pub fn wrap_sol(owner: &Pubkey, wrapped_account: &Pubkey, lamports: u64) -> Result<Vec<Instruction>> {
    let sync = spl_token::instruction::sync_native(&TOKEN_PROGRAM, wrapped_account)
        .map_err(|e| Error::Compile(e.to_string().into()))?;
    Ok(vec![
        system_instruction::transfer(owner, wrapped_account, lamports),
        sync,
    ])
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenAccountState {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
    pub is_initialized: bool,
    pub token_program: Pubkey,
}

/// Decode a token account of either token program.
pub fn decode_token_account(address: &Pubkey, account: &Account) -> Result<TokenAccountState> {
    if account.owner == TOKEN_PROGRAM {
        let state = spl_token::state::Account::unpack_unchecked(&account.data)
            .map_err(|e| Error::Deserialization(format!("token account {address}: {e}").into()))?;
        Ok(TokenAccountState {
            mint: state.mint,
            owner: state.owner,
            amount: state.amount,
            is_initialized: state.state != spl_token::state::AccountState::Uninitialized,
            token_program: TOKEN_PROGRAM,
        })
    } else if account.owner == TOKEN_22_PROGRAM {
        let state = StateWithExtensions::<Account22>::unpack(&account.data)
            .map_err(|e| Error::Deserialization(format!("token account {address}: {e}").into()))?;
        Ok(TokenAccountState {
            mint: state.base.mint,
            owner: state.base.owner,
            amount: state.base.amount,
            is_initialized: true,
            token_program: TOKEN_22_PROGRAM,
        })
    } else {
        Err(Error::Deserialization(
            format!("{address} is not owned by a token program").into(),
        ))
    }
}

pub fn decode_mint_decimals(address: &Pubkey, account: &Account) -> Result<u8> {
    if account.owner == TOKEN_PROGRAM {
        let mint = spl_token::state::Mint::unpack(&account.data)
            .map_err(|e| Error::Deserialization(format!("mint {address}: {e}").into()))?;
        Ok(mint.decimals)
    } else if account.owner == TOKEN_22_PROGRAM {
        let mint = StateWithExtensions::<Mint22>::unpack(&account.data)
            .map_err(|e| Error::Deserialization(format!("mint {address}: {e}").into()))?;
        Ok(mint.base.decimals)
    } else {
        Err(Error::Deserialization(
            format!("{address} is not owned by a token program").into(),
        ))
    }
}
