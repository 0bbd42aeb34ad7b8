use crate::errors::MathError;

/// Largest decimals value whose scale factor fits in a u64.
const MAX_DECIMALS: u8 = 19;

fn scale(decimals: u8) -> Result<u128, MathError> {
    if decimals > MAX_DECIMALS {
        return Err(MathError::InvalidDecimals);
    }
    Ok(10u128.pow(decimals as u32))
}

/// Convert a UI amount (e.g. `10.5` USDC) into base units of a token with `decimals`.
///
/// Rounds to the nearest base unit so `0.1 + 0.2`-style float noise does not
/// shave a unit off the transfer.
pub fn to_base_units(amount: f64, decimals: u8) -> Result<u64, MathError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(MathError::InvalidAmount);
    }
    let scaled = (amount * scale(decimals)? as f64).round();
    if scaled > u64::MAX as f64 {
        return Err(MathError::MathOverflow);
    }
    Ok(scaled as u64)
}

/// Convert base units back into a UI amount.
pub fn from_base_units(amount: u64, decimals: u8) -> Result<f64, MathError> {
    Ok(amount as f64 / scale(decimals)? as f64)
}

pub fn sol_to_lamports(amount: f64) -> Result<u64, MathError> {
    to_base_units(amount, 9)
}

pub fn round_to_n_decimals(value: f64, n: u32) -> f64 {
    let factor = 10f64.powi(n as i32);
    (value * factor).round() / factor
}

/// Token balance truncated to cents, computed in integers before the float
/// conversion so large balances keep their precision.
pub fn balance_in_cents(amount: u64, decimals: u8) -> Result<f64, MathError> {
    let cents = (amount as u128)
        .checked_mul(100)
        .and_then(|v| v.checked_div(scale(decimals).ok()?))
        .ok_or(MathError::MathOverflow)?;
    Ok(round_to_n_decimals(cents as f64 / 100.0, 2))
}

/// Value of an LP position in underlying tokens, rounded to 2 decimals.
pub fn lp_value_in_tokens(
    lp_amount: u64,
    lp_decimals: u8,
    virtual_price: f64,
) -> Result<f64, MathError> {
    if !virtual_price.is_finite() || virtual_price < 0.0 {
        return Err(MathError::InvalidAmount);
    }
    let lp = from_base_units(lp_amount, lp_decimals)?;
    Ok(round_to_n_decimals(lp * virtual_price, 2))
}
