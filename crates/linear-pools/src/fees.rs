use {
    crate::{error::BalancerError, fixed_point::Bfp},
    alloy_primitives::U256,
};

/// Fee owed for the part of `cash` that lies outside of the
/// `[lower_target, upper_target]` band.
///
/// All amounts are upscaled to 18 decimals and the result is truncated, the
/// same way the pools compute nominal balances.
pub fn compute_fee(
    cash: U256,
    lower_target: U256,
    upper_target: U256,
    fee_percentage: Bfp,
) -> Result<U256, BalancerError> {
    if lower_target > upper_target {
        return Err(BalancerError::InvalidTargets);
    }
    let outside = if cash > upper_target {
        cash - upper_target
    } else if cash < lower_target {
        lower_target - cash
    } else {
        return Ok(U256::ZERO);
    };
    Ok(Bfp::from_wei(outside)
        .mul_down(fee_percentage)?
        .as_uint256())
}
