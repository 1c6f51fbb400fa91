//! Swap math of linear pools.
//!
//! Main token balances are converted into *nominal* balances by charging the
//! swap fee on the part of the balance that lies outside of the target band.
//! Wrapped token balances are already expressed in main token units (their
//! scaling factor includes the wrapped token rate), so the pool invariant is
//! simply the sum of the nominal main balance and the wrapped balance.
//!
//! All values are upscaled 18-decimal fixed point numbers.

use crate::{error::BalancerError, fixed_point::Bfp, math::BalU256};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Params {
    pub fee: Bfp,
    pub lower_target: Bfp,
    pub upper_target: Bfp,
}

pub fn calc_bpt_out_per_main_in(
    main_in: Bfp,
    main_balance: Bfp,
    wrapped_balance: Bfp,
    bpt_supply: Bfp,
    params: &Params,
) -> Result<Bfp, BalancerError> {
    // Amount out, so we round down overall.
    if bpt_supply.is_zero() {
        return to_nominal(main_in, params);
    }

    let previous_nominal_main = to_nominal(main_balance, params)?;
    let after_nominal_main = to_nominal(main_balance.add(main_in)?, params)?;
    let delta_nominal_main = after_nominal_main.sub(previous_nominal_main)?;
    let invariant = calc_invariant(previous_nominal_main, wrapped_balance)?;
    mul_div_down(bpt_supply, delta_nominal_main, invariant)
}

pub fn calc_bpt_in_per_main_out(
    main_out: Bfp,
    main_balance: Bfp,
    wrapped_balance: Bfp,
    bpt_supply: Bfp,
    params: &Params,
) -> Result<Bfp, BalancerError> {
    // Amount in, so we round up overall.
    let previous_nominal_main = to_nominal(main_balance, params)?;
    let after_nominal_main = to_nominal(main_balance.sub(main_out)?, params)?;
    let delta_nominal_main = previous_nominal_main.sub(after_nominal_main)?;
    let invariant = calc_invariant(previous_nominal_main, wrapped_balance)?;
    mul_div_up(bpt_supply, delta_nominal_main, invariant)
}

pub fn calc_wrapped_out_per_main_in(
    main_in: Bfp,
    main_balance: Bfp,
    params: &Params,
) -> Result<Bfp, BalancerError> {
    let previous_nominal_main = to_nominal(main_balance, params)?;
    let after_nominal_main = to_nominal(main_balance.add(main_in)?, params)?;
    after_nominal_main.sub(previous_nominal_main)
}

pub fn calc_wrapped_in_per_main_out(
    main_out: Bfp,
    main_balance: Bfp,
    params: &Params,
) -> Result<Bfp, BalancerError> {
    let previous_nominal_main = to_nominal(main_balance, params)?;
    let after_nominal_main = to_nominal(main_balance.sub(main_out)?, params)?;
    previous_nominal_main.sub(after_nominal_main)
}

pub fn calc_main_in_per_bpt_out(
    bpt_out: Bfp,
    main_balance: Bfp,
    wrapped_balance: Bfp,
    bpt_supply: Bfp,
    params: &Params,
) -> Result<Bfp, BalancerError> {
    // Amount in, so we round up overall.
    if bpt_supply.is_zero() {
        return from_nominal(bpt_out, params);
    }

    let previous_nominal_main = to_nominal(main_balance, params)?;
    let invariant = calc_invariant(previous_nominal_main, wrapped_balance)?;
    let delta_nominal_main = mul_div_up(invariant, bpt_out, bpt_supply)?;
    let after_nominal_main = previous_nominal_main.add(delta_nominal_main)?;
    let new_main_balance = from_nominal(after_nominal_main, params)?;
    new_main_balance.sub(main_balance)
}

pub fn calc_main_out_per_bpt_in(
    bpt_in: Bfp,
    main_balance: Bfp,
    wrapped_balance: Bfp,
    bpt_supply: Bfp,
    params: &Params,
) -> Result<Bfp, BalancerError> {
    // Amount out, so we round down overall.
    let previous_nominal_main = to_nominal(main_balance, params)?;
    let invariant = calc_invariant(previous_nominal_main, wrapped_balance)?;
    let delta_nominal_main = mul_div_down(invariant, bpt_in, bpt_supply)?;
    let after_nominal_main = previous_nominal_main.sub(delta_nominal_main)?;
    let new_main_balance = from_nominal(after_nominal_main, params)?;
    main_balance.sub(new_main_balance)
}

pub fn calc_main_out_per_wrapped_in(
    wrapped_in: Bfp,
    main_balance: Bfp,
    params: &Params,
) -> Result<Bfp, BalancerError> {
    let previous_nominal_main = to_nominal(main_balance, params)?;
    let after_nominal_main = previous_nominal_main.sub(wrapped_in)?;
    let new_main_balance = from_nominal(after_nominal_main, params)?;
    main_balance.sub(new_main_balance)
}

pub fn calc_main_in_per_wrapped_out(
    wrapped_out: Bfp,
    main_balance: Bfp,
    params: &Params,
) -> Result<Bfp, BalancerError> {
    let previous_nominal_main = to_nominal(main_balance, params)?;
    let after_nominal_main = previous_nominal_main.add(wrapped_out)?;
    let new_main_balance = from_nominal(after_nominal_main, params)?;
    new_main_balance.sub(main_balance)
}

pub fn calc_bpt_out_per_wrapped_in(
    wrapped_in: Bfp,
    main_balance: Bfp,
    wrapped_balance: Bfp,
    bpt_supply: Bfp,
    params: &Params,
) -> Result<Bfp, BalancerError> {
    // Amount out, so we round down overall.
    if bpt_supply.is_zero() {
        return Ok(wrapped_in);
    }

    let nominal_main = to_nominal(main_balance, params)?;
    let previous_invariant = calc_invariant(nominal_main, wrapped_balance)?;
    let new_wrapped_balance = wrapped_balance.add(wrapped_in)?;
    let new_invariant = calc_invariant(nominal_main, new_wrapped_balance)?;
    let new_bpt_supply = mul_div_down(bpt_supply, new_invariant, previous_invariant)?;
    new_bpt_supply.sub(bpt_supply)
}

pub fn calc_bpt_in_per_wrapped_out(
    wrapped_out: Bfp,
    main_balance: Bfp,
    wrapped_balance: Bfp,
    bpt_supply: Bfp,
    params: &Params,
) -> Result<Bfp, BalancerError> {
    // Amount in, so we round up overall.
    let nominal_main = to_nominal(main_balance, params)?;
    let previous_invariant = calc_invariant(nominal_main, wrapped_balance)?;
    let new_wrapped_balance = wrapped_balance.sub(wrapped_out)?;
    let new_invariant = calc_invariant(nominal_main, new_wrapped_balance)?;
    let new_bpt_supply = mul_div_up(bpt_supply, new_invariant, previous_invariant)?;
    bpt_supply.sub(new_bpt_supply)
}

pub fn calc_wrapped_in_per_bpt_out(
    bpt_out: Bfp,
    main_balance: Bfp,
    wrapped_balance: Bfp,
    bpt_supply: Bfp,
    params: &Params,
) -> Result<Bfp, BalancerError> {
    // Amount in, so we round up overall.
    if bpt_supply.is_zero() {
        return Ok(bpt_out);
    }

    let nominal_main = to_nominal(main_balance, params)?;
    let previous_invariant = calc_invariant(nominal_main, wrapped_balance)?;
    let new_bpt_supply = bpt_supply.add(bpt_out)?;
    let new_wrapped_balance =
        mul_div_up(new_bpt_supply, previous_invariant, bpt_supply)?.sub(nominal_main)?;
    new_wrapped_balance.sub(wrapped_balance)
}

pub fn calc_wrapped_out_per_bpt_in(
    bpt_in: Bfp,
    main_balance: Bfp,
    wrapped_balance: Bfp,
    bpt_supply: Bfp,
    params: &Params,
) -> Result<Bfp, BalancerError> {
    // Amount out, so we round down overall.
    let nominal_main = to_nominal(main_balance, params)?;
    let previous_invariant = calc_invariant(nominal_main, wrapped_balance)?;
    let new_bpt_supply = bpt_supply.sub(bpt_in)?;
    let new_wrapped_balance =
        mul_div_up(new_bpt_supply, previous_invariant, bpt_supply)?.sub(nominal_main)?;
    wrapped_balance.sub(new_wrapped_balance)
}

pub fn calc_invariant(nominal_main_balance: Bfp, wrapped_balance: Bfp) -> Result<Bfp, BalancerError> {
    nominal_main_balance.add(wrapped_balance)
}

/// Main balance minus the fees charged on the part outside of the targets.
pub fn to_nominal(real: Bfp, params: &Params) -> Result<Bfp, BalancerError> {
    // Fees round down.
    if real < params.lower_target {
        let fees = params.lower_target.sub(real)?.mul_down(params.fee)?;
        real.sub(fees)
    } else if real <= params.upper_target {
        Ok(real)
    } else {
        let fees = real.sub(params.upper_target)?.mul_down(params.fee)?;
        real.sub(fees)
    }
}

/// Inverse of [`to_nominal`].
pub fn from_nominal(nominal: Bfp, params: &Params) -> Result<Bfp, BalancerError> {
    // real = nominal + fees, so rounding real down rounds the fees down.
    if nominal < params.lower_target {
        nominal
            .add(params.fee.mul_down(params.lower_target)?)?
            .div_down(Bfp::one().add(params.fee)?)
    } else if nominal <= params.upper_target {
        Ok(nominal)
    } else {
        nominal
            .sub(params.fee.mul_down(params.upper_target)?)?
            .div_down(Bfp::one().sub(params.fee)?)
    }
}

fn mul_div_down(a: Bfp, b: Bfp, c: Bfp) -> Result<Bfp, BalancerError> {
    let product = a.as_uint256().bmul(b.as_uint256())?;
    Ok(Bfp::from_wei(product.bdiv_down(c.as_uint256())?))
}

fn mul_div_up(a: Bfp, b: Bfp, c: Bfp) -> Result<Bfp, BalancerError> {
    let product = a.as_uint256().bmul(b.as_uint256())?;
    Ok(Bfp::from_wei(product.bdiv_up(c.as_uint256())?))
}
