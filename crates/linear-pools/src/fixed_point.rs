//! Fixed point arithmetic with 18 decimals, matching the rounding behaviour of
//! Balancer's `FixedPoint` library.

use {
    crate::{error::BalancerError, math::BalU256},
    alloy_primitives::U256,
    anyhow::{Context, Result, bail, ensure},
    number::u256_ext::U256Ext,
    std::{
        fmt::{self, Debug, Display, Formatter},
        str::FromStr,
    },
};

const DECIMALS: usize = 18;
const ONE_18: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// An unsigned fixed point number with 18 decimals of precision.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Bfp(U256);

impl Bfp {
    pub const fn zero() -> Self {
        Self(U256::ZERO)
    }

    pub const fn one() -> Self {
        Self(ONE_18)
    }

    /// Wraps a raw value already scaled by `10^18`.
    pub const fn from_wei(num: U256) -> Self {
        Self(num)
    }

    /// Converts an integer into a fixed point number.
    pub fn from_integer(num: u64) -> Self {
        Self(U256::from(num) * ONE_18)
    }

    /// `10^exp` as a fixed point number.
    pub fn exp10(exp: u32) -> Result<Self, BalancerError> {
        let value = U256::checked_exp10(exp).ok_or(BalancerError::MulOverflow)?;
        Ok(Self(value.bmul(ONE_18)?))
    }

    pub fn as_uint256(self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn add(self, other: Self) -> Result<Self, BalancerError> {
        Ok(Self(self.0.badd(other.0)?))
    }

    pub fn sub(self, other: Self) -> Result<Self, BalancerError> {
        Ok(Self(self.0.bsub(other.0)?))
    }

    pub fn mul_down(self, other: Self) -> Result<Self, BalancerError> {
        Ok(Self(self.0.bmul(other.0)? / ONE_18))
    }

    pub fn mul_up(self, other: Self) -> Result<Self, BalancerError> {
        let product = self.0.bmul(other.0)?;
        if product.is_zero() {
            return Ok(Self::zero());
        }
        Ok(Self((product - U256::from(1u64)) / ONE_18 + U256::from(1u64)))
    }

    pub fn div_down(self, other: Self) -> Result<Self, BalancerError> {
        if other.is_zero() {
            return Err(BalancerError::ZeroDivision);
        }
        Ok(Self(self.0.bmul(ONE_18)? / other.0))
    }

    pub fn div_up(self, other: Self) -> Result<Self, BalancerError> {
        if other.is_zero() {
            return Err(BalancerError::ZeroDivision);
        }
        Ok(Self(self.0.bmul(ONE_18)?.bdiv_up(other.0)?))
    }

    /// `1 - self`, saturating at zero.
    pub fn complement(self) -> Self {
        if self.0 < ONE_18 {
            Self(ONE_18 - self.0)
        } else {
            Self::zero()
        }
    }
}

impl FromStr for Bfp {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (integer, decimals) = s.split_once('.').unwrap_or((s, ""));
        ensure!(!integer.is_empty(), "missing integer part in {s:?}");
        ensure!(
            decimals.len() <= DECIMALS,
            "too many decimals in {s:?}, at most {DECIMALS} are supported"
        );
        if !decimals.chars().all(|c| c.is_ascii_digit()) {
            bail!("invalid decimals in {s:?}");
        }
        let integer = U256::from_str_radix(integer, 10)
            .with_context(|| format!("invalid integer part in {s:?}"))?;
        let decimals = format!("{decimals:0<DECIMALS$}");
        let decimals = U256::from_str_radix(&decimals, 10)?;
        let value = integer
            .checked_mul(ONE_18)
            .and_then(|value| value.checked_add(decimals))
            .context("fixed point value too large")?;
        Ok(Self(value))
    }
}

impl Display for Bfp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let integer = self.0 / ONE_18;
        let decimals = self.0 % ONE_18;
        let decimals = format!("{decimals:0>DECIMALS$}");
        let decimals = decimals.trim_end_matches('0');
        if decimals.is_empty() {
            write!(f, "{integer}")
        } else {
            write!(f, "{integer}.{decimals}")
        }
    }
}

impl Debug for Bfp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}.{:0>18}", self.0 / ONE_18, self.0 % ONE_18)
    }
}
