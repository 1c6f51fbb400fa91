//! The band of main token balances a linear pool considers healthy.
//!
//! All values are upscaled to 18 decimals, independently of the decimals of
//! the main token.

use {crate::error::BalancerError, alloy_primitives::U256};

/// Upper targets are stored in 96 bits by the pools.
pub const MAX_UPPER_TARGET: U256 = U256::from_limbs([u64::MAX, (1 << 32) - 1, 0, 0]);

/// Lower and upper bound of the main token balance, inclusive.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Targets {
    lower: U256,
    upper: U256,
}

/// Where a main token balance lies relative to a [`Targets`] band.
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display)]
pub enum BandState {
    /// Within the band, boundaries included.
    Balanced,
    /// Above the upper target.
    MainExcess,
    /// Below the lower target.
    MainLack,
}

impl Targets {
    pub fn new(lower: U256, upper: U256) -> Result<Self, BalancerError> {
        if lower > upper {
            return Err(BalancerError::InvalidTargets);
        }
        if upper > MAX_UPPER_TARGET {
            return Err(BalancerError::UpperTargetTooHigh);
        }
        Ok(Self { lower, upper })
    }

    pub fn lower(&self) -> U256 {
        self.lower
    }

    pub fn upper(&self) -> U256 {
        self.upper
    }

    /// Balance the rebalancer steers towards. Rounds down.
    pub fn midpoint(&self) -> U256 {
        // Both targets fit in 96 bits so the sum can't overflow.
        (self.lower + self.upper) / U256::from(2)
    }

    pub fn contains(&self, balance: U256) -> bool {
        self.lower <= balance && balance <= self.upper
    }

    pub fn state(&self, balance: U256) -> BandState {
        if balance > self.upper {
            BandState::MainExcess
        } else if balance < self.lower {
            BandState::MainLack
        } else {
            BandState::Balanced
        }
    }
}
