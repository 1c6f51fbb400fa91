use {crate::error::BalancerError, alloy_primitives::U256, number::u256_ext::U256Ext};

/// `10^(18 - decimals)`, the factor upscaling amounts of a token with
/// `decimals` decimals to 18 decimals. Tokens with more than 18 decimals are
/// not supported.
pub fn decimals_factor(decimals: u8) -> Result<U256, BalancerError> {
    let exponent = 18u8
        .checked_sub(decimals)
        .ok_or(BalancerError::SubOverflow)?;
    U256::checked_exp10(u32::from(exponent)).ok_or(BalancerError::MulOverflow)
}

/// Checked integer arithmetic on raw token amounts. Failures carry the
/// Balancer error code of the operation that failed.
pub trait BalU256: Sized {
    fn bmul(self, other: Self) -> Result<Self, BalancerError>;
    fn badd(self, other: Self) -> Result<Self, BalancerError>;
    fn bsub(self, other: Self) -> Result<Self, BalancerError>;
    /// Truncating division.
    fn bdiv_down(self, other: Self) -> Result<Self, BalancerError>;
    /// Division rounding any remainder up.
    fn bdiv_up(self, other: Self) -> Result<Self, BalancerError>;
}

impl BalU256 for U256 {
    fn bmul(self, other: Self) -> Result<Self, BalancerError> {
        self.checked_mul(other).ok_or(BalancerError::MulOverflow)
    }

    fn badd(self, other: Self) -> Result<Self, BalancerError> {
        self.checked_add(other).ok_or(BalancerError::AddOverflow)
    }

    fn bsub(self, other: Self) -> Result<Self, BalancerError> {
        self.checked_sub(other).ok_or(BalancerError::SubOverflow)
    }

    fn bdiv_down(self, other: Self) -> Result<Self, BalancerError> {
        self.checked_div(other).ok_or(BalancerError::ZeroDivision)
    }

    fn bdiv_up(self, other: Self) -> Result<Self, BalancerError> {
        let quotient = self.bdiv_down(other)?;
        if (self % other).is_zero() {
            Ok(quotient)
        } else {
            Ok(quotient + U256::from(1))
        }
    }
}
