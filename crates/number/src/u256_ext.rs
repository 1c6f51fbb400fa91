//! Extension trait for U256 arithmetic operations.

use alloy_primitives::U256;

/// Extension trait for U256 to add utility methods.
pub trait U256Ext: Sized {
    /// `10^exponent`, `None` if it does not fit into 256 bits.
    fn checked_exp10(exponent: u32) -> Option<Self>;
}

impl U256Ext for U256 {
    fn checked_exp10(exponent: u32) -> Option<Self> {
        U256::from(10u64).checked_pow(U256::from(exponent))
    }
}
