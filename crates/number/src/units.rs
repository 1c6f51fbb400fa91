use alloy_primitives::{
    U256,
    utils::{ParseUnits, parse_units},
};

/// Conversions from human readable amounts into raw token amounts.
pub trait TokenUnit: std::marker::Sized {
    /// Returns the amount as an 18-decimal fixed point value.
    fn fp(self) -> U256 {
        self.units(18)
    }

    /// Returns the amount expressed with `decimals` decimals.
    fn units(self, decimals: u8) -> U256;
}

impl TokenUnit for u64 {
    fn units(self, decimals: u8) -> U256 {
        U256::from(self) * U256::from(10u64).pow(U256::from(decimals))
    }
}

impl TokenUnit for u128 {
    fn units(self, decimals: u8) -> U256 {
        U256::from(self) * U256::from(10u64).pow(U256::from(decimals))
    }
}

impl TokenUnit for f64 {
    fn units(self, decimals: u8) -> U256 {
        match parse_units(&self.to_string(), decimals).unwrap() {
            ParseUnits::U256(val) => val,
            _ => panic!("could not parse number as u256: {self}"),
        }
    }
}
