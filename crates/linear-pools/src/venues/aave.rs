//! Static aTokens, valued with the reserve normalized income of the Aave
//! lending pool.

use {
    super::{Protocol, RevertSwitch, Venue, WrappedToken},
    crate::rate::{RateSource, RevertType, VenueRevert},
    alloy_primitives::U256,
    std::sync::RwLock,
};

/// Precision of Aave's ray math.
const RAY_DECIMALS: u8 = 27;

pub struct AaveStaticToken {
    token: WrappedToken,
    reserve_normalized_income: RwLock<U256>,
    revert: RevertSwitch,
}

impl AaveStaticToken {
    /// `reserve_normalized_income` is a ray (27 decimals).
    pub fn new(token: WrappedToken, reserve_normalized_income: U256) -> Self {
        Self {
            token,
            reserve_normalized_income: RwLock::new(reserve_normalized_income),
            revert: RevertSwitch::default(),
        }
    }

    pub fn set_reserve_normalized_income(&self, income: U256) {
        *self.reserve_normalized_income.write().unwrap() = income;
    }

    pub fn set_revert_type(&self, revert_type: RevertType) {
        self.revert.set(revert_type);
    }
}

impl RateSource for AaveStaticToken {
    fn get_rate(&self) -> Result<U256, VenueRevert> {
        self.revert.check()?;
        Ok(*self.reserve_normalized_income.read().unwrap())
    }

    fn decimals(&self) -> u8 {
        RAY_DECIMALS
    }
}

impl Venue for AaveStaticToken {
    fn protocol(&self) -> Protocol {
        Protocol::Aave
    }

    fn wrapped_token(&self) -> WrappedToken {
        self.token
    }
}
