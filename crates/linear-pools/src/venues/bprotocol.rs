//! B.Protocol stability pool shares.

use {
    super::{Protocol, RevertSwitch, Venue, WrappedToken},
    crate::rate::{RateSource, RevertType, VenueRevert},
    alloy_primitives::U256,
    std::sync::RwLock,
};

const RATE_DECIMALS: u8 = 18;

pub struct BProtocolPool {
    token: WrappedToken,
    shares_exchange_rate: RwLock<U256>,
    revert: RevertSwitch,
}

impl BProtocolPool {
    /// `shares_exchange_rate` has 18 decimals.
    pub fn new(token: WrappedToken, shares_exchange_rate: U256) -> Self {
        Self {
            token,
            shares_exchange_rate: RwLock::new(shares_exchange_rate),
            revert: RevertSwitch::default(),
        }
    }

    pub fn set_shares_exchange_rate(&self, rate: U256) {
        *self.shares_exchange_rate.write().unwrap() = rate;
    }

    pub fn set_revert_type(&self, revert_type: RevertType) {
        self.revert.set(revert_type);
    }
}

impl RateSource for BProtocolPool {
    fn get_rate(&self) -> Result<U256, VenueRevert> {
        self.revert.check()?;
        Ok(*self.shares_exchange_rate.read().unwrap())
    }

    fn decimals(&self) -> u8 {
        RATE_DECIMALS
    }
}

impl Venue for BProtocolPool {
    fn protocol(&self) -> Protocol {
        Protocol::BProtocol
    }

    fn wrapped_token(&self) -> WrappedToken {
        self.token
    }
}
