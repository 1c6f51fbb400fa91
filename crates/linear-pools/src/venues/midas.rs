//! Midas (Compound fork) cTokens.
//!
//! `exchangeRateStored` is scaled by `10^(18 - wrappedDecimals +
//! underlyingDecimals)`, so a cToken with 8 decimals backed by USDC reports
//! its rate with 16 decimals.

use {
    super::{Protocol, RevertSwitch, Venue, WrappedToken},
    crate::rate::{RateSource, RevertType, VenueRevert},
    alloy_primitives::U256,
    std::sync::RwLock,
};

pub struct MidasCToken {
    token: WrappedToken,
    exchange_rate_stored: RwLock<U256>,
    revert: RevertSwitch,
}

impl MidasCToken {
    pub fn new(token: WrappedToken, exchange_rate_stored: U256) -> Self {
        Self {
            token,
            exchange_rate_stored: RwLock::new(exchange_rate_stored),
            revert: RevertSwitch::default(),
        }
    }

    pub fn set_exchange_rate_stored(&self, exchange_rate: U256) {
        *self.exchange_rate_stored.write().unwrap() = exchange_rate;
    }

    pub fn set_revert_type(&self, revert_type: RevertType) {
        self.revert.set(revert_type);
    }
}

impl RateSource for MidasCToken {
    fn get_rate(&self) -> Result<U256, VenueRevert> {
        self.revert.check()?;
        Ok(*self.exchange_rate_stored.read().unwrap())
    }

    fn decimals(&self) -> u8 {
        18u8.saturating_add(self.token.asset_decimals)
            .saturating_sub(self.token.decimals)
    }
}

impl Venue for MidasCToken {
    fn protocol(&self) -> Protocol {
        Protocol::Midas
    }

    fn wrapped_token(&self) -> WrappedToken {
        self.token
    }
}
