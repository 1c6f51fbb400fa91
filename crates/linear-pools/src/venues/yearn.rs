//! Yearn vault shares (`yvToken`), priced by `pricePerShare`.

use {
    super::{Protocol, RevertSwitch, Venue, WrappedToken},
    crate::rate::{RateSource, RevertType, VenueRevert},
    alloy_primitives::U256,
    std::sync::RwLock,
};

pub struct YearnVault {
    token: WrappedToken,
    price_per_share: RwLock<U256>,
    revert: RevertSwitch,
}

impl YearnVault {
    /// `price_per_share` is expressed in the decimals of the vault, which
    /// are those of its underlying asset.
    pub fn new(token: WrappedToken, price_per_share: U256) -> Self {
        Self {
            token,
            price_per_share: RwLock::new(price_per_share),
            revert: RevertSwitch::default(),
        }
    }

    pub fn set_price_per_share(&self, price_per_share: U256) {
        *self.price_per_share.write().unwrap() = price_per_share;
    }

    pub fn set_revert_type(&self, revert_type: RevertType) {
        self.revert.set(revert_type);
    }
}

impl RateSource for YearnVault {
    fn get_rate(&self) -> Result<U256, VenueRevert> {
        self.revert.check()?;
        Ok(*self.price_per_share.read().unwrap())
    }

    fn decimals(&self) -> u8 {
        self.token.asset_decimals
    }
}

impl Venue for YearnVault {
    fn protocol(&self) -> Protocol {
        Protocol::Yearn
    }

    fn wrapped_token(&self) -> WrappedToken {
        self.token
    }
}
