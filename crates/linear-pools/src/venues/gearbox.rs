//! Gearbox diesel tokens, valued with the pool's diesel rate.

use {
    super::{Protocol, RevertSwitch, Venue, WrappedToken},
    crate::rate::{RateSource, RevertType, VenueRevert},
    alloy_primitives::U256,
    std::sync::RwLock,
};

const RAY_DECIMALS: u8 = 27;

pub struct GearboxDieselToken {
    token: WrappedToken,
    diesel_rate: RwLock<U256>,
    revert: RevertSwitch,
}

impl GearboxDieselToken {
    /// `diesel_rate` is a ray (27 decimals), see `getDieselRate_RAY`.
    pub fn new(token: WrappedToken, diesel_rate: U256) -> Self {
        Self {
            token,
            diesel_rate: RwLock::new(diesel_rate),
            revert: RevertSwitch::default(),
        }
    }

    pub fn set_diesel_rate(&self, diesel_rate: U256) {
        *self.diesel_rate.write().unwrap() = diesel_rate;
    }

    pub fn set_revert_type(&self, revert_type: RevertType) {
        self.revert.set(revert_type);
    }
}

impl RateSource for GearboxDieselToken {
    fn get_rate(&self) -> Result<U256, VenueRevert> {
        self.revert.check()?;
        Ok(*self.diesel_rate.read().unwrap())
    }

    fn decimals(&self) -> u8 {
        RAY_DECIMALS
    }
}

impl Venue for GearboxDieselToken {
    fn protocol(&self) -> Protocol {
        Protocol::Gearbox
    }

    fn wrapped_token(&self) -> WrappedToken {
        self.token
    }
}
