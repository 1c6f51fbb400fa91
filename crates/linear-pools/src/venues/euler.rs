//! Euler eTokens. eTokens always have 18 decimals and are priced with
//! `convertBalanceToUnderlying(1e18)`, which is expressed in the decimals of
//! the underlying asset.

use {
    super::{Protocol, RevertSwitch, Venue, WrappedToken},
    crate::rate::{RateSource, RevertType, VenueRevert},
    alloy_primitives::U256,
    std::sync::RwLock,
};

const ETOKEN_DECIMALS: u8 = 18;

#[derive(Clone, Copy, Debug, Default)]
pub struct EulerReserve {
    /// Underlying held or lent out by the market, in asset decimals.
    pub total_underlying: U256,
    /// Total eToken balances, 18 decimals.
    pub total_balances: U256,
}

pub struct EulerEToken {
    token: WrappedToken,
    reserve: RwLock<EulerReserve>,
    revert: RevertSwitch,
}

impl EulerEToken {
    pub fn new(token: WrappedToken, reserve: EulerReserve) -> Self {
        Self {
            token,
            reserve: RwLock::new(reserve),
            revert: RevertSwitch::default(),
        }
    }

    pub fn set_reserve(&self, reserve: EulerReserve) {
        *self.reserve.write().unwrap() = reserve;
    }

    pub fn set_revert_type(&self, revert_type: RevertType) {
        self.revert.set(revert_type);
    }

    pub fn convert_balance_to_underlying(&self, balance: U256) -> Result<U256, VenueRevert> {
        let reserve = *self.reserve.read().unwrap();
        let overflow = || VenueRevert::Reason("e/balance-overflow".to_string());
        if reserve.total_balances.is_zero() {
            let underlying = balance
                .checked_mul(U256::from(10).pow(U256::from(self.token.asset_decimals)))
                .ok_or_else(overflow)?;
            return Ok(underlying / U256::from(10).pow(U256::from(ETOKEN_DECIMALS)));
        }
        balance
            .checked_mul(reserve.total_underlying)
            .map(|underlying| underlying / reserve.total_balances)
            .ok_or_else(overflow)
    }
}

impl RateSource for EulerEToken {
    fn get_rate(&self) -> Result<U256, VenueRevert> {
        self.revert.check()?;
        self.convert_balance_to_underlying(U256::from(10).pow(U256::from(ETOKEN_DECIMALS)))
    }

    fn decimals(&self) -> u8 {
        self.token.asset_decimals
    }
}

impl Venue for EulerEToken {
    fn protocol(&self) -> Protocol {
        Protocol::Euler
    }

    fn wrapped_token(&self) -> WrappedToken {
        self.token
    }
}
