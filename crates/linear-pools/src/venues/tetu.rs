//! Tetu smart vault shares. The share price accounts for the underlying kept
//! in the vault as well as the underlying invested by its strategy.

use {
    super::{Protocol, RevertSwitch, Venue, WrappedToken, share_price},
    crate::rate::{RateSource, RevertType, VenueRevert},
    alloy_primitives::U256,
    std::sync::RwLock,
};

#[derive(Clone, Copy, Debug, Default)]
pub struct TetuVaultState {
    pub underlying_balance_in_vault: U256,
    pub invested_underlying_balance: U256,
    pub total_supply: U256,
}

pub struct TetuSmartVault {
    token: WrappedToken,
    state: RwLock<TetuVaultState>,
    revert: RevertSwitch,
}

impl TetuSmartVault {
    pub fn new(token: WrappedToken, state: TetuVaultState) -> Self {
        Self {
            token,
            state: RwLock::new(state),
            revert: RevertSwitch::default(),
        }
    }

    pub fn set_state(&self, state: TetuVaultState) {
        *self.state.write().unwrap() = state;
    }

    pub fn set_revert_type(&self, revert_type: RevertType) {
        self.revert.set(revert_type);
    }
}

impl RateSource for TetuSmartVault {
    /// `getPricePerFullShare`, in the decimals of the underlying asset.
    fn get_rate(&self) -> Result<U256, VenueRevert> {
        self.revert.check()?;
        let state = *self.state.read().unwrap();
        let underlying = state
            .underlying_balance_in_vault
            .checked_add(state.invested_underlying_balance)
            .ok_or_else(|| VenueRevert::Reason("underlying balance overflow".to_string()))?;
        share_price(underlying, state.total_supply, self.token.asset_decimals)
    }

    fn decimals(&self) -> u8 {
        self.token.asset_decimals
    }
}

impl Venue for TetuSmartVault {
    fn protocol(&self) -> Protocol {
        Protocol::Tetu
    }

    fn wrapped_token(&self) -> WrappedToken {
        self.token
    }
}
