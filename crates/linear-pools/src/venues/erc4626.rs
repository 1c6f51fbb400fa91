//! ERC-4626 tokenized vaults.

use {
    super::{Protocol, RevertSwitch, Venue, WrappedToken},
    crate::rate::{RateSource, RevertType, VenueRevert},
    alloy_primitives::U256,
    std::sync::RwLock,
};

#[derive(Clone, Copy, Debug, Default)]
pub struct Erc4626State {
    pub total_assets: U256,
    pub total_supply: U256,
}

pub struct Erc4626Vault {
    token: WrappedToken,
    state: RwLock<Erc4626State>,
    revert: RevertSwitch,
}

impl Erc4626Vault {
    pub fn new(token: WrappedToken, state: Erc4626State) -> Self {
        Self {
            token,
            state: RwLock::new(state),
            revert: RevertSwitch::default(),
        }
    }

    pub fn set_state(&self, state: Erc4626State) {
        *self.state.write().unwrap() = state;
    }

    pub fn set_revert_type(&self, revert_type: RevertType) {
        self.revert.set(revert_type);
    }

    /// `convertToAssets`: assets `shares` are worth. Rounds down.
    pub fn convert_to_assets(&self, shares: U256) -> Result<U256, VenueRevert> {
        let state = *self.state.read().unwrap();
        if state.total_supply.is_zero() {
            // An empty vault prices shares 1:1, adjusted for decimals.
            let shares = shares
                .checked_mul(U256::from(10).pow(U256::from(self.token.asset_decimals)))
                .ok_or_else(|| VenueRevert::Reason("conversion overflow".to_string()))?;
            return Ok(shares / U256::from(10).pow(U256::from(self.token.decimals)));
        }
        shares
            .checked_mul(state.total_assets)
            .map(|assets| assets / state.total_supply)
            .ok_or_else(|| VenueRevert::Reason("conversion overflow".to_string()))
    }
}

impl RateSource for Erc4626Vault {
    /// Assets one full share is worth, in the decimals of the asset.
    fn get_rate(&self) -> Result<U256, VenueRevert> {
        self.revert.check()?;
        self.convert_to_assets(U256::from(10).pow(U256::from(self.token.decimals)))
    }

    fn decimals(&self) -> u8 {
        self.token.asset_decimals
    }
}

impl Venue for Erc4626Vault {
    fn protocol(&self) -> Protocol {
        Protocol::Erc4626
    }

    fn wrapped_token(&self) -> WrappedToken {
        self.token
    }
}
