//! Reaper crypt vaults.

use {
    super::{Protocol, RevertSwitch, Venue, WrappedToken, share_price},
    crate::rate::{RateSource, RevertType, VenueRevert},
    alloy_primitives::U256,
    std::sync::RwLock,
};

const SHARE_DECIMALS: u8 = 18;

#[derive(Clone, Copy, Debug, Default)]
pub struct ReaperVaultState {
    /// Underlying held by the vault and its strategy, in asset decimals.
    pub balance: U256,
    pub total_supply: U256,
}

pub struct ReaperVault {
    token: WrappedToken,
    state: RwLock<ReaperVaultState>,
    revert: RevertSwitch,
}

impl ReaperVault {
    pub fn new(token: WrappedToken, state: ReaperVaultState) -> Self {
        Self {
            token,
            state: RwLock::new(state),
            revert: RevertSwitch::default(),
        }
    }

    pub fn set_state(&self, state: ReaperVaultState) {
        *self.state.write().unwrap() = state;
    }

    pub fn set_revert_type(&self, revert_type: RevertType) {
        self.revert.set(revert_type);
    }
}

impl RateSource for ReaperVault {
    /// `getPricePerFullShare`, always 18 decimals.
    fn get_rate(&self) -> Result<U256, VenueRevert> {
        self.revert.check()?;
        let state = *self.state.read().unwrap();
        share_price(state.balance, state.total_supply, SHARE_DECIMALS)
    }

    fn decimals(&self) -> u8 {
        SHARE_DECIMALS
    }
}

impl Venue for ReaperVault {
    fn protocol(&self) -> Protocol {
        Protocol::Reaper
    }

    fn wrapped_token(&self) -> WrappedToken {
        self.token
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{bfp, rate::normalize},
        alloy_primitives::Address,
        number::units::TokenUnit,
    };

    #[test]
    fn price_per_full_share() {
        let vault = ReaperVault::new(
            WrappedToken {
                address: Address::repeat_byte(1),
                decimals: 18,
                asset: Address::repeat_byte(2),
                asset_decimals: 18,
            },
            ReaperVaultState {
                balance: 200u64.fp(),
                total_supply: 200u64.fp(),
            },
        );
        let rate = || normalize(vault.get_rate().unwrap(), vault.decimals()).unwrap();
        assert_eq!(rate(), bfp!("1"));

        vault.set_state(ReaperVaultState {
            balance: 100u64.fp(),
            total_supply: 200u64.fp(),
        });
        assert_eq!(rate(), bfp!("0.5"));

        vault.set_state(ReaperVaultState::default());
        assert_eq!(rate(), bfp!("1"));
    }
}
