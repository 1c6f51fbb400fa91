//! Silo share tokens. The rate is the value of one share in the silo's
//! underlying asset, derived from the asset's total deposits and the share
//! token's supply.

use {
    super::{Protocol, RevertSwitch, Venue, WrappedToken, share_price},
    crate::rate::{RateSource, RevertType, VenueRevert},
    alloy_primitives::U256,
    std::sync::RwLock,
};

const RATE_DECIMALS: u8 = 18;

#[derive(Clone, Copy, Debug, Default)]
pub struct SiloAssetStorage {
    pub total_deposits: U256,
    pub total_shares: U256,
}

pub struct SiloShareToken {
    token: WrappedToken,
    storage: RwLock<SiloAssetStorage>,
    revert: RevertSwitch,
}

impl SiloShareToken {
    pub fn new(token: WrappedToken, storage: SiloAssetStorage) -> Self {
        Self {
            token,
            storage: RwLock::new(storage),
            revert: RevertSwitch::default(),
        }
    }

    pub fn set_storage(&self, storage: SiloAssetStorage) {
        *self.storage.write().unwrap() = storage;
    }

    pub fn set_revert_type(&self, revert_type: RevertType) {
        self.revert.set(revert_type);
    }
}

impl RateSource for SiloShareToken {
    fn get_rate(&self) -> Result<U256, VenueRevert> {
        self.revert.check()?;
        let storage = *self.storage.read().unwrap();
        share_price(storage.total_deposits, storage.total_shares, RATE_DECIMALS)
    }

    fn decimals(&self) -> u8 {
        RATE_DECIMALS
    }
}

impl Venue for SiloShareToken {
    fn protocol(&self) -> Protocol {
        Protocol::Silo
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
    };

    #[test]
    fn deposits_per_share() {
        let silo = SiloShareToken::new(
            WrappedToken {
                address: Address::repeat_byte(1),
                decimals: 18,
                asset: Address::repeat_byte(2),
                asset_decimals: 18,
            },
            SiloAssetStorage {
                total_deposits: U256::from(20_000),
                total_shares: U256::from(10_000),
            },
        );
        assert_eq!(
            normalize(silo.get_rate().unwrap(), silo.decimals()).unwrap(),
            bfp!("2")
        );
        assert!(!silo.enforce_asset_match());
    }
}
