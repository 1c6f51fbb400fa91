//! Yield venues issuing the wrapped tokens held by linear pools.
//!
//! Every protocol exposes its exchange rate differently. Each model below
//! captures the venue state that determines the rate and reports it through
//! [`RateSource`] in the venue's native precision; the pools normalize it
//! with [`crate::rate::normalize`].

pub mod aave;
pub mod bprotocol;
pub mod erc4626;
pub mod euler;
pub mod gearbox;
pub mod midas;
pub mod reaper;
pub mod silo;
pub mod tetu;
pub mod yearn;

use {
    crate::{
        error::{BalancerError, Error},
        fixed_point::Bfp,
        math::{BalU256, decimals_factor},
        rate::{self, RateSource, RevertType, VenueRevert},
        tokens::Tokens,
    },
    alloy_primitives::{Address, U256},
    std::sync::RwLock,
};

/// Protocols wrapped tokens can come from.
#[derive(
    Clone, Copy, Debug, Eq, Hash, PartialEq, strum::Display, strum::EnumIter, strum::EnumString,
)]
pub enum Protocol {
    Aave,
    BProtocol,
    Erc4626,
    Euler,
    Gearbox,
    Midas,
    Reaper,
    Silo,
    Tetu,
    Yearn,
}

impl Protocol {
    /// Whether pools require the venue's underlying asset to be their main
    /// token. Silo and B.Protocol wrapped tokens don't expose a reliable
    /// asset getter, so the check is skipped for them.
    pub fn enforces_asset_match(self) -> bool {
        !matches!(self, Self::Silo | Self::BProtocol)
    }
}

/// A wrapped token together with the asset it is redeemable for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WrappedToken {
    pub address: Address,
    pub decimals: u8,
    /// Underlying asset reported by the venue.
    pub asset: Address,
    pub asset_decimals: u8,
}

/// A venue that issues wrapped tokens and reports their rate.
///
/// Tokens deposited into the venue are held at the wrapped token address.
pub trait Venue: RateSource {
    fn protocol(&self) -> Protocol;

    fn wrapped_token(&self) -> WrappedToken;

    fn enforce_asset_match(&self) -> bool {
        self.protocol().enforces_asset_match()
    }

    /// Deposits `assets` main tokens from `account` and mints wrapped tokens
    /// to it. Returns the minted amount.
    fn deposit(&self, tokens: &dyn Tokens, account: Address, assets: U256) -> Result<U256, Error> {
        let token = self.wrapped_token();
        let rate = rate::normalize(self.get_rate()?, self.decimals())?;
        let shares = to_wrapped(&token, assets, rate)?;
        tokens.transfer(token.asset, account, token.address, assets)?;
        tokens.mint(token.address, account, shares)?;
        Ok(shares)
    }

    /// Burns `shares` wrapped tokens of `account` and sends it the underlying
    /// main tokens. Returns the redeemed amount.
    fn redeem(&self, tokens: &dyn Tokens, account: Address, shares: U256) -> Result<U256, Error> {
        let token = self.wrapped_token();
        let rate = rate::normalize(self.get_rate()?, self.decimals())?;
        let assets = to_main(&token, shares, rate)?;
        if tokens.balance_of(token.address, account) < shares {
            return Err(BalancerError::Erc20TransferExceedsBalance.into());
        }
        tokens.transfer(token.asset, token.address, account, assets)?;
        tokens.burn(token.address, account, shares)?;
        Ok(assets)
    }
}

/// Main tokens `shares` wrapped tokens are worth at `rate`. Rounds down.
pub fn to_main(token: &WrappedToken, shares: U256, rate: Bfp) -> Result<U256, BalancerError> {
    let value = Bfp::from_wei(shares.bmul(decimals_factor(token.decimals)?)?).mul_down(rate)?;
    value
        .as_uint256()
        .bdiv_down(decimals_factor(token.asset_decimals)?)
}

/// Wrapped tokens minted for `assets` main tokens at `rate`. Rounds down.
pub fn to_wrapped(token: &WrappedToken, assets: U256, rate: Bfp) -> Result<U256, BalancerError> {
    let value = Bfp::from_wei(assets.bmul(decimals_factor(token.asset_decimals)?)?);
    value
        .div_down(rate)?
        .as_uint256()
        .bdiv_down(decimals_factor(token.decimals)?)
}

/// Smallest amount of main tokens that mints at least `shares` wrapped tokens
/// at `rate`.
pub fn main_required_to_mint(
    token: &WrappedToken,
    shares: U256,
    rate: Bfp,
) -> Result<U256, BalancerError> {
    let value = Bfp::from_wei(shares.bmul(decimals_factor(token.decimals)?)?).mul_up(rate)?;
    value
        .as_uint256()
        .bdiv_up(decimals_factor(token.asset_decimals)?)
}

/// Revert behaviour of a venue, configurable at runtime.
#[derive(Debug, Default)]
pub struct RevertSwitch(RwLock<RevertType>);

impl RevertSwitch {
    pub fn set(&self, revert_type: RevertType) {
        *self.0.write().unwrap() = revert_type;
    }

    pub fn get(&self) -> RevertType {
        *self.0.read().unwrap()
    }

    pub fn check(&self) -> Result<(), VenueRevert> {
        self.get().check()
    }
}

/// `numerator * 10^decimals / denominator` for share based venues, `one` when
/// nothing has been deposited yet.
fn share_price(
    numerator: U256,
    denominator: U256,
    decimals: u8,
) -> Result<U256, VenueRevert> {
    let one = U256::from(10)
        .checked_pow(U256::from(decimals))
        .ok_or_else(|| VenueRevert::Reason("share price precision overflow".to_string()))?;
    if denominator.is_zero() {
        return Ok(one);
    }
    numerator
        .checked_mul(one)
        .map(|scaled| scaled / denominator)
        .ok_or_else(|| VenueRevert::Reason("share price overflow".to_string()))
}
