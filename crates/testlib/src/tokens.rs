//! Mainnet addresses of tokens backing the linear pools under test.

use alloy_primitives::{Address, address};

/// Address for the `USDC` token.
pub const USDC: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");

/// Address for the `DAI` token.
pub const DAI: Address = address!("6B175474E89094C44Da98b954EedeAC495271d0F");

/// Address for the `USDT` token.
pub const USDT: Address = address!("dAC17F958D2ee523a2206206994597C13D831ec7");

/// Address for the `WBTC` token.
pub const WBTC: Address = address!("2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599");

/// Address for the `WETH` token.
pub const WETH: Address = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");

/// Address for the Yearn `yvUSDC` vault share.
pub const YV_USDC: Address = address!("a354F35829Ae975e850e23e9615b11Da1B3dC4DE");

/// Address for the Compound `cUSDC` token.
pub const C_USDC: Address = address!("39AA39c021dfbaE8faC545936693aC917d5E7563");

/// Address for the Aave `aUSDC` token.
pub const A_USDC: Address = address!("Bcca60bB61934080951369a648Fb03DF4F96263C");
