//! Mainnet addresses of Balancer protocol contracts.

use alloy_primitives::{Address, address};

/// Address for the Balancer V2 vault.
pub const VAULT: Address = address!("BA12222222228d8Ba445958a75a0704d566BF2C8");

/// Address for the Balancer V2 authorizer.
pub const AUTHORIZER: Address = address!("A331D84eC860Bf466b4CdCcFb4aC09a1B43F3aE6");

/// Address of the Balancer DAO multisig.
pub const DAO_MULTISIG: Address = address!("10A19e7eE7d7F8a52822f6817de8ea18204F2e4f");
