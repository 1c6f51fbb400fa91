//! The Vault holding pool balances, and the types of its swap and asset
//! management interface.

use {
    crate::error::Error,
    alloy_primitives::{Address, B256, U256},
    std::sync::Weak,
};

pub mod in_memory;

pub use self::in_memory::InMemoryVault;

/// Pool identifier: the pool address followed by its specialization and a
/// registration nonce.
pub type PoolId = B256;

/// Balance of a single token in a pool.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PoolTokenInfo {
    /// Tokens held by the Vault.
    pub cash: U256,
    /// Tokens taken out of the Vault by the asset manager.
    pub managed: U256,
    pub asset_manager: Address,
}

impl PoolTokenInfo {
    pub fn total(&self) -> Option<U256> {
        self.cash.checked_add(self.managed)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display)]
pub enum SwapKind {
    /// The amount is the exact input, the output is computed.
    GivenIn,
    /// The amount is the exact output, the input is computed.
    GivenOut,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SingleSwap {
    pub pool_id: PoolId,
    pub kind: SwapKind,
    pub asset_in: Address,
    pub asset_out: Address,
    pub amount: U256,
}

/// Where the tokens of a swap come from and go to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FundManagement {
    pub sender: Address,
    pub recipient: Address,
}

/// A swap as seen by the pool.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SwapRequest {
    pub kind: SwapKind,
    pub token_in: Address,
    pub token_out: Address,
    pub amount: U256,
    pub pool_id: PoolId,
    pub from: Address,
    pub to: Address,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PoolBalanceOpKind {
    /// Moves cash to the asset manager, increasing the managed balance.
    Withdraw,
    /// Moves tokens from the asset manager back into cash, decreasing the
    /// managed balance.
    Deposit,
    /// Sets the managed balance, recording gains or losses.
    Update,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PoolBalanceOp {
    pub kind: PoolBalanceOpKind,
    pub pool_id: PoolId,
    pub token: Address,
    pub amount: U256,
}

/// A pool whose swaps are priced by the pool itself.
pub trait BasePool: Send + Sync {
    /// Amount out for `GivenIn` requests, amount in for `GivenOut` requests.
    /// `balances` are the total (cash plus managed) balances of the pool
    /// tokens in registration order.
    fn on_swap(
        &self,
        request: &SwapRequest,
        balances: &[U256],
        index_in: usize,
        index_out: usize,
    ) -> Result<U256, Error>;
}

#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
pub trait Vault: Send + Sync {
    fn address(&self) -> Address;

    /// Registers a pool. The Vault keeps a weak reference so pools can own
    /// their Vault.
    fn register_pool(&self, pool: Weak<dyn BasePool>, pool_address: Address) -> PoolId;

    fn register_tokens(
        &self,
        pool_id: PoolId,
        tokens: &[Address],
        asset_managers: &[Address],
    ) -> Result<(), Error>;

    /// Moves `amounts` of the pool tokens from `sender` into the pool's cash.
    fn join_pool(&self, pool_id: PoolId, sender: Address, amounts: &[U256]) -> Result<(), Error>;

    fn get_pool(&self, pool_id: PoolId) -> Result<Address, Error>;

    /// Tokens and total balances of a pool.
    fn get_pool_tokens(&self, pool_id: PoolId) -> Result<(Vec<Address>, Vec<U256>), Error>;

    fn get_pool_token_info(&self, pool_id: PoolId, token: Address)
    -> Result<PoolTokenInfo, Error>;

    /// Executes a swap and returns the computed amount. `limit` is the
    /// minimum amount out for `GivenIn` swaps and the maximum amount in for
    /// `GivenOut` swaps.
    fn swap(
        &self,
        single_swap: SingleSwap,
        funds: FundManagement,
        limit: U256,
        deadline: u64,
    ) -> Result<U256, Error>;

    /// Applies asset manager operations. Either all operations succeed or
    /// none is applied.
    fn manage_pool_balance(&self, sender: Address, ops: &[PoolBalanceOp]) -> Result<(), Error>;
}
