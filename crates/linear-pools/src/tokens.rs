//! ERC20 token balances seen by pools, vault, venues and rebalancers.

use {
    crate::{
        error::{BalancerError, Error},
        math::BalU256,
    },
    alloy_primitives::{Address, U256},
    std::{collections::HashMap, sync::Mutex},
};

#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
pub trait Tokens: Send + Sync {
    /// Decimals of a known token.
    fn decimals(&self, token: Address) -> Result<u8, Error>;

    /// Deploys a new token at `token`.
    fn deploy_token(&self, token: Address, decimals: u8) -> Result<(), Error>;

    fn balance_of(&self, token: Address, account: Address) -> U256;

    fn transfer(&self, token: Address, from: Address, to: Address, amount: U256)
    -> Result<(), Error>;

    fn mint(&self, token: Address, to: Address, amount: U256) -> Result<(), Error>;

    fn burn(&self, token: Address, from: Address, amount: U256) -> Result<(), Error>;
}

/// In-memory token balances.
#[derive(Debug, Default)]
pub struct Ledger {
    state: Mutex<LedgerState>,
}

#[derive(Debug, Default)]
struct LedgerState {
    decimals: HashMap<Address, u8>,
    balances: HashMap<(Address, Address), U256>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `token` known to the ledger.
    pub fn register_token(&self, token: Address, decimals: u8) {
        self.state.lock().unwrap().decimals.insert(token, decimals);
    }

    pub fn with_token(self, token: Address, decimals: u8) -> Self {
        self.register_token(token, decimals);
        self
    }
}

impl LedgerState {
    fn ensure_known(&self, token: Address) -> Result<(), Error> {
        if !self.decimals.contains_key(&token) {
            return Err(BalancerError::InvalidToken.into());
        }
        Ok(())
    }

    fn balance(&self, token: Address, account: Address) -> U256 {
        self.balances
            .get(&(token, account))
            .copied()
            .unwrap_or_default()
    }
}

impl Tokens for Ledger {
    fn decimals(&self, token: Address) -> Result<u8, Error> {
        self.state
            .lock()
            .unwrap()
            .decimals
            .get(&token)
            .copied()
            .ok_or(BalancerError::InvalidToken.into())
    }

    fn deploy_token(&self, token: Address, decimals: u8) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        if state.decimals.contains_key(&token) {
            return Err(BalancerError::InvalidToken.into());
        }
        state.decimals.insert(token, decimals);
        Ok(())
    }

    fn balance_of(&self, token: Address, account: Address) -> U256 {
        self.state.lock().unwrap().balance(token, account)
    }

    fn transfer(
        &self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.ensure_known(token)?;
        let from_balance = state
            .balance(token, from)
            .checked_sub(amount)
            .ok_or(BalancerError::Erc20TransferExceedsBalance)?;
        state.balances.insert((token, from), from_balance);
        let to_balance = state.balance(token, to).badd(amount)?;
        state.balances.insert((token, to), to_balance);
        Ok(())
    }

    fn mint(&self, token: Address, to: Address, amount: U256) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.ensure_known(token)?;
        let balance = state.balance(token, to).badd(amount)?;
        state.balances.insert((token, to), balance);
        Ok(())
    }

    fn burn(&self, token: Address, from: Address, amount: U256) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.ensure_known(token)?;
        let balance = state
            .balance(token, from)
            .checked_sub(amount)
            .ok_or(BalancerError::Erc20TransferExceedsBalance)?;
        state.balances.insert((token, from), balance);
        Ok(())
    }
}
