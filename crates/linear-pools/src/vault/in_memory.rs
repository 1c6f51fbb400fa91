//! A Vault keeping pool balances in memory and moving tokens through a
//! [`Tokens`] ledger.

use {
    super::{
        BasePool,
        FundManagement,
        PoolBalanceOp,
        PoolBalanceOpKind,
        PoolId,
        PoolTokenInfo,
        SingleSwap,
        SwapKind,
        SwapRequest,
        Vault,
    },
    crate::{
        clock::Clock,
        error::{BalancerError, Error},
        math::BalU256,
        tokens::Tokens,
    },
    alloy_primitives::{Address, B256, U256},
    std::{
        collections::HashMap,
        sync::{Arc, Mutex, Weak},
    },
    tracing::instrument,
};

/// Two token pools only ever see general specialization.
const GENERAL_SPECIALIZATION: u16 = 0;

pub struct InMemoryVault {
    address: Address,
    tokens: Arc<dyn Tokens>,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    nonce: u64,
    pools: HashMap<PoolId, RegisteredPool>,
}

#[derive(Clone)]
struct RegisteredPool {
    address: Address,
    pool: Weak<dyn BasePool>,
    tokens: Vec<Address>,
    balances: Vec<PoolTokenInfo>,
}

impl RegisteredPool {
    fn index_of(&self, token: Address) -> Result<usize, BalancerError> {
        self.tokens
            .iter()
            .position(|registered| *registered == token)
            .ok_or(BalancerError::TokenNotRegistered)
    }

    fn total_balances(&self) -> Result<Vec<U256>, BalancerError> {
        self.balances
            .iter()
            .map(|info| info.total().ok_or(BalancerError::AddOverflow))
            .collect()
    }
}

impl State {
    fn pool(&self, pool_id: PoolId) -> Result<&RegisteredPool, BalancerError> {
        self.pools.get(&pool_id).ok_or(BalancerError::InvalidPoolId)
    }

    fn pool_mut(&mut self, pool_id: PoolId) -> Result<&mut RegisteredPool, BalancerError> {
        self.pools
            .get_mut(&pool_id)
            .ok_or(BalancerError::InvalidPoolId)
    }
}

/// `pool ‖ specialization ‖ nonce`, the layout used by the Balancer Vault.
fn pool_id(pool: Address, nonce: u64) -> PoolId {
    let mut id = [0u8; 32];
    id[..20].copy_from_slice(pool.as_slice());
    id[20..22].copy_from_slice(&GENERAL_SPECIALIZATION.to_be_bytes());
    id[24..].copy_from_slice(&nonce.to_be_bytes());
    B256::from(id)
}

impl InMemoryVault {
    pub fn new(address: Address, tokens: Arc<dyn Tokens>, clock: Arc<dyn Clock>) -> Self {
        Self {
            address,
            tokens,
            clock,
            state: Mutex::new(State::default()),
        }
    }
}

impl Vault for InMemoryVault {
    fn address(&self) -> Address {
        self.address
    }

    fn register_pool(&self, pool: Weak<dyn BasePool>, pool_address: Address) -> PoolId {
        let mut state = self.state.lock().unwrap();
        let id = pool_id(pool_address, state.nonce);
        state.nonce += 1;
        state.pools.insert(
            id,
            RegisteredPool {
                address: pool_address,
                pool,
                tokens: Vec::new(),
                balances: Vec::new(),
            },
        );
        tracing::debug!(%id, pool = %pool_address, "registered pool");
        id
    }

    fn register_tokens(
        &self,
        pool_id: PoolId,
        tokens: &[Address],
        asset_managers: &[Address],
    ) -> Result<(), Error> {
        if tokens.len() != asset_managers.len() {
            return Err(BalancerError::InvalidToken.into());
        }
        let mut state = self.state.lock().unwrap();
        let pool = state.pool_mut(pool_id)?;
        for (i, token) in tokens.iter().enumerate() {
            if pool.tokens.contains(token) || tokens[..i].contains(token) {
                return Err(BalancerError::TokenAlreadyRegistered.into());
            }
        }
        for (token, asset_manager) in tokens.iter().zip(asset_managers) {
            pool.tokens.push(*token);
            pool.balances.push(PoolTokenInfo {
                asset_manager: *asset_manager,
                ..Default::default()
            });
        }
        Ok(())
    }

    fn join_pool(&self, pool_id: PoolId, sender: Address, amounts: &[U256]) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        let pool = state.pool_mut(pool_id)?;
        if amounts.len() != pool.tokens.len() {
            return Err(BalancerError::InvalidToken.into());
        }
        let mut balances = pool.balances.clone();
        for ((info, token), amount) in balances.iter_mut().zip(&pool.tokens).zip(amounts) {
            if self.tokens.balance_of(*token, sender) < *amount {
                return Err(BalancerError::Erc20TransferExceedsBalance.into());
            }
            info.cash = info.cash.badd(*amount)?;
        }
        for (token, amount) in pool.tokens.iter().zip(amounts) {
            self.tokens.transfer(*token, sender, self.address, *amount)?;
        }
        pool.balances = balances;
        Ok(())
    }

    fn get_pool(&self, pool_id: PoolId) -> Result<Address, Error> {
        Ok(self.state.lock().unwrap().pool(pool_id)?.address)
    }

    fn get_pool_tokens(&self, pool_id: PoolId) -> Result<(Vec<Address>, Vec<U256>), Error> {
        let state = self.state.lock().unwrap();
        let pool = state.pool(pool_id)?;
        Ok((pool.tokens.clone(), pool.total_balances()?))
    }

    fn get_pool_token_info(
        &self,
        pool_id: PoolId,
        token: Address,
    ) -> Result<PoolTokenInfo, Error> {
        let state = self.state.lock().unwrap();
        let pool = state.pool(pool_id)?;
        Ok(pool.balances[pool.index_of(token)?])
    }

    #[instrument(level = "debug", skip_all, fields(pool_id = %single_swap.pool_id, kind = %single_swap.kind))]
    fn swap(
        &self,
        single_swap: SingleSwap,
        funds: FundManagement,
        limit: U256,
        deadline: u64,
    ) -> Result<U256, Error> {
        if self.clock.now() > deadline {
            return Err(BalancerError::SwapDeadline.into());
        }
        if single_swap.asset_in == single_swap.asset_out {
            return Err(BalancerError::CannotSwapSameToken.into());
        }

        // The pool is called without holding the lock: pricing a swap queries
        // the wrapped token venue, which may call back into the Vault.
        let (pool, balances, index_in, index_out) = {
            let state = self.state.lock().unwrap();
            let registered = state.pool(single_swap.pool_id)?;
            let pool = registered
                .pool
                .upgrade()
                .ok_or(BalancerError::InvalidPoolId)?;
            (
                pool,
                registered.total_balances()?,
                registered.index_of(single_swap.asset_in)?,
                registered.index_of(single_swap.asset_out)?,
            )
        };
        let request = SwapRequest {
            kind: single_swap.kind,
            token_in: single_swap.asset_in,
            token_out: single_swap.asset_out,
            amount: single_swap.amount,
            pool_id: single_swap.pool_id,
            from: funds.sender,
            to: funds.recipient,
        };
        let calculated = pool.on_swap(&request, &balances, index_in, index_out)?;
        let (amount_in, amount_out) = match single_swap.kind {
            SwapKind::GivenIn => (single_swap.amount, calculated),
            SwapKind::GivenOut => (calculated, single_swap.amount),
        };
        let within_limit = match single_swap.kind {
            SwapKind::GivenIn => amount_out >= limit,
            SwapKind::GivenOut => amount_in <= limit,
        };
        if !within_limit {
            return Err(BalancerError::SwapLimit.into());
        }

        let mut state = self.state.lock().unwrap();
        let registered = state.pool_mut(single_swap.pool_id)?;
        let cash_in = registered.balances[index_in].cash.badd(amount_in)?;
        let cash_out = registered.balances[index_out].cash.bsub(amount_out)?;
        if self.tokens.balance_of(single_swap.asset_in, funds.sender) < amount_in {
            return Err(BalancerError::Erc20TransferExceedsBalance.into());
        }
        self.tokens
            .transfer(single_swap.asset_in, funds.sender, self.address, amount_in)?;
        self.tokens.transfer(
            single_swap.asset_out,
            self.address,
            funds.recipient,
            amount_out,
        )?;
        registered.balances[index_in].cash = cash_in;
        registered.balances[index_out].cash = cash_out;
        tracing::debug!(%amount_in, %amount_out, "swapped");
        Ok(calculated)
    }

    #[instrument(level = "debug", skip_all, fields(%sender))]
    fn manage_pool_balance(&self, sender: Address, ops: &[PoolBalanceOp]) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();

        // Apply everything to a copy and check that the asset manager can
        // fund every deposit before moving any token.
        let mut pools = state.pools.clone();
        let mut manager_balances = HashMap::new();
        let mut transfers = Vec::new();
        for op in ops {
            let pool = pools.get_mut(&op.pool_id).ok_or(BalancerError::InvalidPoolId)?;
            let index = pool.index_of(op.token)?;
            let info = &mut pool.balances[index];
            if info.asset_manager != sender {
                return Err(BalancerError::SenderNotAssetManager.into());
            }
            let balance = manager_balances
                .entry(op.token)
                .or_insert_with(|| self.tokens.balance_of(op.token, sender));
            match op.kind {
                PoolBalanceOpKind::Withdraw => {
                    info.cash = info.cash.bsub(op.amount)?;
                    info.managed = info.managed.badd(op.amount)?;
                    *balance = balance.badd(op.amount)?;
                    transfers.push((op.token, self.address, sender, op.amount));
                }
                PoolBalanceOpKind::Deposit => {
                    info.managed = info.managed.bsub(op.amount)?;
                    info.cash = info.cash.badd(op.amount)?;
                    *balance = balance
                        .checked_sub(op.amount)
                        .ok_or(BalancerError::Erc20TransferExceedsBalance)?;
                    transfers.push((op.token, sender, self.address, op.amount));
                }
                PoolBalanceOpKind::Update => {
                    info.managed = op.amount;
                }
            }
            tracing::trace!(?op, "pool balance operation");
        }

        for (token, from, to, amount) in transfers {
            self.tokens.transfer(token, from, to, amount)?;
        }
        state.pools = pools;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            clock::FixedClock,
            tokens::{Ledger, MockTokens},
        },
        maplit::hashmap,
        testlib::tokens::{DAI, USDC},
    };

    const VAULT: Address = testlib::protocol::VAULT;

    /// Prices every swap 1:1.
    struct ConstantPool;

    impl BasePool for ConstantPool {
        fn on_swap(
            &self,
            request: &SwapRequest,
            _: &[U256],
            _: usize,
            _: usize,
        ) -> Result<U256, Error> {
            Ok(request.amount)
        }
    }

    fn setup(
        pool: &Arc<dyn BasePool>,
        manager: Address,
        funded: HashMap<Address, U256>,
    ) -> (InMemoryVault, Arc<Ledger>, PoolId) {
        let ledger = Arc::new(Ledger::new().with_token(USDC, 6).with_token(DAI, 18));
        for (account, amount) in funded {
            ledger.mint(USDC, account, amount).unwrap();
            ledger.mint(DAI, account, amount).unwrap();
        }
        let vault = InMemoryVault::new(VAULT, ledger.clone(), Arc::new(FixedClock(100)));
        let id = vault.register_pool(Arc::downgrade(pool), Address::repeat_byte(0xcc));
        vault
            .register_tokens(id, &[USDC, DAI], &[manager, manager])
            .unwrap();
        (vault, ledger, id)
    }

    #[test]
    fn pool_id_layout() {
        let pool = Address::repeat_byte(0xcc);
        let id = pool_id(pool, 7);
        assert_eq!(&id[..20], pool.as_slice());
        assert_eq!(&id[20..22], &[0, 0]);
        assert_eq!(id[31], 7);
        assert_ne!(pool_id(pool, 0), pool_id(pool, 1));
    }

    #[test]
    fn registering_tokens_twice_fails() {
        let pool: Arc<dyn BasePool> = Arc::new(ConstantPool);
        let (vault, _, id) = setup(&pool, Address::ZERO, HashMap::new());
        assert_eq!(
            vault
                .register_tokens(id, &[USDC], &[Address::ZERO])
                .unwrap_err(),
            Error::Balancer(BalancerError::TokenAlreadyRegistered)
        );
        assert_eq!(
            vault.get_pool(B256::ZERO).unwrap_err(),
            Error::Balancer(BalancerError::InvalidPoolId)
        );
        assert_eq!(vault.get_pool(id).unwrap(), Address::repeat_byte(0xcc));
    }

    #[test]
    fn swaps_move_cash() {
        let trader = Address::repeat_byte(1);
        let pool: Arc<dyn BasePool> = Arc::new(ConstantPool);
        let (vault, ledger, id) = setup(
            &pool,
            Address::ZERO,
            hashmap! { trader => U256::from(1_000) },
        );
        vault
            .join_pool(id, trader, &[U256::from(500), U256::from(500)])
            .unwrap();

        let swap = SingleSwap {
            pool_id: id,
            kind: SwapKind::GivenIn,
            asset_in: USDC,
            asset_out: DAI,
            amount: U256::from(100),
        };
        let funds = FundManagement {
            sender: trader,
            recipient: trader,
        };
        assert_eq!(
            vault.swap(swap, funds, U256::from(101), 100).unwrap_err(),
            Error::Balancer(BalancerError::SwapLimit)
        );
        assert_eq!(
            vault.swap(swap, funds, U256::ZERO, 99).unwrap_err(),
            Error::Balancer(BalancerError::SwapDeadline)
        );
        assert_eq!(
            vault
                .swap(
                    SingleSwap {
                        asset_out: USDC,
                        ..swap
                    },
                    funds,
                    U256::ZERO,
                    100
                )
                .unwrap_err(),
            Error::Balancer(BalancerError::CannotSwapSameToken)
        );

        assert_eq!(
            vault.swap(swap, funds, U256::from(100), 100).unwrap(),
            U256::from(100)
        );
        assert_eq!(vault.get_pool_token_info(id, USDC).unwrap().cash, U256::from(600));
        assert_eq!(vault.get_pool_token_info(id, DAI).unwrap().cash, U256::from(400));
        assert_eq!(ledger.balance_of(USDC, trader), U256::from(400));
        assert_eq!(ledger.balance_of(DAI, trader), U256::from(600));

        // The pool can't pay out more than its cash.
        let drain = SingleSwap {
            kind: SwapKind::GivenOut,
            amount: U256::from(401),
            ..swap
        };
        assert_eq!(
            vault.swap(drain, funds, U256::MAX, 100).unwrap_err(),
            Error::Balancer(BalancerError::SubOverflow)
        );
        assert_eq!(ledger.balance_of(USDC, trader), U256::from(400));
    }

    #[test]
    fn dropped_pools_cant_swap() {
        let pool: Arc<dyn BasePool> = Arc::new(ConstantPool);
        let (vault, _, id) = setup(&pool, Address::ZERO, HashMap::new());
        drop(pool);
        let swap = SingleSwap {
            pool_id: id,
            kind: SwapKind::GivenIn,
            asset_in: USDC,
            asset_out: DAI,
            amount: U256::ZERO,
        };
        let funds = FundManagement {
            sender: Address::ZERO,
            recipient: Address::ZERO,
        };
        assert_eq!(
            vault.swap(swap, funds, U256::ZERO, 100).unwrap_err(),
            Error::Balancer(BalancerError::InvalidPoolId)
        );
    }

    #[test]
    fn asset_manager_operations() {
        let manager = Address::repeat_byte(2);
        let pool: Arc<dyn BasePool> = Arc::new(ConstantPool);
        let (vault, ledger, id) = setup(&pool, manager, hashmap! { manager => U256::from(1_000) });
        vault
            .join_pool(id, manager, &[U256::from(1_000), U256::ZERO])
            .unwrap();

        let op = |kind, amount: u64| PoolBalanceOp {
            kind,
            pool_id: id,
            token: USDC,
            amount: U256::from(amount),
        };
        assert_eq!(
            vault
                .manage_pool_balance(Address::ZERO, &[op(PoolBalanceOpKind::Withdraw, 1)])
                .unwrap_err(),
            Error::Balancer(BalancerError::SenderNotAssetManager)
        );

        vault
            .manage_pool_balance(manager, &[op(PoolBalanceOpKind::Withdraw, 300)])
            .unwrap();
        let info = vault.get_pool_token_info(id, USDC).unwrap();
        assert_eq!((info.cash, info.managed), (U256::from(700), U256::from(300)));
        assert_eq!(ledger.balance_of(USDC, manager), U256::from(300));

        // A failing batch leaves everything untouched.
        assert_eq!(
            vault
                .manage_pool_balance(
                    manager,
                    &[
                        op(PoolBalanceOpKind::Update, 1_000),
                        op(PoolBalanceOpKind::Deposit, 400),
                    ]
                )
                .unwrap_err(),
            Error::Balancer(BalancerError::Erc20TransferExceedsBalance)
        );
        let info = vault.get_pool_token_info(id, USDC).unwrap();
        assert_eq!((info.cash, info.managed), (U256::from(700), U256::from(300)));

        vault
            .manage_pool_balance(
                manager,
                &[
                    op(PoolBalanceOpKind::Update, 250),
                    op(PoolBalanceOpKind::Deposit, 250),
                ],
            )
            .unwrap();
        let info = vault.get_pool_token_info(id, USDC).unwrap();
        assert_eq!((info.cash, info.managed), (U256::from(950), U256::ZERO));
        assert_eq!(
            vault.get_pool_tokens(id).unwrap(),
            (vec![USDC, DAI], vec![U256::from(950), U256::ZERO])
        );
    }

    #[test]
    fn failed_transfers_surface() {
        let mut tokens = MockTokens::new();
        tokens.expect_balance_of().returning(|_, _| U256::MAX);
        tokens
            .expect_transfer()
            .returning(|_, _, _, _| Err(BalancerError::Erc20TransferExceedsBalance.into()));
        let vault = InMemoryVault::new(VAULT, Arc::new(tokens), Arc::new(FixedClock(0)));
        let pool: Arc<dyn BasePool> = Arc::new(ConstantPool);
        let id = vault.register_pool(Arc::downgrade(&pool), Address::repeat_byte(0xcc));
        vault
            .register_tokens(id, &[USDC], &[Address::ZERO])
            .unwrap();
        assert!(vault.join_pool(id, Address::ZERO, &[U256::from(1)]).is_err());
        assert_eq!(vault.get_pool_token_info(id, USDC).unwrap().cash, U256::ZERO);
    }
}
