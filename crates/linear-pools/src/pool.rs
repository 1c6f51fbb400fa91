//! Linear pools: three token pools (main, wrapped and their own BPT) that
//! price the wrapped token at the venue rate and charge swap fees only on the
//! part of the main balance that leaves the target band.

use {
    crate::{
        error::{BalancerError, Error},
        fixed_point::Bfp,
        linear_math::{self, Params},
        math::{BalU256, decimals_factor},
        rate::{PendingQuery, WrappedTokenRate},
        targets::{BandState, Targets},
        vault::{BasePool, PoolId, SwapKind, SwapRequest, Vault},
        venues::Venue,
    },
    alloy_primitives::{Address, U256},
    std::sync::{Arc, RwLock, Weak},
    tracing::instrument,
};

pub const MAIN_INDEX: usize = 0;
pub const WRAPPED_INDEX: usize = 1;
pub const BPT_INDEX: usize = 2;

/// BPT supply minted to the Vault when the pool is created. Balances are
/// stored in 112 bits by the Vault.
pub const MAX_TOKEN_BALANCE: U256 = U256::from_limbs([u64::MAX, (1 << 48) - 1, 0, 0]);

/// Everything needed to deploy a pool.
pub struct PoolParams {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub version: String,
    pub owner: Address,
    pub main_token: Address,
    pub main_decimals: u8,
    pub venue: Arc<dyn Venue>,
    pub upper_target: U256,
    pub swap_fee_percentage: Bfp,
    pub protocol_id: u32,
    pub asset_manager: Address,
    pub pause_window_end_time: u64,
    pub buffer_period_end_time: u64,
}

pub struct LinearPool {
    address: Address,
    name: String,
    symbol: String,
    version: String,
    owner: Address,
    main_token: Address,
    main_decimals: u8,
    protocol_id: u32,
    asset_manager: Address,
    pause_window_end_time: u64,
    buffer_period_end_time: u64,
    pool_id: PoolId,
    vault: Arc<dyn Vault>,
    rate: WrappedTokenRate,
    state: RwLock<State>,
}

#[derive(Clone, Copy, Debug)]
struct State {
    targets: Targets,
    swap_fee_percentage: Bfp,
}

impl LinearPool {
    /// Deploys the pool and registers it and its tokens with the Vault. The
    /// lower target starts at zero.
    pub fn new(vault: Arc<dyn Vault>, params: PoolParams) -> Result<Arc<Self>, Error> {
        let targets = Targets::new(U256::ZERO, params.upper_target)?;
        ensure_valid_fee(params.swap_fee_percentage)?;
        decimals_factor(params.main_decimals)?;

        let pool = Arc::new_cyclic(|this: &Weak<Self>| {
            let base: Weak<dyn BasePool> = this.clone();
            let pool_id = vault.register_pool(base, params.address);
            Self {
                address: params.address,
                name: params.name,
                symbol: params.symbol,
                version: params.version,
                owner: params.owner,
                main_token: params.main_token,
                main_decimals: params.main_decimals,
                protocol_id: params.protocol_id,
                asset_manager: params.asset_manager,
                pause_window_end_time: params.pause_window_end_time,
                buffer_period_end_time: params.buffer_period_end_time,
                pool_id,
                vault: vault.clone(),
                rate: WrappedTokenRate::new(params.venue),
                state: RwLock::new(State {
                    targets,
                    swap_fee_percentage: params.swap_fee_percentage,
                }),
            }
        });
        vault.register_tokens(
            pool.pool_id,
            &pool.tokens(),
            &[pool.asset_manager, pool.asset_manager, Address::ZERO],
        )?;
        Ok(pool)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn pool_id(&self) -> PoolId {
        self.pool_id
    }

    pub fn protocol_id(&self) -> u32 {
        self.protocol_id
    }

    pub fn asset_manager(&self) -> Address {
        self.asset_manager
    }

    pub fn vault(&self) -> &Arc<dyn Vault> {
        &self.vault
    }

    pub fn venue(&self) -> &Arc<dyn Venue> {
        self.rate.venue()
    }

    pub fn main_token(&self) -> Address {
        self.main_token
    }

    pub fn main_decimals(&self) -> u8 {
        self.main_decimals
    }

    pub fn wrapped_token(&self) -> Address {
        self.venue().wrapped_token().address
    }

    /// The BPT is the pool itself.
    pub fn bpt(&self) -> Address {
        self.address
    }

    /// Pool tokens in Vault registration order.
    pub fn tokens(&self) -> [Address; 3] {
        [self.main_token, self.wrapped_token(), self.bpt()]
    }

    /// End of the pause window and of the buffer period, as unix timestamps.
    pub fn get_pause_window(&self) -> (u64, u64) {
        (self.pause_window_end_time, self.buffer_period_end_time)
    }

    pub fn get_targets(&self) -> Targets {
        self.state.read().unwrap().targets
    }

    pub fn get_swap_fee_percentage(&self) -> Bfp {
        self.state.read().unwrap().swap_fee_percentage
    }

    pub fn get_wrapped_token_rate(&self) -> Result<Bfp, Error> {
        self.rate.get()
    }

    /// Fails with `MaliciousQueryRevert` while the wrapped token rate is
    /// being queried.
    pub fn ensure_no_pending_query(&self) -> Result<(), BalancerError> {
        self.rate.ensure_no_pending_query()
    }

    /// Blocks swaps, target and fee changes and other rebalances until the
    /// guard is dropped.
    pub fn begin_rebalance(&self) -> Result<PendingQuery<'_>, BalancerError> {
        self.rate.enter_query()
    }

    /// Factors upscaling main, wrapped and BPT amounts to 18 decimals. The
    /// wrapped factor includes the current wrapped token rate.
    pub fn get_scaling_factors(&self) -> Result<[Bfp; 3], Error> {
        let wrapped = self.venue().wrapped_token();
        let main_factor = Bfp::exp10(u32::from(18u8.saturating_sub(self.main_decimals)))?;
        let wrapped_factor = Bfp::from_wei(
            decimals_factor(wrapped.decimals)?.bmul(self.rate.get()?.as_uint256())?,
        );
        Ok([main_factor, wrapped_factor, Bfp::one()])
    }

    /// BPT not held by the Vault.
    pub fn get_virtual_supply(&self) -> Result<U256, Error> {
        let info = self.vault.get_pool_token_info(self.pool_id, self.bpt())?;
        Ok(MAX_TOKEN_BALANCE.bsub(info.cash)?)
    }

    /// Value of one BPT in main tokens, 18 decimals.
    pub fn get_rate(&self) -> Result<Bfp, Error> {
        let (_, balances) = self.vault.get_pool_tokens(self.pool_id)?;
        let factors = self.get_scaling_factors()?;
        let params = self.params();
        let nominal_main =
            linear_math::to_nominal(upscale(balances[MAIN_INDEX], factors[MAIN_INDEX])?, &params)?;
        let invariant = linear_math::calc_invariant(
            nominal_main,
            upscale(balances[WRAPPED_INDEX], factors[WRAPPED_INDEX])?,
        )?;
        let supply = Bfp::from_wei(MAX_TOKEN_BALANCE.bsub(balances[BPT_INDEX])?);
        if supply.is_zero() {
            return Ok(Bfp::one());
        }
        Ok(invariant.div_down(supply)?)
    }

    /// Main token balance of the pool (cash plus managed), upscaled.
    pub fn get_main_balance(&self) -> Result<U256, Error> {
        let info = self
            .vault
            .get_pool_token_info(self.pool_id, self.main_token)?;
        let total = info.total().ok_or(BalancerError::AddOverflow)?;
        Ok(total.bmul(decimals_factor(self.main_decimals)?)?)
    }

    pub fn band_state(&self) -> Result<BandState, Error> {
        Ok(self.get_targets().state(self.get_main_balance()?))
    }

    #[instrument(level = "debug", skip(self), fields(pool = %self.address))]
    pub fn set_targets(&self, caller: Address, lower: U256, upper: U256) -> Result<(), Error> {
        self.ensure_no_pending_query()?;
        self.ensure_owner(caller)?;
        let new_targets = Targets::new(lower, upper)?;
        let main_balance = self.get_main_balance()?;

        let mut state = self.state.write().unwrap();
        if !state.targets.contains(main_balance) {
            return Err(BalancerError::OutOfTargetRange.into());
        }
        if !new_targets.contains(main_balance) {
            return Err(BalancerError::OutOfNewTargetRange.into());
        }
        state.targets = new_targets;
        tracing::info!(%lower, %upper, "targets changed");
        Ok(())
    }

    #[instrument(level = "debug", skip(self), fields(pool = %self.address))]
    pub fn set_swap_fee_percentage(&self, caller: Address, fee: Bfp) -> Result<(), Error> {
        self.ensure_no_pending_query()?;
        self.ensure_owner(caller)?;
        ensure_valid_fee(fee)?;
        let main_balance = self.get_main_balance()?;

        let mut state = self.state.write().unwrap();
        if !state.targets.contains(main_balance) {
            return Err(BalancerError::OutOfTargetRange.into());
        }
        state.swap_fee_percentage = fee;
        tracing::info!(%fee, "swap fee percentage changed");
        Ok(())
    }

    /// Prices a swap against the current Vault balances without executing it.
    /// Works while a rebalance is in progress.
    pub fn query_swap(
        &self,
        kind: SwapKind,
        token_in: Address,
        token_out: Address,
        amount: U256,
    ) -> Result<U256, Error> {
        let (tokens, balances) = self.vault.get_pool_tokens(self.pool_id)?;
        let index_of = |token| {
            tokens
                .iter()
                .position(|registered| *registered == token)
                .ok_or(BalancerError::TokenNotRegistered)
        };
        let request = SwapRequest {
            kind,
            token_in,
            token_out,
            amount,
            pool_id: self.pool_id,
            from: Address::ZERO,
            to: Address::ZERO,
        };
        self.price_swap(&request, &balances, index_of(token_in)?, index_of(token_out)?)
    }

    fn params(&self) -> Params {
        let state = *self.state.read().unwrap();
        Params {
            fee: state.swap_fee_percentage,
            lower_target: Bfp::from_wei(state.targets.lower()),
            upper_target: Bfp::from_wei(state.targets.upper()),
        }
    }

    fn ensure_owner(&self, caller: Address) -> Result<(), BalancerError> {
        if caller != self.owner {
            return Err(BalancerError::Unauthorized);
        }
        Ok(())
    }

    fn swap_given_in(
        &self,
        index_in: usize,
        index_out: usize,
        amount_in: Bfp,
        balances: &[Bfp; 3],
        params: &Params,
    ) -> Result<Bfp, BalancerError> {
        let [main, wrapped, supply] = *balances;
        match (index_in, index_out) {
            (MAIN_INDEX, BPT_INDEX) => {
                linear_math::calc_bpt_out_per_main_in(amount_in, main, wrapped, supply, params)
            }
            (MAIN_INDEX, WRAPPED_INDEX) => {
                linear_math::calc_wrapped_out_per_main_in(amount_in, main, params)
            }
            (WRAPPED_INDEX, MAIN_INDEX) => {
                linear_math::calc_main_out_per_wrapped_in(amount_in, main, params)
            }
            (WRAPPED_INDEX, BPT_INDEX) => {
                linear_math::calc_bpt_out_per_wrapped_in(amount_in, main, wrapped, supply, params)
            }
            (BPT_INDEX, MAIN_INDEX) => {
                linear_math::calc_main_out_per_bpt_in(amount_in, main, wrapped, supply, params)
            }
            (BPT_INDEX, WRAPPED_INDEX) => {
                linear_math::calc_wrapped_out_per_bpt_in(amount_in, main, wrapped, supply, params)
            }
            _ => Err(BalancerError::UnhandledByLinearPool),
        }
    }

    fn swap_given_out(
        &self,
        index_in: usize,
        index_out: usize,
        amount_out: Bfp,
        balances: &[Bfp; 3],
        params: &Params,
    ) -> Result<Bfp, BalancerError> {
        let [main, wrapped, supply] = *balances;
        match (index_in, index_out) {
            (MAIN_INDEX, BPT_INDEX) => {
                linear_math::calc_main_in_per_bpt_out(amount_out, main, wrapped, supply, params)
            }
            (MAIN_INDEX, WRAPPED_INDEX) => {
                linear_math::calc_main_in_per_wrapped_out(amount_out, main, params)
            }
            (WRAPPED_INDEX, MAIN_INDEX) => {
                linear_math::calc_wrapped_in_per_main_out(amount_out, main, params)
            }
            (WRAPPED_INDEX, BPT_INDEX) => {
                linear_math::calc_wrapped_in_per_bpt_out(amount_out, main, wrapped, supply, params)
            }
            (BPT_INDEX, MAIN_INDEX) => {
                linear_math::calc_bpt_in_per_main_out(amount_out, main, wrapped, supply, params)
            }
            (BPT_INDEX, WRAPPED_INDEX) => {
                linear_math::calc_bpt_in_per_wrapped_out(amount_out, main, wrapped, supply, params)
            }
            _ => Err(BalancerError::UnhandledByLinearPool),
        }
    }

    fn price_swap(
        &self,
        request: &SwapRequest,
        balances: &[U256],
        index_in: usize,
        index_out: usize,
    ) -> Result<U256, Error> {
        let [main, wrapped, bpt] = <[U256; 3]>::try_from(balances)
            .map_err(|_| BalancerError::UnhandledByLinearPool)?;
        let factors = self.get_scaling_factors()?;
        let params = self.params();
        let upscaled = [
            upscale(main, factors[MAIN_INDEX])?,
            upscale(wrapped, factors[WRAPPED_INDEX])?,
            Bfp::from_wei(MAX_TOKEN_BALANCE.bsub(bpt)?),
        ];

        let amount = match request.kind {
            SwapKind::GivenIn => {
                let amount_in = upscale(request.amount, factors[index_in])?;
                let amount_out =
                    self.swap_given_in(index_in, index_out, amount_in, &upscaled, &params)?;
                downscale_down(amount_out, factors[index_out])?
            }
            SwapKind::GivenOut => {
                let amount_out = upscale(request.amount, factors[index_out])?;
                let amount_in =
                    self.swap_given_out(index_in, index_out, amount_out, &upscaled, &params)?;
                downscale_up(amount_in, factors[index_in])?
            }
        };
        tracing::trace!(amount_given = %request.amount, amount_calculated = %amount, "priced swap");
        Ok(amount)
    }
}

impl BasePool for LinearPool {
    #[instrument(level = "debug", skip_all, fields(pool = %self.address, kind = %request.kind))]
    fn on_swap(
        &self,
        request: &SwapRequest,
        balances: &[U256],
        index_in: usize,
        index_out: usize,
    ) -> Result<U256, Error> {
        self.ensure_no_pending_query()?;
        self.price_swap(request, balances, index_in, index_out)
    }
}

pub(crate) fn ensure_valid_fee(fee: Bfp) -> Result<(), BalancerError> {
    if fee >= Bfp::one() {
        return Err(BalancerError::MaxSwapFeePercentage);
    }
    Ok(())
}

fn upscale(amount: U256, factor: Bfp) -> Result<Bfp, BalancerError> {
    Bfp::from_wei(amount).mul_down(factor)
}

fn downscale_down(amount: Bfp, factor: Bfp) -> Result<U256, BalancerError> {
    Ok(amount.div_down(factor)?.as_uint256())
}

fn downscale_up(amount: Bfp, factor: Bfp) -> Result<U256, BalancerError> {
    Ok(amount.div_up(factor)?.as_uint256())
}
