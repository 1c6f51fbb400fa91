//! Rebalancers move a linear pool's main token cash back to the middle of its
//! target band by wrapping excess main tokens or unwrapping wrapped tokens at
//! the venue.
//!
//! A rebalance trades with the pool at the prices its swap math quotes, so
//! the pool is paid exactly as if a trader had rebalanced it. The swap fees
//! the pool charges for leaving the band are what the trade leaves over, and
//! they go to the recipient chosen by the caller.
//!
//! Every amount is planned before anything is moved: the wrapped token rate,
//! the pool quote and the venue conversion are all known up front, so a plan
//! that fails leaves pool balances and token balances untouched.

use {
    crate::{
        error::{BalancerError, Error},
        fees::compute_fee,
        math::{BalU256, decimals_factor},
        pool::LinearPool,
        targets::BandState,
        tokens::Tokens,
        vault::{PoolBalanceOp, PoolBalanceOpKind, PoolTokenInfo, SwapKind},
        venues,
    },
    alloy_primitives::{Address, U256},
    std::sync::Arc,
    tracing::instrument,
};

/// Result of a successful rebalance.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RebalanceOutcome {
    /// Where the main token cash was before rebalancing.
    pub state: BandState,
    /// Swap fees owed for the distance of the cash to the band, 18 decimals.
    pub fees_collected: U256,
    /// Main tokens, in native units, sent to the recipient.
    pub recipient_main_delta: U256,
}

pub struct LinearPoolRebalancer {
    address: Address,
    pool: Arc<LinearPool>,
    tokens: Arc<dyn Tokens>,
}

#[derive(Clone, Copy, Debug)]
enum Plan {
    /// Wrap `main_to_wrap` of the `excess_main` taken out of the pool and pay
    /// the pool at least `wrapped_required` wrapped tokens for it.
    Excess {
        main: PoolTokenInfo,
        wrapped: PoolTokenInfo,
        excess_main: U256,
        wrapped_required: U256,
        main_to_wrap: U256,
    },
    /// Unwrap `wrapped_out` taken out of the pool into `main_unwrapped` and
    /// pay the pool `missing_main` for it.
    Lack {
        main: PoolTokenInfo,
        wrapped: PoolTokenInfo,
        missing_main: U256,
        wrapped_out: U256,
        main_unwrapped: U256,
    },
    OnMidpoint,
}

struct Planned {
    state: BandState,
    fees_collected: U256,
    plan: Plan,
}

impl LinearPoolRebalancer {
    pub fn new(address: Address, pool: Arc<LinearPool>, tokens: Arc<dyn Tokens>) -> Self {
        Self {
            address,
            pool,
            tokens,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn get_pool(&self) -> &Arc<LinearPool> {
        &self.pool
    }

    /// Moves the pool's main token cash to the midpoint of its band and sends
    /// the collected fees to `recipient`. Fails with `NothingToRebalance` if
    /// the cash is already within the band.
    #[instrument(level = "debug", skip_all, fields(pool = %self.pool.address(), %recipient))]
    pub fn rebalance(&self, recipient: Address) -> Result<RebalanceOutcome, Error> {
        let _rebalancing = self.pool.begin_rebalance()?;
        let planned = self.plan(U256::ZERO)?;
        if planned.state == BandState::Balanced {
            return Err(Error::NothingToRebalance);
        }
        self.execute(planned, U256::ZERO, recipient)
    }

    /// Like [`Self::rebalance`], but also works for balanced pools. `extra`
    /// main tokens are taken from `caller` to cover rounding, and whatever is
    /// not needed is sent to `recipient` along with the fees.
    #[instrument(level = "debug", skip_all, fields(pool = %self.pool.address(), %caller, %recipient, %extra))]
    pub fn rebalance_with_extra_main(
        &self,
        caller: Address,
        recipient: Address,
        extra: U256,
    ) -> Result<RebalanceOutcome, Error> {
        let _rebalancing = self.pool.begin_rebalance()?;
        let planned = self.plan(extra)?;
        if !extra.is_zero() {
            self.tokens
                .transfer(self.pool.main_token(), caller, self.address, extra)?;
        }
        self.execute(planned, extra, recipient).inspect_err(|_| {
            if extra.is_zero() {
                return;
            }
            if let Err(err) =
                self.tokens
                    .transfer(self.pool.main_token(), self.address, caller, extra)
            {
                tracing::error!(%err, %caller, "failed to refund extra main tokens");
            }
        })
    }

    fn plan(&self, extra: U256) -> Result<Planned, Error> {
        let pool = &self.pool;
        let rate = pool.get_wrapped_token_rate()?;
        let token = pool.venue().wrapped_token();
        let vault = pool.vault();
        let main = vault.get_pool_token_info(pool.pool_id(), pool.main_token())?;
        let wrapped = vault.get_pool_token_info(pool.pool_id(), token.address)?;

        let main_factor = decimals_factor(pool.main_decimals())?;
        let targets = pool.get_targets();
        let cash = main.cash.bmul(main_factor)?;
        let state = targets.state(cash);
        let fees_collected = compute_fee(
            cash,
            targets.lower(),
            targets.upper(),
            pool.get_swap_fee_percentage(),
        )?;
        let desired = targets.midpoint().bdiv_down(main_factor)?;
        tracing::debug!(%state, cash = %main.cash, %desired, %rate, "planning rebalance");

        let plan = if main.cash > desired {
            let excess_main = main.cash - desired;
            let wrapped_required = pool.query_swap(
                SwapKind::GivenOut,
                token.address,
                pool.main_token(),
                excess_main,
            )?;
            let main_to_wrap = venues::main_required_to_mint(&token, wrapped_required, rate)?;
            let available = excess_main.badd(extra)?;
            if main_to_wrap > available {
                return Err(Error::InsufficientMainToken {
                    required: main_to_wrap,
                    available,
                });
            }
            Plan::Excess {
                main,
                wrapped,
                excess_main,
                wrapped_required,
                main_to_wrap,
            }
        } else if main.cash < desired {
            let missing_main = desired - main.cash;
            let wrapped_out = pool.query_swap(
                SwapKind::GivenIn,
                pool.main_token(),
                token.address,
                missing_main,
            )?;
            if wrapped_out > wrapped.cash {
                return Err(BalancerError::SubOverflow.into());
            }
            let main_unwrapped = venues::to_main(&token, wrapped_out, rate)?;
            let available = main_unwrapped.badd(extra)?;
            if missing_main > available {
                return Err(Error::InsufficientMainToken {
                    required: missing_main,
                    available,
                });
            }
            Plan::Lack {
                main,
                wrapped,
                missing_main,
                wrapped_out,
                main_unwrapped,
            }
        } else {
            Plan::OnMidpoint
        };
        Ok(Planned {
            state,
            fees_collected,
            plan,
        })
    }

    /// Runs a plan. Withdrawn tokens stay on the managed balance until the
    /// venue call that converts them has succeeded.
    fn execute(
        &self,
        planned: Planned,
        extra: U256,
        recipient: Address,
    ) -> Result<RebalanceOutcome, Error> {
        let main_token = self.pool.main_token();
        let venue = self.pool.venue();
        let token = venue.wrapped_token();
        let main_left = match planned.plan {
            Plan::Excess {
                main,
                wrapped,
                excess_main,
                wrapped_required,
                main_to_wrap,
            } => {
                self.manage(&[self.op(PoolBalanceOpKind::Withdraw, main_token, excess_main)])?;
                let minted = venue
                    .deposit(self.tokens.as_ref(), self.address, main_to_wrap)
                    .inspect_err(|_| self.restore(main_token, main.managed, excess_main, extra))?;
                if minted < wrapped_required {
                    self.unwind(|| venue.redeem(self.tokens.as_ref(), self.address, minted));
                    self.restore(main_token, main.managed, excess_main, extra);
                    return Err(Error::UnexpectedConversion {
                        planned: wrapped_required,
                        actual: minted,
                    });
                }
                self.manage(&[
                    self.op(PoolBalanceOpKind::Update, main_token, main.managed),
                    self.op(
                        PoolBalanceOpKind::Update,
                        token.address,
                        wrapped.managed.badd(minted)?,
                    ),
                    self.op(PoolBalanceOpKind::Deposit, token.address, minted),
                ])?;
                excess_main.badd(extra)?.bsub(main_to_wrap)?
            }
            Plan::Lack {
                main,
                wrapped,
                missing_main,
                wrapped_out,
                main_unwrapped,
            } => {
                self.manage(&[self.op(PoolBalanceOpKind::Withdraw, token.address, wrapped_out)])?;
                let redeemed = venue
                    .redeem(self.tokens.as_ref(), self.address, wrapped_out)
                    .inspect_err(|_| {
                        self.restore(token.address, wrapped.managed, wrapped_out, U256::ZERO)
                    })?;
                if redeemed < main_unwrapped {
                    self.unwind(|| venue.deposit(self.tokens.as_ref(), self.address, redeemed));
                    self.restore(token.address, wrapped.managed, wrapped_out, U256::ZERO);
                    return Err(Error::UnexpectedConversion {
                        planned: main_unwrapped,
                        actual: redeemed,
                    });
                }
                self.manage(&[
                    self.op(PoolBalanceOpKind::Update, token.address, wrapped.managed),
                    self.op(
                        PoolBalanceOpKind::Update,
                        main_token,
                        main.managed.badd(missing_main)?,
                    ),
                    self.op(PoolBalanceOpKind::Deposit, main_token, missing_main),
                ])?;
                redeemed.badd(extra)?.bsub(missing_main)?
            }
            Plan::OnMidpoint => extra,
        };

        if !main_left.is_zero() {
            self.tokens
                .transfer(main_token, self.address, recipient, main_left)?;
        }
        tracing::info!(
            state = %planned.state,
            fees = %planned.fees_collected,
            recipient_main = %main_left,
            "rebalanced"
        );
        Ok(RebalanceOutcome {
            state: planned.state,
            fees_collected: planned.fees_collected,
            recipient_main_delta: main_left,
        })
    }

    fn op(&self, kind: PoolBalanceOpKind, token: Address, amount: U256) -> PoolBalanceOp {
        PoolBalanceOp {
            kind,
            pool_id: self.pool.pool_id(),
            token,
            amount,
        }
    }

    fn manage(&self, ops: &[PoolBalanceOp]) -> Result<(), Error> {
        self.pool.vault().manage_pool_balance(self.address, ops)
    }

    /// Converts tokens back at the venue after it converted the wrong amount.
    fn unwind(&self, convert: impl FnOnce() -> Result<U256, Error>) {
        if let Err(err) = convert() {
            tracing::error!(%err, "failed to undo venue conversion");
        }
    }

    /// Puts `withdrawn` tokens taken out of the pool back into its cash and
    /// resets the managed balance to `managed_before`. Tokens the venue kept
    /// are written off. `reserved` tokens held by the rebalancer are not
    /// touched.
    fn restore(&self, token: Address, managed_before: U256, withdrawn: U256, reserved: U256) {
        let held = self
            .tokens
            .balance_of(token, self.address)
            .saturating_sub(reserved);
        let amount = withdrawn.min(held);
        if amount < withdrawn {
            tracing::error!(%token, lost = %(withdrawn - amount), "venue kept withdrawn tokens");
        }
        let restored = managed_before
            .badd(amount)
            .map_err(Error::from)
            .and_then(|managed| {
                self.manage(&[
                    self.op(PoolBalanceOpKind::Update, token, managed),
                    self.op(PoolBalanceOpKind::Deposit, token, amount),
                ])
            });
        if let Err(err) = restored {
            tracing::error!(%err, %token, "failed to restore pool balance");
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            bfp,
            clock::FixedClock,
            config::{FactoryConfig, Version},
            factory::{CreatePoolParams, LinearPoolFactory},
            rate::{RateSource, RevertType, VenueRevert},
            registry::InMemoryAuthorizer,
            tokens::Ledger,
            vault::{FundManagement, InMemoryVault, SingleSwap},
            venues::{Protocol, Venue, WrappedToken, yearn::YearnVault},
        },
        number::units::TokenUnit,
        std::sync::atomic::{AtomicBool, Ordering},
        testlib::{
            protocol::VAULT,
            tokens::{USDC, YV_USDC},
        },
    };

    const OWNER: Address = Address::repeat_byte(0x0e);
    const TRADER: Address = Address::repeat_byte(0x01);
    const RECIPIENT: Address = Address::repeat_byte(0x02);

    struct Setup {
        ledger: Arc<Ledger>,
        venue: Arc<YearnVault>,
        rebalancer: Arc<LinearPoolRebalancer>,
    }

    impl Setup {
        fn pool(&self) -> &Arc<LinearPool> {
            self.rebalancer.get_pool()
        }

        fn main_info(&self) -> PoolTokenInfo {
            let pool = self.pool();
            pool.vault()
                .get_pool_token_info(pool.pool_id(), USDC)
                .unwrap()
        }

        fn wrapped_info(&self) -> PoolTokenInfo {
            let pool = self.pool();
            pool.vault()
                .get_pool_token_info(pool.pool_id(), YV_USDC)
                .unwrap()
        }

        fn swap(&self, kind: SwapKind, asset_in: Address, asset_out: Address, amount: U256) {
            let pool = self.pool();
            pool.vault()
                .swap(
                    SingleSwap {
                        pool_id: pool.pool_id(),
                        kind,
                        asset_in,
                        asset_out,
                        amount,
                    },
                    FundManagement {
                        sender: TRADER,
                        recipient: TRADER,
                    },
                    match kind {
                        SwapKind::GivenIn => U256::ZERO,
                        SwapKind::GivenOut => U256::MAX,
                    },
                    u64::MAX,
                )
                .unwrap();
        }

        fn join(&self, main_in: U256) {
            self.swap(SwapKind::GivenIn, USDC, self.pool().bpt(), main_in);
        }
    }

    fn setup_with_venue(venue: Arc<dyn Venue>) -> (Arc<Ledger>, Arc<LinearPoolRebalancer>) {
        let ledger = Arc::new(Ledger::new().with_token(USDC, 6).with_token(YV_USDC, 6));
        ledger.mint(USDC, TRADER, 10_000_000u64.units(6)).unwrap();
        let clock = Arc::new(FixedClock(0));
        let vault = Arc::new(InMemoryVault::new(VAULT, ledger.clone(), clock.clone()));
        let version = Version {
            name: "YearnLinearPool".to_string(),
            version: 1,
            deployment: "20221114-yearn-rebalanced-linear-pool".to_string(),
        };
        let factory = LinearPoolFactory::new(
            Address::repeat_byte(0xfa),
            vault,
            ledger.clone(),
            clock,
            Arc::new(InMemoryAuthorizer::new()),
            FactoryConfig::new(version.clone(), version),
        )
        .unwrap();
        let created = factory
            .create(CreatePoolParams {
                name: "Balancer Yearn Boosted USDC".to_string(),
                symbol: "bb-yv-USDC".to_string(),
                main_token: USDC,
                venue,
                upper_target: 100_000u64.fp(),
                swap_fee_percentage: bfp!("0.01"),
                owner: OWNER,
                protocol_id: 0,
            })
            .unwrap();
        (ledger, created.rebalancer)
    }

    fn yv_usdc(price_per_share: U256) -> Arc<YearnVault> {
        Arc::new(YearnVault::new(
            WrappedToken {
                address: YV_USDC,
                decimals: 6,
                asset: USDC,
                asset_decimals: 6,
            },
            price_per_share,
        ))
    }

    fn setup(price_per_share: U256) -> Setup {
        let venue = yv_usdc(price_per_share);
        let (ledger, rebalancer) = setup_with_venue(venue.clone());
        Setup {
            ledger,
            venue,
            rebalancer,
        }
    }

    #[test]
    fn balanced_pools_have_nothing_to_rebalance() {
        let setup = setup(1u64.units(6));
        setup.join(60_000u64.units(6));
        assert_eq!(
            setup.rebalancer.rebalance(RECIPIENT).unwrap_err(),
            Error::NothingToRebalance
        );
        assert_eq!(setup.main_info().cash, 60_000u64.units(6));
    }

    #[test]
    fn main_excess_is_wrapped() {
        let setup = setup(1u64.units(6));
        setup.join(200_000u64.units(6));

        let outcome = setup.rebalancer.rebalance(RECIPIENT).unwrap();
        assert_eq!(
            outcome,
            RebalanceOutcome {
                state: BandState::MainExcess,
                fees_collected: 1_000u64.fp(),
                recipient_main_delta: 1_000u64.units(6),
            }
        );
        let main = setup.main_info();
        assert_eq!((main.cash, main.managed), (50_000u64.units(6), U256::ZERO));
        let wrapped = setup.wrapped_info();
        assert_eq!((wrapped.cash, wrapped.managed), (149_000u64.units(6), U256::ZERO));
        assert_eq!(setup.ledger.balance_of(USDC, RECIPIENT), 1_000u64.units(6));
        assert_eq!(
            setup.ledger.balance_of(USDC, setup.rebalancer.address()),
            U256::ZERO
        );
        assert_eq!(setup.ledger.balance_of(USDC, YV_USDC), 149_000u64.units(6));
    }

    #[test]
    fn main_lack_is_unwrapped() {
        let setup = setup(1u64.units(6));
        setup.join(200_000u64.units(6));
        setup.rebalancer.rebalance(RECIPIENT).unwrap();
        setup
            .pool()
            .set_targets(OWNER, 40_000u64.fp(), 60_000u64.fp())
            .unwrap();
        setup.swap(
            SwapKind::GivenOut,
            setup.pool().bpt(),
            USDC,
            20_000u64.units(6),
        );
        assert_eq!(setup.pool().band_state().unwrap(), BandState::MainLack);

        let outcome = setup.rebalancer.rebalance(RECIPIENT).unwrap();
        assert_eq!(outcome.state, BandState::MainLack);
        assert_eq!(outcome.fees_collected, 100u64.fp());
        assert_eq!(outcome.recipient_main_delta, 100u64.units(6));
        let main = setup.main_info();
        assert_eq!((main.cash, main.managed), (50_000u64.units(6), U256::ZERO));
        assert_eq!(setup.wrapped_info().cash, 128_900u64.units(6));
    }

    #[test]
    fn rounding_with_non_trivial_rate() {
        let setup = setup(1.05.units(6));
        setup.join(200_000u64.units(6));

        let outcome = setup.rebalancer.rebalance(RECIPIENT).unwrap();
        assert_eq!(outcome.fees_collected, 1_000u64.fp());
        assert!(1_000u64.units(6) - outcome.recipient_main_delta <= U256::from(2));
        let main = setup.main_info();
        assert_eq!((main.cash, main.managed), (50_000u64.units(6), U256::ZERO));
    }

    #[test]
    fn extra_main_covers_rounding() {
        let setup = setup(1.05.units(6));
        setup.join(60_000u64.units(6));

        assert_eq!(
            setup
                .rebalancer
                .rebalance_with_extra_main(TRADER, RECIPIENT, U256::ZERO)
                .unwrap_err(),
            Error::InsufficientMainToken {
                required: U256::from(10_000_000_001u64),
                available: U256::from(10_000_000_000u64),
            }
        );
        assert_eq!(setup.main_info().cash, 60_000u64.units(6));

        let before = setup.ledger.balance_of(USDC, TRADER);
        let outcome = setup
            .rebalancer
            .rebalance_with_extra_main(TRADER, RECIPIENT, 5u64.units(6))
            .unwrap();
        assert_eq!(outcome.state, BandState::Balanced);
        assert_eq!(outcome.fees_collected, U256::ZERO);
        assert_eq!(outcome.recipient_main_delta, 5u64.units(6) - U256::from(1));
        assert_eq!(before - setup.ledger.balance_of(USDC, TRADER), 5u64.units(6));
        assert_eq!(setup.main_info().cash, 50_000u64.units(6));
    }

    #[test]
    fn extra_main_is_returned_on_midpoint() {
        let setup = setup(1u64.units(6));
        setup.join(50_000u64.units(6));
        let outcome = setup
            .rebalancer
            .rebalance_with_extra_main(TRADER, RECIPIENT, 5u64.units(6))
            .unwrap();
        assert_eq!(outcome.recipient_main_delta, 5u64.units(6));
        assert_eq!(setup.ledger.balance_of(USDC, RECIPIENT), 5u64.units(6));
        assert_eq!(setup.main_info().cash, 50_000u64.units(6));
    }

    #[test]
    fn malicious_venues_leave_state_untouched() {
        for revert_type in [RevertType::MaliciousSwapQuery, RevertType::MaliciousJoinExitQuery] {
            let setup = setup(1u64.units(6));
            setup.join(200_000u64.units(6));
            let trader_balance = setup.ledger.balance_of(USDC, TRADER);
            setup.venue.set_revert_type(revert_type);

            let err = setup.rebalancer.rebalance(RECIPIENT).unwrap_err();
            assert!(err.is_malicious_query_revert());
            let err = setup
                .rebalancer
                .rebalance_with_extra_main(TRADER, RECIPIENT, 5u64.units(6))
                .unwrap_err();
            assert!(err.is_malicious_query_revert());

            let main = setup.main_info();
            assert_eq!((main.cash, main.managed), (200_000u64.units(6), U256::ZERO));
            assert_eq!(setup.ledger.balance_of(USDC, TRADER), trader_balance);
            assert_eq!(setup.ledger.balance_of(USDC, RECIPIENT), U256::ZERO);
        }
    }

    /// A vault that quotes its rate but refuses deposits.
    struct ShutDownVault(Arc<YearnVault>);

    impl RateSource for ShutDownVault {
        fn get_rate(&self) -> Result<U256, VenueRevert> {
            self.0.get_rate()
        }

        fn decimals(&self) -> u8 {
            self.0.decimals()
        }
    }

    impl Venue for ShutDownVault {
        fn protocol(&self) -> Protocol {
            Protocol::Yearn
        }

        fn wrapped_token(&self) -> WrappedToken {
            self.0.wrapped_token()
        }

        fn deposit(&self, _: &dyn Tokens, _: Address, _: U256) -> Result<U256, Error> {
            Err(Error::Venue("vault is shut down".to_string()))
        }
    }

    #[test]
    fn failed_venue_calls_are_rolled_back() {
        let venue = Arc::new(ShutDownVault(yv_usdc(1u64.units(6))));
        let (ledger, rebalancer) = setup_with_venue(venue);
        let setup = Setup {
            ledger,
            venue: yv_usdc(1u64.units(6)),
            rebalancer,
        };
        setup.join(200_000u64.units(6));
        let trader_balance = setup.ledger.balance_of(USDC, TRADER);

        assert_eq!(
            setup
                .rebalancer
                .rebalance_with_extra_main(TRADER, RECIPIENT, 5u64.units(6))
                .unwrap_err(),
            Error::Venue("vault is shut down".to_string())
        );
        let main = setup.main_info();
        assert_eq!((main.cash, main.managed), (200_000u64.units(6), U256::ZERO));
        assert_eq!(setup.ledger.balance_of(USDC, TRADER), trader_balance);
        assert_eq!(
            setup.ledger.balance_of(USDC, setup.rebalancer.address()),
            U256::ZERO
        );
    }

    /// A vault keeping one unit of every conversion it is told to skim.
    struct SkimmingVault {
        inner: Arc<YearnVault>,
        skim_deposits: AtomicBool,
        skim_redemptions: AtomicBool,
    }

    impl SkimmingVault {
        fn new() -> Self {
            Self {
                inner: yv_usdc(1u64.units(6)),
                skim_deposits: AtomicBool::new(false),
                skim_redemptions: AtomicBool::new(false),
            }
        }
    }

    impl RateSource for SkimmingVault {
        fn get_rate(&self) -> Result<U256, VenueRevert> {
            self.inner.get_rate()
        }

        fn decimals(&self) -> u8 {
            self.inner.decimals()
        }
    }

    impl Venue for SkimmingVault {
        fn protocol(&self) -> Protocol {
            Protocol::Yearn
        }

        fn wrapped_token(&self) -> WrappedToken {
            self.inner.wrapped_token()
        }

        fn deposit(&self, tokens: &dyn Tokens, account: Address, assets: U256) -> Result<U256, Error> {
            let minted = self.inner.deposit(tokens, account, assets)?;
            if !self.skim_deposits.load(Ordering::SeqCst) {
                return Ok(minted);
            }
            tokens.burn(YV_USDC, account, U256::from(1))?;
            Ok(minted - U256::from(1))
        }

        fn redeem(&self, tokens: &dyn Tokens, account: Address, shares: U256) -> Result<U256, Error> {
            let redeemed = self.inner.redeem(tokens, account, shares)?;
            if !self.skim_redemptions.load(Ordering::SeqCst) {
                return Ok(redeemed);
            }
            tokens.transfer(USDC, account, YV_USDC, U256::from(1))?;
            Ok(redeemed - U256::from(1))
        }
    }

    fn skimming_setup() -> (Arc<SkimmingVault>, Setup) {
        let venue = Arc::new(SkimmingVault::new());
        let (ledger, rebalancer) = setup_with_venue(venue.clone());
        let setup = Setup {
            ledger,
            venue: venue.inner.clone(),
            rebalancer,
        };
        (venue, setup)
    }

    #[test]
    fn short_deposits_are_unwound() {
        let (venue, setup) = skimming_setup();
        setup.join(200_000u64.units(6));
        venue.skim_deposits.store(true, Ordering::SeqCst);

        assert_eq!(
            setup.rebalancer.rebalance(RECIPIENT).unwrap_err(),
            Error::UnexpectedConversion {
                planned: 149_000u64.units(6),
                actual: 149_000u64.units(6) - U256::from(1),
            }
        );
        // Everything but the skimmed unit is back in the pool.
        let main = setup.main_info();
        assert_eq!(
            (main.cash, main.managed),
            (200_000u64.units(6) - U256::from(1), U256::ZERO)
        );
        let wrapped = setup.wrapped_info();
        assert_eq!((wrapped.cash, wrapped.managed), (U256::ZERO, U256::ZERO));
        let rebalancer = setup.rebalancer.address();
        assert_eq!(setup.ledger.balance_of(USDC, rebalancer), U256::ZERO);
        assert_eq!(setup.ledger.balance_of(YV_USDC, rebalancer), U256::ZERO);
        assert_eq!(setup.ledger.balance_of(USDC, RECIPIENT), U256::ZERO);
    }

    #[test]
    fn short_redemptions_are_unwound() {
        let (venue, setup) = skimming_setup();
        setup.join(200_000u64.units(6));
        setup.rebalancer.rebalance(RECIPIENT).unwrap();
        setup
            .pool()
            .set_targets(OWNER, 40_000u64.fp(), 60_000u64.fp())
            .unwrap();
        setup.swap(
            SwapKind::GivenOut,
            setup.pool().bpt(),
            USDC,
            20_000u64.units(6),
        );
        venue.skim_redemptions.store(true, Ordering::SeqCst);

        assert_eq!(
            setup.rebalancer.rebalance(RECIPIENT).unwrap_err(),
            Error::UnexpectedConversion {
                planned: 20_100u64.units(6),
                actual: 20_100u64.units(6) - U256::from(1),
            }
        );
        let main = setup.main_info();
        assert_eq!((main.cash, main.managed), (30_000u64.units(6), U256::ZERO));
        let wrapped = setup.wrapped_info();
        assert_eq!(
            (wrapped.cash, wrapped.managed),
            (149_000u64.units(6) - U256::from(1), U256::ZERO)
        );
        let rebalancer = setup.rebalancer.address();
        assert_eq!(setup.ledger.balance_of(USDC, rebalancer), U256::ZERO);
        assert_eq!(setup.ledger.balance_of(YV_USDC, rebalancer), U256::ZERO);
    }
}
