//! Factory deploying linear pools together with their rebalancers.

use {
    crate::{
        clock::Clock,
        config::FactoryConfig,
        error::{BalancerError, Error},
        fixed_point::Bfp,
        math::decimals_factor,
        pool::{self, LinearPool, MAX_TOKEN_BALANCE, PoolParams},
        rebalancer::LinearPoolRebalancer,
        registry::{Authorizer, ProtocolIdRegistry},
        targets::Targets,
        tokens::Tokens,
        vault::Vault,
        venues::Venue,
    },
    alloy_primitives::{Address, U256, keccak256},
    std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    },
    tracing::instrument,
};

/// Parameters of a new pool.
pub struct CreatePoolParams {
    pub name: String,
    pub symbol: String,
    pub main_token: Address,
    pub venue: Arc<dyn Venue>,
    /// Upper target, 18 decimals. The lower target starts at zero.
    pub upper_target: U256,
    pub swap_fee_percentage: Bfp,
    pub owner: Address,
    pub protocol_id: u32,
}

/// A pool deployed by the factory and the rebalancer managing its assets.
#[derive(Clone)]
pub struct CreatedPool {
    pub pool: Arc<LinearPool>,
    pub rebalancer: Arc<LinearPoolRebalancer>,
}

impl std::fmt::Debug for CreatedPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreatedPool")
            .field("pool", &self.pool.address())
            .field("rebalancer", &self.rebalancer.address())
            .finish()
    }
}

/// Pause configuration of pools created now: time left in the pause window
/// and the buffer period, in seconds.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PauseConfiguration {
    pub pause_window_duration: u64,
    pub buffer_period_duration: u64,
}

pub struct LinearPoolFactory {
    address: Address,
    vault: Arc<dyn Vault>,
    tokens: Arc<dyn Tokens>,
    clock: Arc<dyn Clock>,
    config: FactoryConfig,
    pause_window_end_time: u64,
    registry: ProtocolIdRegistry,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    nonce: u64,
    pools: HashMap<Address, CreatedPool>,
    last_created_pool: Option<Address>,
}

impl LinearPoolFactory {
    pub fn new(
        address: Address,
        vault: Arc<dyn Vault>,
        tokens: Arc<dyn Tokens>,
        clock: Arc<dyn Clock>,
        authorizer: Arc<dyn Authorizer>,
        config: FactoryConfig,
    ) -> Result<Self, Error> {
        config.validate()?;
        let pause_window_end_time = clock
            .now()
            .saturating_add(config.pause_window_duration.as_secs());
        Ok(Self {
            address,
            vault,
            tokens,
            clock,
            config,
            pause_window_end_time,
            registry: ProtocolIdRegistry::new(address, authorizer),
            state: Default::default(),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// The factory version document as JSON.
    pub fn version(&self) -> String {
        self.config.factory_version.to_string()
    }

    /// The version document of the pools created by this factory as JSON.
    pub fn get_pool_version(&self) -> String {
        self.config.pool_version.to_string()
    }

    pub fn get_last_created_pool(&self) -> Option<Address> {
        self.state.lock().unwrap().last_created_pool
    }

    pub fn is_pool_from_factory(&self, pool: Address) -> bool {
        self.state.lock().unwrap().pools.contains_key(&pool)
    }

    pub fn get_pool(&self, pool: Address) -> Option<CreatedPool> {
        self.state.lock().unwrap().pools.get(&pool).cloned()
    }

    pub fn get_pause_configuration(&self) -> PauseConfiguration {
        let now = self.clock.now();
        if now < self.pause_window_end_time {
            PauseConfiguration {
                pause_window_duration: self.pause_window_end_time - now,
                buffer_period_duration: self.config.buffer_period_duration.as_secs(),
            }
        } else {
            PauseConfiguration {
                pause_window_duration: 0,
                buffer_period_duration: 0,
            }
        }
    }

    pub fn register_protocol_id(
        &self,
        caller: Address,
        protocol_id: u32,
        name: &str,
    ) -> Result<(), Error> {
        self.registry.register_protocol_id(caller, protocol_id, name)
    }

    pub fn get_protocol_name(&self, protocol_id: u32) -> Result<String, Error> {
        self.registry.get_protocol_name(protocol_id)
    }

    #[instrument(level = "debug", skip_all, fields(symbol = %params.symbol, protocol = %params.venue.protocol()))]
    pub fn create(&self, params: CreatePoolParams) -> Result<CreatedPool, Error> {
        let wrapped = params.venue.wrapped_token();
        if params.venue.enforce_asset_match() && wrapped.asset != params.main_token {
            return Err(BalancerError::TokenMismatch.into());
        }
        let main_decimals = self.tokens.decimals(params.main_token)?;
        decimals_factor(main_decimals)?;
        Targets::new(U256::ZERO, params.upper_target)?;
        pool::ensure_valid_fee(params.swap_fee_percentage)?;
        let (pause_window_end_time, buffer_period_end_time) = self.pause_window_end_times();

        let mut state = self.state.lock().unwrap();
        let pool_address = self.deployment_address(state.nonce, "pool");
        let rebalancer_address = self.deployment_address(state.nonce, "rebalancer");
        state.nonce += 1;
        self.tokens.deploy_token(pool_address, 18)?;
        let pool = LinearPool::new(
            self.vault.clone(),
            PoolParams {
                address: pool_address,
                name: params.name,
                symbol: params.symbol,
                version: self.get_pool_version(),
                owner: params.owner,
                main_token: params.main_token,
                main_decimals,
                venue: params.venue,
                upper_target: params.upper_target,
                swap_fee_percentage: params.swap_fee_percentage,
                protocol_id: params.protocol_id,
                asset_manager: rebalancer_address,
                pause_window_end_time,
                buffer_period_end_time,
            },
        )?;
        self.tokens
            .mint(pool_address, pool_address, MAX_TOKEN_BALANCE)?;
        self.vault.join_pool(
            pool.pool_id(),
            pool_address,
            &[U256::ZERO, U256::ZERO, MAX_TOKEN_BALANCE],
        )?;
        let rebalancer = Arc::new(LinearPoolRebalancer::new(
            rebalancer_address,
            pool.clone(),
            self.tokens.clone(),
        ));

        let created = CreatedPool { pool, rebalancer };
        state.pools.insert(pool_address, created.clone());
        state.last_created_pool = Some(pool_address);
        tracing::info!(
            pool = %pool_address,
            rebalancer = %rebalancer_address,
            protocol_id = params.protocol_id,
            "created linear pool"
        );
        Ok(created)
    }

    /// Pools created within the factory's pause window share its end time;
    /// later pools can't be paused at all.
    fn pause_window_end_times(&self) -> (u64, u64) {
        let now = self.clock.now();
        if now < self.pause_window_end_time {
            let buffer = self.config.buffer_period_duration.as_secs();
            (
                self.pause_window_end_time,
                self.pause_window_end_time.saturating_add(buffer),
            )
        } else {
            (now, now)
        }
    }

    fn deployment_address(&self, nonce: u64, kind: &str) -> Address {
        let mut data = self.address.to_vec();
        data.extend_from_slice(&nonce.to_be_bytes());
        data.extend_from_slice(kind.as_bytes());
        Address::from_word(keccak256(data))
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            bfp,
            config::Version,
            registry::{InMemoryAuthorizer, REGISTER_PROTOCOL_ID, action_id},
            targets::MAX_UPPER_TARGET,
            tokens::Ledger,
            vault::InMemoryVault,
            venues::{
                WrappedToken,
                silo::{SiloAssetStorage, SiloShareToken},
                yearn::YearnVault,
            },
        },
        number::units::TokenUnit,
        std::{
            sync::atomic::{AtomicU64, Ordering},
            time::Duration,
        },
        testlib::{
            protocol::{DAO_MULTISIG, VAULT},
            tokens::{DAI, USDC, YV_USDC},
        },
    };

    const FACTORY: Address = Address::repeat_byte(0xfa);
    const OWNER: Address = Address::repeat_byte(0x0e);
    const DAY: u64 = 24 * 60 * 60;

    #[derive(Default)]
    struct TestClock(AtomicU64);

    impl Clock for TestClock {
        fn now(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn config() -> FactoryConfig {
        let version = |name: &str| Version {
            name: name.to_string(),
            version: 1,
            deployment: "20221114-yearn-rebalanced-linear-pool".to_string(),
        };
        FactoryConfig::new(
            version("YearnLinearPoolFactory"),
            version("YearnLinearPool"),
        )
    }

    struct Setup {
        ledger: Arc<Ledger>,
        clock: Arc<TestClock>,
        authorizer: Arc<InMemoryAuthorizer>,
        factory: LinearPoolFactory,
    }

    fn setup() -> Setup {
        let ledger = Arc::new(
            Ledger::new()
                .with_token(USDC, 6)
                .with_token(DAI, 18)
                .with_token(YV_USDC, 6),
        );
        let clock = Arc::new(TestClock::default());
        let authorizer = Arc::new(InMemoryAuthorizer::new());
        let vault = Arc::new(InMemoryVault::new(VAULT, ledger.clone(), clock.clone()));
        let factory = LinearPoolFactory::new(
            FACTORY,
            vault,
            ledger.clone(),
            clock.clone(),
            authorizer.clone(),
            config(),
        )
        .unwrap();
        Setup {
            ledger,
            clock,
            authorizer,
            factory,
        }
    }

    fn yv_usdc(asset: Address) -> Arc<YearnVault> {
        Arc::new(YearnVault::new(
            WrappedToken {
                address: YV_USDC,
                decimals: 6,
                asset,
                asset_decimals: 6,
            },
            1u64.units(6),
        ))
    }

    fn params(venue: Arc<dyn Venue>) -> CreatePoolParams {
        CreatePoolParams {
            name: "Balancer Yearn Boosted USDC".to_string(),
            symbol: "bb-yv-USDC".to_string(),
            main_token: USDC,
            venue,
            upper_target: 100_000u64.fp(),
            swap_fee_percentage: bfp!("0.01"),
            owner: OWNER,
            protocol_id: 0,
        }
    }

    #[test]
    fn creates_registered_pools() {
        let setup = setup();
        let factory = &setup.factory;
        assert_eq!(factory.get_last_created_pool(), None);

        let created = factory.create(params(yv_usdc(USDC))).unwrap();
        let pool = &created.pool;
        assert_eq!(factory.get_last_created_pool(), Some(pool.address()));
        assert!(factory.is_pool_from_factory(pool.address()));
        assert!(!factory.is_pool_from_factory(USDC));
        assert_eq!(pool.version(), factory.get_pool_version());
        assert_eq!(pool.owner(), OWNER);
        assert_eq!(pool.asset_manager(), created.rebalancer.address());
        assert_eq!(pool.get_targets().lower(), U256::ZERO);
        assert_eq!(pool.get_targets().upper(), 100_000u64.fp());

        let vault = pool.vault();
        let (tokens, balances) = vault.get_pool_tokens(pool.pool_id()).unwrap();
        assert_eq!(tokens, vec![USDC, YV_USDC, pool.address()]);
        assert_eq!(balances[2], MAX_TOKEN_BALANCE);
        for token in [USDC, YV_USDC] {
            let info = vault.get_pool_token_info(pool.pool_id(), token).unwrap();
            assert_eq!(info.asset_manager, created.rebalancer.address());
        }
        assert_eq!(
            setup.ledger.balance_of(pool.address(), VAULT),
            MAX_TOKEN_BALANCE
        );

        let second = factory.create(params(yv_usdc(USDC))).unwrap();
        assert_ne!(second.pool.address(), pool.address());
        assert_ne!(second.pool.pool_id(), pool.pool_id());
        assert_eq!(factory.get_last_created_pool(), Some(second.pool.address()));
    }

    #[test]
    fn version_documents() {
        let setup = setup();
        let version: serde_json::Value =
            serde_json::from_str(&setup.factory.version()).unwrap();
        assert_eq!(
            version,
            serde_json::json!({
                "name": "YearnLinearPoolFactory",
                "version": 1,
                "deployment": "20221114-yearn-rebalanced-linear-pool",
            })
        );
        assert!(setup.factory.get_pool_version().contains("\"YearnLinearPool\""));
    }

    #[test]
    fn wrapped_asset_must_match_main_token() {
        let setup = setup();
        let err = setup.factory.create(params(yv_usdc(DAI))).unwrap_err();
        assert_eq!(err, Error::Balancer(BalancerError::TokenMismatch));
        assert_eq!(err.to_string(), "BAL#520: TokenMismatch");
        assert_eq!(setup.factory.get_last_created_pool(), None);

        // Silo share tokens don't expose a reliable asset.
        let silo = Arc::new(SiloShareToken::new(
            WrappedToken {
                address: YV_USDC,
                decimals: 6,
                asset: DAI,
                asset_decimals: 18,
            },
            SiloAssetStorage::default(),
        ));
        setup.factory.create(params(silo)).unwrap();
    }

    #[test]
    fn invalid_pools_deploy_nothing() {
        let setup = setup();
        let factory = &setup.factory;
        let first_address = factory.deployment_address(0, "pool");

        let too_high = CreatePoolParams {
            upper_target: MAX_UPPER_TARGET + U256::from(1),
            ..params(yv_usdc(USDC))
        };
        assert_eq!(
            factory.create(too_high).unwrap_err(),
            Error::Balancer(BalancerError::UpperTargetTooHigh)
        );
        let fee_too_high = CreatePoolParams {
            swap_fee_percentage: bfp!("1"),
            ..params(yv_usdc(USDC))
        };
        assert_eq!(
            factory.create(fee_too_high).unwrap_err(),
            Error::Balancer(BalancerError::MaxSwapFeePercentage)
        );
        assert_eq!(factory.get_last_created_pool(), None);
        assert!(setup.ledger.decimals(first_address).is_err());

        let created = factory.create(params(yv_usdc(USDC))).unwrap();
        assert_eq!(created.pool.address(), first_address);
    }

    #[test]
    fn pause_windows() {
        let setup = setup();
        let factory = &setup.factory;
        setup.clock.0.store(10 * DAY, Ordering::SeqCst);
        assert_eq!(
            factory.get_pause_configuration(),
            PauseConfiguration {
                pause_window_duration: 80 * DAY,
                buffer_period_duration: 30 * DAY,
            }
        );
        let early = factory.create(params(yv_usdc(USDC))).unwrap();
        assert_eq!(early.pool.get_pause_window(), (90 * DAY, 120 * DAY));

        setup.clock.0.store(91 * DAY, Ordering::SeqCst);
        assert_eq!(
            factory.get_pause_configuration(),
            PauseConfiguration {
                pause_window_duration: 0,
                buffer_period_duration: 0,
            }
        );
        let late = factory.create(params(yv_usdc(USDC))).unwrap();
        assert_eq!(late.pool.get_pause_window(), (91 * DAY, 91 * DAY));
    }

    #[test]
    fn protocol_ids() {
        let setup = setup();
        let factory = &setup.factory;
        assert_eq!(
            factory
                .register_protocol_id(DAO_MULTISIG, 1, "Yearn")
                .unwrap_err(),
            Error::Balancer(BalancerError::Unauthorized)
        );
        setup.authorizer.grant_permissions(
            &[action_id(FACTORY, REGISTER_PROTOCOL_ID)],
            DAO_MULTISIG,
            FACTORY,
        );
        factory.register_protocol_id(DAO_MULTISIG, 1, "Yearn").unwrap();
        assert_eq!(factory.get_protocol_name(1).unwrap(), "Yearn");
        assert_eq!(
            factory.register_protocol_id(DAO_MULTISIG, 1, "Tetu").unwrap_err(),
            Error::AlreadyRegistered
        );
        assert_eq!(factory.get_protocol_name(2).unwrap_err(), Error::NotRegistered);
    }

    #[test]
    fn rejects_long_pause_windows() {
        let ledger = Arc::new(Ledger::new());
        let clock = Arc::new(TestClock::default());
        let vault = Arc::new(InMemoryVault::new(VAULT, ledger.clone(), clock.clone()));
        let mut config = config();
        config.pause_window_duration = Duration::from_secs(271 * DAY);
        let result = LinearPoolFactory::new(
            FACTORY,
            vault,
            ledger,
            clock,
            Arc::new(InMemoryAuthorizer::new()),
            config,
        );
        assert_eq!(
            result.err(),
            Some(Error::Balancer(BalancerError::MaxPauseWindowDuration))
        );
    }
}
