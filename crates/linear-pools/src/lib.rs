//! Balancer linear pools whose main token balance is kept inside a target
//! band by rebalancers that wrap and unwrap tokens at yield venues.

#[macro_use]
pub mod macros;

pub mod clock;
pub mod config;
pub mod error;
pub mod factory;
pub mod fees;
pub mod fixed_point;
pub mod linear_math;
pub mod math;
pub mod pool;
pub mod rate;
pub mod rebalancer;
pub mod registry;
pub mod targets;
pub mod tokens;
pub mod vault;
pub mod venues;

pub use error::{BalancerError, Error};
