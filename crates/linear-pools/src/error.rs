//! Module listing the errors raised by linear pools, their rebalancers and
//! factories. Coded errors mirror the numbering of the Balancer contracts:
//! https://github.com/balancer-labs/balancer-v2-monorepo/blob/master/pkg/interfaces/contracts/solidity-utils/helpers/BalancerErrors.sol

use {alloy_primitives::U256, std::fmt};

macro_rules! errors_from_codes {
    ( $( ( $variant:ident, $code:literal ) ),+ $(,)? ) => {
        #[derive(thiserror::Error, Clone, Copy, Debug, PartialEq, Eq)]
        pub enum BalancerError {
            $(
                $variant,
            )*
        }

        impl BalancerError {
            /// The numeric `BAL#` code of the error.
            pub fn code(&self) -> u16 {
                match self {
                    $(
                        Self::$variant => $code,
                    )*
                }
            }
        }

        impl fmt::Display for BalancerError {
            fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
                match self {
                    $(
                        Self::$variant => write!(f, "BAL#{:0>3}: {}", $code, stringify!($variant)),
                    )*
                }
            }
        }

        #[cfg(test)]
        impl From<&str> for BalancerError {
            fn from(errno: &str) -> Self {
                match errno.parse::<u16>().unwrap() {
                    $(
                        $code => Self::$variant,
                    )*
                    _ => panic!("Invalid error code"),
                }
            }
        }
    }
}

errors_from_codes!(
    // math
    (AddOverflow, 0),
    (SubOverflow, 1),
    (MulOverflow, 3),
    (ZeroDivision, 4),
    // pools
    (MaxSwapFeePercentage, 202),
    (InvalidToken, 309),
    (InvalidTargets, 332),
    (UpperTargetTooHigh, 333),
    (UnhandledByLinearPool, 334),
    (OutOfTargetRange, 335),
    (OutOfNewTargetRange, 343),
    (MaliciousQueryRevert, 357),
    // lib
    (Unauthorized, 401),
    (MaxPauseWindowDuration, 404),
    (MaxBufferPeriodDuration, 405),
    (Erc20TransferExceedsBalance, 416),
    // vault
    (InvalidPoolId, 500),
    (SenderNotAssetManager, 502),
    (SwapLimit, 507),
    (SwapDeadline, 508),
    (CannotSwapSameToken, 509),
    (TokenMismatch, 520),
    (TokenNotRegistered, 521),
    (TokenAlreadyRegistered, 522),
);

/// Error raised by any linear pool operation.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Balancer(#[from] BalancerError),
    /// A wrapped token venue failed for a reason unrelated to query
    /// manipulation. The venue's reason is bubbled up unchanged.
    #[error("wrapped token venue reverted: {0}")]
    Venue(String),
    #[error("nothing to rebalance")]
    NothingToRebalance,
    #[error("insufficient main token: {required} required but only {available} available")]
    InsufficientMainToken { required: U256, available: U256 },
    /// The venue converted a different amount than it quoted when the
    /// rebalance was planned.
    #[error("venue converted {actual} but {planned} were planned")]
    UnexpectedConversion { planned: U256, actual: U256 },
    #[error("Protocol ID not registered")]
    NotRegistered,
    #[error("Protocol ID already registered")]
    AlreadyRegistered,
}

impl Error {
    /// Whether this error aborts an operation because a query was tampered
    /// with.
    pub fn is_malicious_query_revert(&self) -> bool {
        matches!(self, Self::Balancer(BalancerError::MaliciousQueryRevert))
    }
}
