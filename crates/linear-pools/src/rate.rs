//! Reads the rate of a wrapped token from its venue.
//!
//! Venues report the rate in their own precision; the adapter normalizes it to
//! an 18-decimal fixed point value meaning "one wrapped token is worth this
//! many main tokens". Venues are untrusted: a venue can revert with data that
//! looks like the result of a Vault query in order to fake a pool's state.
//! Such reverts abort the operation with `MaliciousQueryRevert`.

use {
    crate::{
        error::{BalancerError, Error},
        fixed_point::Bfp,
        math::BalU256,
        venues::Venue,
    },
    alloy_primitives::U256,
    number::u256_ext::U256Ext,
    std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    tracing::instrument,
};

const RATE_DECIMALS: u8 = 18;

/// Rate of a wrapped token as reported by its venue.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
pub trait RateSource: Send + Sync {
    /// Exchange rate of one wrapped token in main tokens, expressed with
    /// [`RateSource::decimals`] decimals.
    fn get_rate(&self) -> Result<U256, VenueRevert>;

    fn decimals(&self) -> u8;
}

/// How a venue behaves when its rate is queried.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, strum::Display, strum::EnumIter)]
pub enum RevertType {
    #[default]
    DoNotRevert,
    /// The venue hit an ordinary failure it recovered from; the rate is still
    /// reported.
    NonMalicious,
    /// The venue reverts with data shaped like the result of a swap query.
    MaliciousSwapQuery,
    /// The venue reverts with data shaped like the result of a join or exit
    /// query.
    MaliciousJoinExitQuery,
}

impl RevertType {
    pub fn is_malicious(self) -> bool {
        matches!(
            self,
            Self::MaliciousSwapQuery | Self::MaliciousJoinExitQuery
        )
    }

    /// The revert a venue configured with this type raises before answering.
    pub fn check(self) -> Result<(), VenueRevert> {
        match self {
            Self::DoNotRevert | Self::NonMalicious => Ok(()),
            Self::MaliciousSwapQuery => Err(VenueRevert::SwapQueryResult),
            Self::MaliciousJoinExitQuery => Err(VenueRevert::JoinExitQueryResult),
        }
    }
}

/// A failed venue call.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum VenueRevert {
    #[error("revert data mimics a swap query result")]
    SwapQueryResult,
    #[error("revert data mimics a join/exit query result")]
    JoinExitQueryResult,
    #[error("{0}")]
    Reason(String),
}

impl VenueRevert {
    pub fn is_malicious(&self) -> bool {
        matches!(self, Self::SwapQueryResult | Self::JoinExitQueryResult)
    }
}

impl From<VenueRevert> for Error {
    fn from(revert: VenueRevert) -> Self {
        if revert.is_malicious() {
            BalancerError::MaliciousQueryRevert.into()
        } else {
            Error::Venue(revert.to_string())
        }
    }
}

/// Converts a rate with `decimals` decimals into an 18-decimal fixed point
/// value.
pub fn normalize(rate: U256, decimals: u8) -> Result<Bfp, BalancerError> {
    let factor = U256::checked_exp10(u32::from(decimals.abs_diff(RATE_DECIMALS)))
        .ok_or(BalancerError::MulOverflow)?;
    let rate = if decimals <= RATE_DECIMALS {
        rate.bmul(factor)?
    } else {
        rate.bdiv_down(factor)?
    };
    Ok(Bfp::from_wei(rate))
}

/// Fetches and normalizes the rate of a single venue on behalf of a pool.
///
/// While the venue is being queried the adapter marks a query as pending.
/// Operations that mutate the pool check the marker and refuse to run while it
/// is set, so a venue can't re-enter the pool from within `get_rate`.
pub struct WrappedTokenRate {
    venue: Arc<dyn Venue>,
    pending_query: AtomicBool,
}

impl WrappedTokenRate {
    pub fn new(venue: Arc<dyn Venue>) -> Self {
        Self {
            venue,
            pending_query: AtomicBool::new(false),
        }
    }

    pub fn venue(&self) -> &Arc<dyn Venue> {
        &self.venue
    }

    #[instrument(level = "trace", skip_all, fields(protocol = %self.venue.protocol()))]
    pub fn get(&self) -> Result<Bfp, Error> {
        let _query = PendingQuery::enter(&self.pending_query);
        let rate = self.venue.get_rate().inspect_err(|revert| {
            tracing::warn!(%revert, malicious = revert.is_malicious(), "wrapped token rate query reverted");
        })?;
        let rate = normalize(rate, self.venue.decimals())?;
        tracing::trace!(%rate, "fetched wrapped token rate");
        Ok(rate)
    }

    /// Fails with `MaliciousQueryRevert` while a venue query is in progress.
    pub fn ensure_no_pending_query(&self) -> Result<(), BalancerError> {
        if self.pending_query.load(Ordering::SeqCst) {
            return Err(BalancerError::MaliciousQueryRevert);
        }
        Ok(())
    }

    /// Keeps the pending query marker set until the guard is dropped, for
    /// operations that call into the venue more than once.
    pub fn enter_query(&self) -> Result<PendingQuery<'_>, BalancerError> {
        self.ensure_no_pending_query()?;
        Ok(PendingQuery::enter(&self.pending_query))
    }
}

/// Sets the pending query marker for as long as it is alive and restores the
/// previous value on drop, so nested reads leave the outer marker in place.
pub struct PendingQuery<'a> {
    marker: &'a AtomicBool,
    previous: bool,
}

impl<'a> PendingQuery<'a> {
    fn enter(marker: &'a AtomicBool) -> Self {
        let previous = marker.swap(true, Ordering::SeqCst);
        Self { marker, previous }
    }
}

impl Drop for PendingQuery<'_> {
    fn drop(&mut self) {
        self.marker.store(self.previous, Ordering::SeqCst);
    }
}
