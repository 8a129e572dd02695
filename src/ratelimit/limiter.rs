//! Core rate limiter implementation.

use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::clock::{Clock, SystemClock};
use super::counter::Tier;
use super::descriptor::CounterKey;
use super::rules::QuotaTable;
use crate::store::{CounterStore, CounterTransaction, StoreError};

/// The admission decision for one request.
#[derive(Debug)]
pub enum Outcome {
    /// Every applicable tier had room, and the request has been counted.
    Allowed,
    /// A tier was already at its threshold. Nothing was counted.
    Denied {
        /// The first tier found at its threshold
        tier: Tier,
        /// Human readable explanation
        message: String,
    },
    /// The request could not be evaluated at all.
    Invalid(String),
    /// The counter store failed a read or the commit.
    ///
    /// The state of the counters is unknown after a failed commit.
    Backend(StoreError),
}

impl Outcome {
    fn denied(tier: Tier, limit: u64) -> Self {
        Outcome::Denied {
            tier,
            message: format!("Exceeded the {} rate limit of {}.", tier, limit),
        }
    }

    /// Whether the request was admitted.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Outcome::Allowed)
    }
}

/// Fixed-window, multi-tier rate limiter.
///
/// Each request is checked against up to four tiers in a fixed order: user
/// hourly, user daily, global hourly, global daily. A tier's increment is only
/// staged after its check passes, and the staged increments are committed in
/// a single transaction once every tier has passed. A denial or a store error
/// discards the transaction, so a rejected request never counts.
///
/// Checks are read-then-commit rather than compare-and-swap. Concurrent
/// requests that all read a counter just below its threshold can all be
/// admitted, overshooting it by up to the number of concurrent passers minus
/// one.
pub struct RateLimiter<S, C = SystemClock> {
    /// Thresholds per data source
    quotas: Arc<QuotaTable>,
    /// Shared counter store
    store: S,
    /// Source of the current window
    clock: C,
}

impl<S: CounterStore> RateLimiter<S> {
    /// Create a new rate limiter using the local wall clock.
    pub fn new(quotas: QuotaTable, store: S) -> Self {
        Self::with_clock(quotas, store, SystemClock)
    }
}

impl<S: CounterStore, C: Clock> RateLimiter<S, C> {
    /// Create a new rate limiter with an explicit clock.
    pub fn with_clock(quotas: QuotaTable, store: S, clock: C) -> Self {
        Self {
            quotas: Arc::new(quotas),
            store,
            clock,
        }
    }

    /// Decide whether a request for `data_source` by `user` may be served,
    /// and count it if so.
    ///
    /// An empty user is treated as no user, which disables the user tiers.
    pub async fn evaluate(&self, data_source: &str, user: Option<&str>) -> Outcome {
        let Some(thresholds) = self.quotas.lookup(data_source) else {
            debug!(data_source = %data_source, "Unknown data source");
            return Outcome::Invalid("unknown data source".to_string());
        };

        let user = user.filter(|u| !u.is_empty());
        let now = self.clock.now();
        let mut transaction = self.store.begin();

        for (tier, limit) in thresholds.applicable(user.is_some()) {
            let key = CounterKey::build(data_source, user, tier, now);

            let current = match self.store.get(&key).await {
                Ok(value) => value.unwrap_or(0),
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to read counter");
                    transaction.discard();
                    return Outcome::Backend(e);
                }
            };

            trace!(
                key = %key,
                tier = %tier,
                current = current,
                limit = limit,
                "Checking rate limit"
            );

            if current >= limit {
                debug!(
                    data_source = %data_source,
                    tier = %tier,
                    limit = limit,
                    "Rate limit exceeded"
                );
                transaction.discard();
                return Outcome::denied(tier, limit);
            }

            transaction.increment(&key);
            transaction.expire(&key, tier.window().ttl());
        }

        if transaction.is_empty() {
            transaction.discard();
            return Outcome::Allowed;
        }

        match transaction.commit().await {
            Ok(()) => Outcome::Allowed,
            Err(e) => {
                warn!(data_source = %data_source, error = %e, "Failed to commit counters");
                Outcome::Backend(e)
            }
        }
    }
}
