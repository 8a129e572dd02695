//! Admission control trait for abstracting limiter implementations.

use async_trait::async_trait;

use super::clock::Clock;
use super::limiter::{Outcome, RateLimiter};
use crate::store::CounterStore;

/// Trait for anything that can make an admission decision.
///
/// The HTTP layer depends on this rather than on [`RateLimiter`] directly, so
/// it stays independent of the counter store and clock in use.
#[async_trait]
pub trait AdmissionControl: Send + Sync {
    /// Evaluate a request for `data_source` on behalf of `user`.
    async fn evaluate(&self, data_source: &str, user: Option<&str>) -> Outcome;
}

#[async_trait]
impl<S, C> AdmissionControl for RateLimiter<S, C>
where
    S: CounterStore,
    C: Clock,
{
    async fn evaluate(&self, data_source: &str, user: Option<&str>) -> Outcome {
        RateLimiter::evaluate(self, data_source, user).await
    }
}
