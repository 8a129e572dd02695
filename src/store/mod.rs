//! Counter store abstraction.
//!
//! The rate limiter does not own its counters. It reads them from a shared
//! store and stages increments into a transaction that the store applies as
//! one atomic unit. Any store that can honor that contract can back the
//! limiter.

mod memory;
mod redis;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::ratelimit::CounterKey;

pub use self::memory::{InMemoryStore, InMemoryTransaction};
pub use self::redis::{RedisStore, RedisTransaction};

/// Errors raised by a counter store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An error that occurs during communication with Redis.
    #[error("failed to communicate with redis: {0}")]
    Redis(#[from] ::redis::RedisError),

    /// The store could not serve the request for another reason.
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

/// A shared, atomic key-value store holding window counters.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Transaction type produced by [`CounterStore::begin`].
    type Transaction: CounterTransaction;

    /// Read the current value of a counter. Missing keys read as `None`.
    async fn get(&self, key: &CounterKey) -> Result<Option<u64>, StoreError>;

    /// Open a new, empty transaction.
    ///
    /// Opening a transaction performs no I/O. Nothing reaches the store until
    /// [`CounterTransaction::commit`] is called.
    fn begin(&self) -> Self::Transaction;
}

/// A staged batch of counter updates, applied all at once or not at all.
#[async_trait]
pub trait CounterTransaction: Send + Sized {
    /// Stage an increment by one.
    fn increment(&mut self, key: &CounterKey);

    /// Stage an expiry reset. Expiring a missing key is a no-op.
    fn expire(&mut self, key: &CounterKey, ttl: Duration);

    /// Whether nothing has been staged.
    fn is_empty(&self) -> bool;

    /// Apply every staged operation as one atomic unit.
    async fn commit(self) -> Result<(), StoreError>;

    /// Drop every staged operation. Dropping the transaction has the same effect.
    fn discard(self);
}
