//! Redis-backed counter store.
//!
//! Reads are plain `GET`s. A transaction is a `MULTI`/`EXEC` pipeline of
//! `INCR` and `EXPIRE` commands, so Redis applies the whole batch atomically
//! and serializes it against concurrent commits touching the same keys.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Pipeline};
use tracing::{info, trace};

use super::{CounterStore, CounterTransaction, StoreError};
use crate::ratelimit::CounterKey;

/// A counter store backed by a Redis server.
///
/// The underlying connection is multiplexed and reconnects on failure, so a
/// single store can be cloned and shared by every in-flight request.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    /// Connect to the Redis server at `url`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;

        info!(url = %url, "Connected to redis");
        Ok(Self { connection })
    }
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    type Transaction = RedisTransaction;

    async fn get(&self, key: &CounterKey) -> Result<Option<u64>, StoreError> {
        let mut connection = self.connection.clone();
        let value = redis::cmd("GET")
            .arg(key.as_str())
            .query_async::<Option<u64>>(&mut connection)
            .await?;
        Ok(value)
    }

    fn begin(&self) -> RedisTransaction {
        let mut pipeline = redis::pipe();
        pipeline.atomic();

        RedisTransaction {
            connection: self.connection.clone(),
            pipeline,
            staged: 0,
        }
    }
}

/// A `MULTI`/`EXEC` transaction against a [`RedisStore`].
pub struct RedisTransaction {
    connection: ConnectionManager,
    pipeline: Pipeline,
    staged: usize,
}

impl fmt::Debug for RedisTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisTransaction")
            .field("staged", &self.staged)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CounterTransaction for RedisTransaction {
    fn increment(&mut self, key: &CounterKey) {
        self.pipeline.cmd("INCR").arg(key.as_str()).ignore();
        self.staged += 1;
    }

    fn expire(&mut self, key: &CounterKey, ttl: Duration) {
        self.pipeline
            .cmd("EXPIRE")
            .arg(key.as_str())
            .arg(ttl.as_secs())
            .ignore();
        self.staged += 1;
    }

    fn is_empty(&self) -> bool {
        self.staged == 0
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        if self.staged == 0 {
            return Ok(());
        }

        self.pipeline
            .query_async::<()>(&mut self.connection)
            .await?;

        trace!(commands = self.staged, "Committed redis transaction");
        Ok(())
    }

    fn discard(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{Tier, WindowInstant};

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
    }

    async fn delete(store: &RedisStore, key: &CounterKey) {
        let mut connection = store.connection.clone();
        let _: () = redis::cmd("DEL")
            .arg(key.as_str())
            .query_async(&mut connection)
            .await
            .unwrap();
    }

    fn key(source: &str) -> CounterKey {
        CounterKey::build(
            source,
            None,
            Tier::GlobalHourly,
            WindowInstant {
                hour_of_day: 11,
                day_of_month: 3,
            },
        )
    }

    #[tokio::test]
    #[ignore = "requires a running redis server"]
    async fn test_commit_increments_and_sets_expiry() {
        let store = RedisStore::connect(&redis_url()).await.unwrap();
        let key = key("turnstile-test-commit");

        delete(&store, &key).await;

        let mut tx = store.begin();
        tx.increment(&key);
        tx.expire(&key, Duration::from_secs(7200));
        assert!(!tx.is_empty());
        tx.commit().await.unwrap();

        let value = store.get(&key).await.unwrap();

        let mut connection = store.connection.clone();
        let ttl: i64 = redis::cmd("TTL")
            .arg(key.as_str())
            .query_async(&mut connection)
            .await
            .unwrap();
        delete(&store, &key).await;

        assert_eq!(value, Some(1));
        assert!(ttl > 0 && ttl <= 7200);
    }

    #[tokio::test]
    #[ignore = "requires a running redis server"]
    async fn test_discard_leaves_counter_untouched() {
        let store = RedisStore::connect(&redis_url()).await.unwrap();
        let key = key("turnstile-test-discard");

        delete(&store, &key).await;

        let mut tx = store.begin();
        tx.increment(&key);
        tx.discard();

        let value = store.get(&key).await.unwrap();
        delete(&store, &key).await;

        assert_eq!(value, None);
    }
}
