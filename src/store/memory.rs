//! Process-local counter store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::trace;

use super::{CounterStore, CounterTransaction, StoreError};
use crate::ratelimit::CounterKey;

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: u64,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Commits between two sweeps of expired counters.
const SWEEP_INTERVAL: u64 = 1024;

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, Entry>,
    commits: u64,
}

impl State {
    fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before - self.entries.len()
    }
}

type Shared = Arc<Mutex<State>>;

/// A counter store held in process memory.
///
/// Commits take a single lock over the whole map, so a transaction is never
/// partially visible. An expired counter is removed when a read touches it,
/// and every `SWEEP_INTERVAL` commits the whole map is swept. Clones share
/// the same counters.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Shared,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a live counter.
    ///
    /// Reading an expired counter removes it.
    pub fn value(&self, key: &str) -> Option<u64> {
        let now = Instant::now();
        let mut state = self.state.lock();

        let entry = state.entries.get(key).copied()?;
        if entry.is_live(now) {
            Some(entry.value)
        } else {
            state.entries.remove(key);
            None
        }
    }

    /// Number of live counters.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.state
            .lock()
            .entries
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every expired counter, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        self.state.lock().purge_expired(Instant::now())
    }

    /// Drop every counter.
    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }
}

#[async_trait]
impl CounterStore for InMemoryStore {
    type Transaction = InMemoryTransaction;

    async fn get(&self, key: &CounterKey) -> Result<Option<u64>, StoreError> {
        Ok(self.value(key.as_str()))
    }

    fn begin(&self) -> InMemoryTransaction {
        InMemoryTransaction {
            state: self.state.clone(),
            ops: Vec::new(),
        }
    }
}

#[derive(Debug)]
enum Op {
    Increment(String),
    Expire(String, Duration),
}

/// Transaction against an [`InMemoryStore`].
#[derive(Debug)]
pub struct InMemoryTransaction {
    state: Shared,
    ops: Vec<Op>,
}

#[async_trait]
impl CounterTransaction for InMemoryTransaction {
    fn increment(&mut self, key: &CounterKey) {
        self.ops.push(Op::Increment(key.as_str().to_owned()));
    }

    fn expire(&mut self, key: &CounterKey, ttl: Duration) {
        self.ops.push(Op::Expire(key.as_str().to_owned(), ttl));
    }

    fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    async fn commit(self) -> Result<(), StoreError> {
        if self.ops.is_empty() {
            return Ok(());
        }

        let now = Instant::now();
        let mut state = self.state.lock();
        let entries = &mut state.entries;

        for op in self.ops {
            match op {
                Op::Increment(key) => {
                    let entry = entries.entry(key).or_insert(Entry {
                        value: 0,
                        expires_at: None,
                    });
                    if !entry.is_live(now) {
                        *entry = Entry {
                            value: 0,
                            expires_at: None,
                        };
                    }
                    entry.value += 1;
                }
                Op::Expire(key, ttl) => match entries.get_mut(&key) {
                    Some(entry) if entry.is_live(now) => entry.expires_at = Some(now + ttl),
                    Some(_) => {
                        entries.remove(&key);
                    }
                    None => {}
                },
            }
        }

        state.commits += 1;
        if state.commits % SWEEP_INTERVAL == 0 {
            let purged = state.purge_expired(now);
            trace!(purged = purged, "Swept expired counters");
        }

        trace!(counters = state.entries.len(), "Committed in-memory transaction");
        Ok(())
    }

    fn discard(self) {}
}
