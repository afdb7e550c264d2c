//! Rate-limit ledger storage.
//!
//! # Responsibilities
//! - Hold one `LedgerEntry` per client identifier
//! - Provide an atomic per-key read-modify-write for the limiter
//! - Drop expired entries on sweep
//!
//! # Design Decisions
//! - Storage is behind a trait so a shared cache can replace the in-memory map
//! - Operations are synchronous: the limiter never suspends between read and write
//! - `MemoryLedger` relies on DashMap shard locks for per-key atomicity

use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;

/// Counter state for one client within its current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Requests seen in the current window.
    pub count: u32,
    /// First request of the window plus the window length.
    pub reset_at: Instant,
}

impl LedgerEntry {
    pub fn is_expired(&self, now: Instant) -> bool {
        now > self.reset_at
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("ledger backend unavailable: {0}")]
    Unavailable(String),
}

/// Backing store for the rate-limit ledger.
pub trait LedgerStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<LedgerEntry>, StoreError>;

    fn set(&self, key: &str, entry: LedgerEntry) -> Result<(), StoreError>;

    /// Atomically replace the entry for `key` with `step(current)`.
    /// No other update of the same key may interleave with `step`.
    fn update(
        &self,
        key: &str,
        step: &mut dyn FnMut(Option<LedgerEntry>) -> LedgerEntry,
    ) -> Result<LedgerEntry, StoreError>;

    /// Remove every entry expired at `now`. Returns how many were removed.
    fn sweep(&self, now: Instant) -> Result<usize, StoreError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local ledger.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    entries: Arc<DashMap<String, LedgerEntry>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryLedger {
    fn get(&self, key: &str) -> Result<Option<LedgerEntry>, StoreError> {
        Ok(self.entries.get(key).map(|entry| *entry.value()))
    }

    fn set(&self, key: &str, entry: LedgerEntry) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        step: &mut dyn FnMut(Option<LedgerEntry>) -> LedgerEntry,
    ) -> Result<LedgerEntry, StoreError> {
        // The entry guard holds the shard write lock until it is dropped.
        let next = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let next = step(Some(*occupied.get()));
                *occupied.get_mut() = next;
                next
            }
            Entry::Vacant(vacant) => {
                let next = step(None);
                vacant.insert(next);
                next
            }
        };
        Ok(next)
    }

    fn sweep(&self, now: Instant) -> Result<usize, StoreError> {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
