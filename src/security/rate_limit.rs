//! Fixed-window rate limiting.
//!
//! Each client gets `max_requests` per window. The window starts at the
//! client's first request and is replaced wholesale once it has passed, so a
//! client can burst up to twice the limit across a window boundary.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::security::clock::Clock;
use crate::security::ledger::{LedgerEntry, LedgerStore, StoreError};

#[derive(Debug, Error)]
pub enum LimitError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("rate limit window of {0:?} overflows the clock")]
    WindowOverflow(Duration),
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allowed { count: u32, reset_at: Instant },
    Limited { retry_after: Duration },
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed { .. })
    }
}

/// Advance one client's window by a single request.
///
/// Returns the entry to store and whether the request is admitted. A full
/// window is returned unchanged: the count stays capped at `max_requests`.
pub fn step(
    current: Option<LedgerEntry>,
    now: Instant,
    max_requests: u32,
    window: Duration,
) -> (LedgerEntry, bool) {
    match current {
        Some(entry) if !entry.is_expired(now) => {
            if entry.count >= max_requests {
                (entry, false)
            } else {
                (
                    LedgerEntry {
                        count: entry.count + 1,
                        ..entry
                    },
                    true,
                )
            }
        }
        _ => (
            LedgerEntry {
                count: 1,
                reset_at: now + window,
            },
            true,
        ),
    }
}

/// Per-client fixed-window limiter over a `LedgerStore`.
pub struct FixedWindowLimiter {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    max_requests: u32,
    window: Duration,
}

impl FixedWindowLimiter {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        max_requests: u32,
        window: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            max_requests,
            window,
        }
    }

    /// Count one request for `key`.
    pub fn check(&self, key: &str) -> Result<Verdict, LimitError> {
        let now = self.clock.now();
        let (max_requests, window) = (self.max_requests, self.window);
        if now.checked_add(window).is_none() {
            return Err(LimitError::WindowOverflow(window));
        }
        let mut admitted = false;

        let entry = self.store.update(key, &mut |current| {
            let (next, allowed) = step(current, now, max_requests, window);
            admitted = allowed;
            next
        })?;

        if admitted {
            Ok(Verdict::Allowed {
                count: entry.count,
                reset_at: entry.reset_at,
            })
        } else {
            Ok(Verdict::Limited {
                retry_after: entry.reset_at.saturating_duration_since(now),
            })
        }
    }

    /// Drop expired ledger entries.
    pub fn sweep(&self) -> Result<usize, StoreError> {
        self.store.sweep(self.clock.now())
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl std::fmt::Debug for FixedWindowLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedWindowLimiter")
            .field("max_requests", &self.max_requests)
            .field("window", &self.window)
            .field("entries", &self.store.len())
            .finish()
    }
}
