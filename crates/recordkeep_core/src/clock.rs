//! Wall-clock source used by every time-sensitive rule.
//!
//! # Responsibility
//! - Provide "now" as Unix epoch milliseconds.
//! - Let tests and operators pin or advance time without sleeping.
//!
//! # Invariants
//! - All persisted instants are UTC epoch milliseconds.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Milliseconds in one day; retention and lookahead are counted in these.
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// Current time as Unix epoch milliseconds.
    fn now_ms(&self) -> i64;
}

/// Clock backed by the host UTC wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually driven clock.
///
/// Clones share the same instant, so a test can hand one clone to a
/// background task and advance time from the outside.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now_ms: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now_ms: Arc::new(AtomicI64::new(now_ms)),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn advance_days(&self, days: i64) {
        self.advance_ms(days * DAY_MS);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_ms(&self) -> i64 {
        (**self).now_ms()
    }
}

/// Whole days from `now_ms` until `target_ms`, rounded toward +infinity.
///
/// `ceil_days(now, now) == Some(0)`, half a day ahead is `1`, half a day
/// behind is `0`, a day and a half behind is `-1`. Returns `None` when the
/// two instants are too far apart to subtract.
pub fn ceil_days(now_ms: i64, target_ms: i64) -> Option<i64> {
    let diff = target_ms.checked_sub(now_ms)?;
    let days = diff / DAY_MS;
    if diff % DAY_MS > 0 {
        Some(days + 1)
    } else {
        Some(days)
    }
}
