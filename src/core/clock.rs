//! Time Source
//!
//! Every timestamp the server records (seat `since`, game `createdAt`,
//! `turnStartedAt`, line `playedAt`) comes from an injected [`Clock`].
//! Liveness and turn-budget decisions are pure functions of those values.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// Milliseconds since the Unix epoch.
pub type Millis = u64;

/// Source of the current time in milliseconds.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now_ms(&self) -> Millis;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> Millis {
        // Pre-epoch clocks clamp to zero.
        Utc::now().timestamp_millis().max(0) as Millis
    }
}

/// Manually driven clock.
///
/// Starts at a fixed instant and only moves when told to, so matchmaking
/// timelines and turn budgets can be replayed exactly.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: Millis) -> Self {
        Self { now: AtomicU64::new(start) }
    }

    /// Jump to an absolute instant.
    pub fn set(&self, now: Millis) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move forward by `delta` milliseconds.
    pub fn advance(&self, delta: Millis) {
        self.now.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_ms(), 1_000);

        clock.advance(250);
        assert_eq!(clock.now_ms(), 1_250);

        clock.set(10);
        assert_eq!(clock.now_ms(), 10);
    }

    #[test]
    fn test_system_clock_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now_ms() > 1_577_836_800_000);
    }
}
