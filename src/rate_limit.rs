use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::debug;

use crate::clock::Clock;
use crate::metrics::RATE_LIMITER_KEYS;

// How often the opportunistic sweep may run (5 minutes)
pub const SWEEP_INTERVAL_MS: i64 = 300_000;

// Sliding window entry - timestamps (ms) of admitted calls for one key
pub struct WindowEntry {
    pub timestamps: VecDeque<i64>,
    pub window_ms: i64,
}

impl WindowEntry {
    fn prune(&mut self, now: i64) {
        let cutoff = now - self.window_ms;
        while self.timestamps.front().is_some_and(|&t| t <= cutoff) {
            self.timestamps.pop_front();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_ms: i64,
}

// Per-key sliding window rate limiter; empty keys are dropped
pub struct RateLimiter {
    store: DashMap<String, WindowEntry>,
    last_sweep: AtomicI64,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_ms();
        Self {
            store: DashMap::new(),
            last_sweep: AtomicI64::new(now),
            clock,
        }
    }

    pub fn admit(&self, key: &str, window_ms: i64, max: u32) -> RateLimitResult {
        let now = self.clock.now_ms();
        self.maybe_sweep(now);

        // the entry guard holds the shard lock, so filter-compare-append is atomic per key
        let mut entry = self
            .store
            .entry(key.to_string())
            .or_insert_with(|| WindowEntry {
                timestamps: VecDeque::new(),
                window_ms,
            });
        entry.window_ms = window_ms;
        entry.prune(now);

        let count = entry.timestamps.len();
        if count >= max as usize {
            let reset_ms = entry
                .timestamps
                .front()
                .map(|&oldest| oldest + window_ms - now)
                .unwrap_or(window_ms);
            let empty = entry.timestamps.is_empty();
            drop(entry);
            if empty {
                self.store.remove_if(key, |_, e| e.timestamps.is_empty());
            }
            return RateLimitResult {
                allowed: false,
                remaining: 0,
                reset_ms,
            };
        }

        entry.timestamps.push_back(now);
        RateLimitResult {
            allowed: true,
            remaining: max - entry.timestamps.len() as u32,
            reset_ms: window_ms,
        }
    }

    // Prune every key against its own window, at most once per interval
    fn maybe_sweep(&self, now: i64) {
        let last = self.last_sweep.load(Ordering::Relaxed);
        if now - last < SWEEP_INTERVAL_MS {
            return;
        }
        // only one caller wins the sweep
        if self
            .last_sweep
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        let before = self.store.len();
        self.store.retain(|_, entry| {
            entry.prune(now);
            !entry.timestamps.is_empty()
        });
        let after = self.store.len();
        RATE_LIMITER_KEYS.set(after as f64);
        debug!(before, after, "rate limiter sweep");
    }

    #[cfg(test)]
    pub fn key_count(&self) -> usize {
        self.store.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const START: i64 = 1_700_000_000_000;

    fn limiter() -> (Arc<ManualClock>, RateLimiter) {
        let clock = Arc::new(ManualClock::new(START));
        let limiter = RateLimiter::new(clock.clone());
        (clock, limiter)
    }

    #[test]
    fn admits_up_to_max_then_rejects() {
        let (_, rl) = limiter();

        for expected in [2, 1, 0] {
            let r = rl.admit("analyze:1.2.3.4", 60_000, 3);
            assert!(r.allowed);
            assert_eq!(r.remaining, expected);
        }

        let r = rl.admit("analyze:1.2.3.4", 60_000, 3);
        assert!(!r.allowed);
        assert_eq!(r.remaining, 0);
        assert_eq!(r.reset_ms, 60_000);
    }

    #[test]
    fn window_slides_instead_of_resetting() {
        let (clock, rl) = limiter();

        assert!(rl.admit("k", 60_000, 2).allowed);
        clock.advance(30_000);
        assert!(rl.admit("k", 60_000, 2).allowed);
        clock.advance(10_000);

        let r = rl.admit("k", 60_000, 2);
        assert!(!r.allowed);
        // oldest call expires 20s from now
        assert_eq!(r.reset_ms, 20_000);

        clock.advance(20_000);
        let r = rl.admit("k", 60_000, 2);
        assert!(r.allowed);
        assert_eq!(r.remaining, 0);

        // second call (t=30s) is still inside the window
        assert!(!rl.admit("k", 60_000, 2).allowed);
    }

    #[test]
    fn same_millisecond_calls_count_individually() {
        let (_, rl) = limiter();
        assert!(rl.admit("k", 1_000, 2).allowed);
        assert!(rl.admit("k", 1_000, 2).allowed);
        assert!(!rl.admit("k", 1_000, 2).allowed);
    }

    #[test]
    fn keys_are_independent() {
        let (_, rl) = limiter();
        assert!(rl.admit("analyze:a", 60_000, 1).allowed);
        assert!(!rl.admit("analyze:a", 60_000, 1).allowed);
        assert!(rl.admit("analyze:b", 60_000, 1).allowed);
        assert!(rl.admit("translate:a", 60_000, 1).allowed);
    }

    #[test]
    fn zero_max_rejects_without_keeping_an_entry() {
        let (_, rl) = limiter();
        let r = rl.admit("k", 60_000, 0);
        assert!(!r.allowed);
        assert_eq!(r.remaining, 0);
        assert_eq!(rl.key_count(), 0);
    }

    #[test]
    fn sweep_drops_expired_keys_using_their_own_window() {
        let (clock, rl) = limiter();
        rl.admit("short", 1_000, 5);
        rl.admit("long", 600_000, 5);
        assert_eq!(rl.key_count(), 2);

        // no sweep before the interval has passed
        clock.advance(SWEEP_INTERVAL_MS - 1);
        rl.admit("other", 1_000, 5);
        assert_eq!(rl.key_count(), 3);

        clock.advance(2_000);
        rl.admit("fresh", 1_000, 5);
        // "short" and "other" expired, "long" still inside its 10 minute window
        assert_eq!(rl.key_count(), 2);
        assert!(!rl.store.contains_key("short"));
        assert!(rl.store.contains_key("long"));
    }

    #[test]
    fn concurrent_callers_on_one_key_get_exactly_max_admissions() {
        let (_, rl) = limiter();
        let admitted = std::sync::atomic::AtomicU32::new(0);

        std::thread::scope(|scope| {
            for _ in 0..16 {
                scope.spawn(|| {
                    for _ in 0..500 {
                        if rl.admit("analyze:shared", 600_000, 100).allowed {
                            admitted.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        assert_eq!(admitted.load(Ordering::Relaxed), 100);
        assert_eq!(rl.store.get("analyze:shared").unwrap().timestamps.len(), 100);
    }
}
