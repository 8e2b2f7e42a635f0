//! Login rate limiting
//!
//! Per-email failure counters with a rolling lockout window. Counters are
//! volatile: a process restart clears them, which matches the platform's
//! original behavior of keeping attempt state out of the vault.
//!
//! The window rolls from the most recent failure. Elapsed time alone never
//! resets the counter, so one more failure after the window expires locks
//! the account again immediately. Only a successful login clears the count.

use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Failure state for one email
#[derive(Debug, Clone, Copy)]
struct AttemptCounter {
    failure_count: u32,
    last_attempt_at: Instant,
}

/// Outcome of consulting the limiter before an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Open,
    Locked { retry_after: Duration },
}

impl Gate {
    pub fn is_locked(&self) -> bool {
        matches!(self, Gate::Locked { .. })
    }
}

/// In-memory login throttle
pub struct LoginRateLimiter {
    threshold: u32,
    window: Duration,
    counters: DashMap<String, AttemptCounter>,
}

impl LoginRateLimiter {
    pub fn new(threshold: u32, window: Duration) -> Self {
        Self {
            threshold,
            window,
            counters: DashMap::new(),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Check whether an attempt for this email may proceed
    pub fn check(&self, email: &str) -> Gate {
        self.check_at(email, Instant::now())
    }

    /// Clock-injected variant of [`check`](Self::check)
    pub fn check_at(&self, email: &str, now: Instant) -> Gate {
        let key = normalize(email);
        if let Some(counter) = self.counters.get(&key) {
            if counter.failure_count >= self.threshold {
                let elapsed = now.saturating_duration_since(counter.last_attempt_at);
                if elapsed < self.window {
                    return Gate::Locked {
                        retry_after: self.window - elapsed,
                    };
                }
            }
        }
        Gate::Open
    }

    /// Record a failed attempt and return the updated failure count
    pub fn record_failure(&self, email: &str) -> u32 {
        self.record_failure_at(email, Instant::now())
    }

    /// Clock-injected variant of [`record_failure`](Self::record_failure)
    pub fn record_failure_at(&self, email: &str, now: Instant) -> u32 {
        let key = normalize(email);
        let mut entry = self.counters.entry(key).or_insert(AttemptCounter {
            failure_count: 0,
            last_attempt_at: now,
        });
        entry.failure_count += 1;
        entry.last_attempt_at = now;
        entry.failure_count
    }

    /// Reset after a successful login. Nothing else clears the counter.
    pub fn reset(&self, email: &str) {
        self.counters.insert(
            normalize(email),
            AttemptCounter {
                failure_count: 0,
                last_attempt_at: Instant::now(),
            },
        );
    }

    /// Current failure count for an email
    pub fn failure_count(&self, email: &str) -> u32 {
        self.counters
            .get(&normalize(email))
            .map(|c| c.failure_count)
            .unwrap_or(0)
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}
