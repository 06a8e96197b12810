//! # Respawn backoff.
//!
//! [`BackoffPolicy`] computes how long the supervisor waits before replacing a
//! worker that crashed. The delay for crash streak `n` is `first × factor^n`,
//! clamped to `max`, then jittered. The base never depends on a previous
//! jittered value, so delays cannot drift downwards over time.
//!
//! The default has `first = 0`: crashed workers are replaced immediately,
//! inside the exit handler.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use procvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(250),
//!     max: Duration::from_secs(5),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(250));
//! assert_eq!(backoff.next(2), Duration::from_secs(1));
//! assert_eq!(backoff.next(10), Duration::from_secs(5));
//! assert!(procvisor::BackoffPolicy::default().next(3).is_zero());
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Respawn delay policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay for the first crash of a streak (`0` = immediate replacement).
    pub first: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Multiplicative growth per consecutive crash (`>= 1.0` recommended).
    pub factor: f64,
    /// Randomization applied to the clamped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Immediate replacement: `first = 0`, `factor = 2.0`, `max = 30s`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::ZERO,
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Backoff that always waits `delay`.
    pub fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// True if every computed delay is zero.
    pub fn is_immediate(&self) -> bool {
        self.first.is_zero() || self.max.is_zero()
    }

    /// Delay before replacing a worker whose slot has crashed `streak` times in a row (0-indexed).
    pub fn next(&self, streak: u32) -> Duration {
        if self.is_immediate() {
            return Duration::ZERO;
        }

        let exp = streak.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);
        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };

        match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.first.min(self.max), base, self.max)
            }
            _ => self.jitter.apply(base),
        }
    }
}
