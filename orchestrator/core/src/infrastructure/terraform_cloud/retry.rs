// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Retry policy for the Terraform Cloud transport.
//!
//! ```text
//! Attempt    Delay (base=100ms)    With jitter (±10%)
//! ─────────────────────────────────────────────────
//!    1            100ms              90ms - 110ms
//!    2            200ms             180ms - 220ms
//!    3            400ms             360ms - 440ms
//!   ...
//!   ≥7              5s                capped
//! ```

use rand::Rng;
use reqwest::{Method, StatusCode};
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_JITTER_FACTOR: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

impl RetryPolicy {
    /// Same attempt budget, no sleeping. Used by tests against a local server.
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter_factor: 0.0,
            ..Self::default()
        }
    }

    pub fn can_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before the attempt following `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let base = self.base_delay.saturating_mul(1u32 << exponent).min(self.max_delay);
        if self.jitter_factor <= 0.0 || base.is_zero() {
            return base;
        }

        let jitter = {
            let mut rng = rand::thread_rng();
            rng.gen_range(-self.jitter_factor..=self.jitter_factor)
        };
        base.mul_f64(1.0 + jitter)
    }
}

/// Server errors and throttling are retried; other statuses are final.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// A timed-out request may already have been applied, so only methods that
/// can be repeated are retried after a timeout. `POST` creates resources.
pub fn retries_timeout(method: &Method) -> bool {
    *method != Method::POST
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy {
            jitter_factor: 0.0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(4), Duration::from_millis(800));
        assert_eq!(policy.delay(9), Duration::from_secs(5));
        assert_eq!(policy.delay(40), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let delay = policy.delay(3);
            assert!(delay >= Duration::from_millis(359) && delay <= Duration::from_millis(441));
        }
    }

    #[test]
    fn test_attempt_budget() {
        let policy = RetryPolicy::default();
        assert!(policy.can_retry(9));
        assert!(!policy.can_retry(10));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(StatusCode::UNPROCESSABLE_ENTITY));
    }

    #[test]
    fn test_timeouts_retried_only_for_repeatable_methods() {
        assert!(retries_timeout(&Method::GET));
        assert!(retries_timeout(&Method::PATCH));
        assert!(retries_timeout(&Method::PUT));
        assert!(retries_timeout(&Method::DELETE));
        assert!(!retries_timeout(&Method::POST));
    }
}
