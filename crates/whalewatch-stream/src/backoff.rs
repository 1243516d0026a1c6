//! Reconnect backoff policy.
//!
//! Pure mapping from attempt count to delay: exponential growth capped at a
//! ceiling, plus uniform random jitter so a fleet of streams does not
//! thundering-herd a recovering endpoint.

use rand::Rng;
use std::time::Duration;

/// Exponential backoff with cap and jitter.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    base: Duration,
    max: Duration,
    jitter_factor: f64,
}

impl BackoffPolicy {
    pub fn new(base: Duration, max: Duration, jitter_factor: f64) -> Self {
        Self {
            base,
            max,
            jitter_factor: jitter_factor.max(0.0),
        }
    }

    /// Pre-jitter delay for an attempt: `min(base * 2^attempt, max)`.
    ///
    /// Attempt 0 yields the base delay. Monotone non-decreasing in the
    /// attempt number, which is what the jittered `delay` builds on.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        // 2^attempt saturates well past any realistic cap
        let factor = 1u64.checked_shl(attempt.min(32)).unwrap_or(u64::MAX);
        let ms = base_ms.saturating_mul(factor).min(max_ms);
        Duration::from_millis(ms)
    }

    /// Jittered delay: `base_delay` plus uniform random jitter in
    /// `[0, base_delay * jitter_factor]`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter_factor == 0.0 {
            return base;
        }
        let span = base.as_millis() as f64 * self.jitter_factor;
        let jitter = rand::thread_rng().gen_range(0.0..=span.max(f64::MIN_POSITIVE));
        base + Duration::from_millis(jitter as u64)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(300), 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BackoffPolicy {
        BackoffPolicy::new(Duration::from_millis(100), Duration::from_secs(60), 0.0)
    }

    #[test]
    fn test_base_delay_sequence() {
        let p = policy();
        assert_eq!(p.base_delay(0), Duration::from_millis(100));
        assert_eq!(p.base_delay(1), Duration::from_millis(200));
        assert_eq!(p.base_delay(2), Duration::from_millis(400));
        assert_eq!(p.base_delay(3), Duration::from_millis(800));
    }

    #[test]
    fn test_monotone_until_cap() {
        let p = policy();
        for attempt in 0..40 {
            assert!(p.base_delay(attempt) <= p.base_delay(attempt + 1));
        }
    }

    #[test]
    fn test_cap() {
        let p = policy();
        assert_eq!(p.base_delay(63), Duration::from_secs(60));
        assert_eq!(p.base_delay(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_zero_jitter_is_deterministic() {
        let p = policy();
        assert_eq!(p.delay(4), p.base_delay(4));
    }

    #[test]
    fn test_jitter_bounds() {
        let p = BackoffPolicy::new(Duration::from_millis(100), Duration::from_secs(60), 0.5);
        for _ in 0..100 {
            let d = p.delay(2); // base 400ms, jitter up to 200ms
            assert!(d >= Duration::from_millis(400));
            assert!(d <= Duration::from_millis(600));
        }
    }
}
