//! Sliding-window rate limiter for external process invocations.
//!
//! Shared by all concurrently-running tasks: no more than `calls_per_minute`
//! admissions complete within any rolling `window_secs` interval, regardless
//! of caller concurrency. The admission check-and-append is atomic under an
//! internal mutex; the lock is never held across a sleep, and a woken caller
//! always re-checks from scratch rather than trusting stale state.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, TaskqError};

/// Injectable time source, in seconds since an arbitrary fixed origin.
///
/// Production uses a monotonic clock; tests can substitute a manual one.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> f64;
}

/// Monotonic clock anchored at construction.
///
/// Built on `tokio::time::Instant` so paused-clock tests see virtual time.
#[derive(Debug)]
pub struct MonotonicClock {
    origin: tokio::time::Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Rate limiter configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    /// Maximum admissions per window.
    pub calls_per_minute: u32,
    /// Window length in seconds.
    pub window_secs: f64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            calls_per_minute: 15,
            window_secs: 60.0,
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("calls_per_minute", &self.calls_per_minute)
            .field("window_secs", &self.window_secs)
            .finish_non_exhaustive()
    }
}

/// Sliding-window rate limiter.
pub struct RateLimiter {
    calls_per_minute: usize,
    window_secs: f64,
    /// Timestamps of admitted calls, non-decreasing. Expired entries are a
    /// prefix and are trimmed on every touch.
    calls: Mutex<VecDeque<f64>>,
    clock: Box<dyn TimeSource>,
}

impl RateLimiter {
    /// Create a rate limiter with the default monotonic clock.
    ///
    /// Rejects non-positive `calls_per_minute` or `window_secs`. This is the
    /// one place the limiter fails fast instead of degrading.
    pub fn new(config: RateLimiterConfig) -> Result<Self> {
        Self::with_time_source(config, Box::new(MonotonicClock::new()))
    }

    /// Create a rate limiter with a custom time source.
    pub fn with_time_source(config: RateLimiterConfig, clock: Box<dyn TimeSource>) -> Result<Self> {
        if config.calls_per_minute == 0 {
            return Err(TaskqError::Config(
                "calls_per_minute must be a positive integer".to_string(),
            ));
        }
        if !(config.window_secs > 0.0) || !config.window_secs.is_finite() {
            return Err(TaskqError::Config("window_secs must be a positive number".to_string()));
        }

        Ok(Self {
            calls_per_minute: config.calls_per_minute as usize,
            window_secs: config.window_secs,
            calls: Mutex::new(VecDeque::new()),
            clock,
        })
    }

    /// Acquire permission for one external call, waiting if the window is full.
    ///
    /// Explicit prune -> check -> maybe wait -> re-check loop. The re-check
    /// after waking matters: other callers may have advanced the window in
    /// the meantime.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut calls = self.calls.lock().unwrap();
                let now = self.clock.now();

                while calls.front().is_some_and(|&t| now - t >= self.window_secs) {
                    calls.pop_front();
                }

                if calls.len() >= self.calls_per_minute {
                    let wait_secs = self.window_secs - (now - calls[0]);
                    if wait_secs > 0.0 {
                        Some(Duration::from_secs_f64(wait_secs))
                    } else {
                        // Oldest entry expires exactly now; re-prune and retry.
                        None
                    }
                } else {
                    calls.push_back(now);
                    return;
                }
            };

            if let Some(duration) = wait {
                tracing::debug!(wait_secs = duration.as_secs_f64(), "Rate limit window full, waiting");
                tokio::time::sleep(duration).await;
            }
        }
    }

    /// Number of admissions still available in the current window.
    ///
    /// Prunes expired timestamps as a side effect.
    pub fn remaining_calls(&self) -> usize {
        let mut calls = self.calls.lock().unwrap();
        let now = self.clock.now();

        while calls.front().is_some_and(|&t| now - t >= self.window_secs) {
            calls.pop_front();
        }

        self.calls_per_minute.saturating_sub(calls.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Manually advanced time source for deterministic admission tests.
    #[derive(Clone)]
    struct ManualClock(Arc<Mutex<f64>>);

    impl ManualClock {
        fn new() -> Self {
            Self(Arc::new(Mutex::new(0.0)))
        }

        fn advance(&self, secs: f64) {
            *self.0.lock().unwrap() += secs;
        }
    }

    impl TimeSource for ManualClock {
        fn now(&self) -> f64 {
            *self.0.lock().unwrap()
        }
    }

    fn manual_limiter(calls_per_minute: u32, window_secs: f64) -> (RateLimiter, ManualClock) {
        let clock = ManualClock::new();
        let config = RateLimiterConfig {
            calls_per_minute,
            window_secs,
        };
        let limiter = RateLimiter::with_time_source(config, Box::new(clock.clone())).unwrap();
        (limiter, clock)
    }

    #[test]
    fn test_config_defaults() {
        let config = RateLimiterConfig::default();
        assert_eq!(config.calls_per_minute, 15);
        assert_eq!(config.window_secs, 60.0);
    }

    #[test]
    fn test_rejects_zero_calls_per_minute() {
        let config = RateLimiterConfig {
            calls_per_minute: 0,
            window_secs: 60.0,
        };
        let err = RateLimiter::new(config).unwrap_err();
        assert!(matches!(err, TaskqError::Config(_)));
    }

    #[test]
    fn test_rejects_non_positive_window() {
        for window_secs in [0.0, -1.0, f64::NAN] {
            let config = RateLimiterConfig {
                calls_per_minute: 5,
                window_secs,
            };
            assert!(RateLimiter::new(config).is_err(), "window_secs={window_secs}");
        }
    }

    #[tokio::test]
    async fn test_remaining_calls_counts_down() {
        let (limiter, _clock) = manual_limiter(5, 1.0);
        assert_eq!(limiter.remaining_calls(), 5);

        limiter.acquire().await;
        assert_eq!(limiter.remaining_calls(), 4);

        limiter.acquire().await;
        assert_eq!(limiter.remaining_calls(), 3);
    }

    #[tokio::test]
    async fn test_remaining_calls_recovers_after_window() {
        let (limiter, clock) = manual_limiter(5, 1.0);
        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(limiter.remaining_calls(), 3);

        clock.advance(1.1);
        assert_eq!(limiter.remaining_calls(), 5);
    }

    #[tokio::test]
    async fn test_acquire_admits_after_window_slides() {
        let (limiter, clock) = manual_limiter(2, 1.0);
        limiter.acquire().await;
        clock.advance(0.6);
        limiter.acquire().await;
        assert_eq!(limiter.remaining_calls(), 0);

        // First entry expires, freeing one slot; this must not sleep.
        clock.advance(0.5);
        limiter.acquire().await;
        assert_eq!(limiter.remaining_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_within_limit_is_immediate() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            calls_per_minute: 10,
            window_secs: 1.0,
        })
        .unwrap();

        let start = tokio::time::Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_third_acquire_waits_one_window() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            calls_per_minute: 2,
            window_secs: 1.0,
        })
        .unwrap();

        let start = tokio::time::Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_secs(1), "elapsed={elapsed:?}");
        assert!(elapsed < Duration::from_millis(1500), "elapsed={elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_window_ever_over_admits() {
        let limiter = Arc::new(
            RateLimiter::new(RateLimiterConfig {
                calls_per_minute: 3,
                window_secs: 1.0,
            })
            .unwrap(),
        );

        let mut handles = Vec::new();
        for _ in 0..10 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
                tokio::time::Instant::now()
            }));
        }

        let mut admissions = Vec::new();
        for handle in handles {
            admissions.push(handle.await.unwrap());
        }
        admissions.sort();

        // Any 4 consecutive admissions must span at least one full window.
        for pair in admissions.windows(4) {
            let span = pair[3] - pair[0];
            assert!(span >= Duration::from_secs(1), "span={span:?}");
        }
    }
}
