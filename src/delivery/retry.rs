//! Exponential backoff with jitter.
//!
//! A [`RetryPolicy`] runs an operation until it succeeds, the classifier
//! says to stop, the elapsed-time budget runs out, or the cancellation
//! token fires. The operation is a factory producing a fresh future per
//! attempt; everything an attempt needs is passed in by value.

use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// What to do with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Back off and try again.
    Retry,
    /// Give up immediately and return the error.
    Abort,
}

/// Backoff parameters.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    /// Each delay is drawn from `interval * [1 - f, 1 + f]`.
    pub randomization_factor: f64,
    /// Total time budget. `None` retries until cancelled.
    pub max_elapsed: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(60),
            multiplier: 1.5,
            randomization_factor: 0.5,
            max_elapsed: Some(Duration::from_secs(10)),
        }
    }
}

impl RetryPolicy {
    /// Bounded policy used for sink writes.
    pub fn bounded(initial_interval: Duration, max_elapsed: Duration) -> Self {
        Self {
            initial_interval,
            max_elapsed: Some(max_elapsed),
            ..Self::default()
        }
    }

    /// Policy that never gives up on its own.
    pub fn unbounded(initial_interval: Duration, max_interval: Duration) -> Self {
        Self {
            initial_interval,
            max_interval,
            max_elapsed: None,
            ..Self::default()
        }
    }

    /// Run `op` under this policy.
    ///
    /// Returns the first success, or the last error once the classifier
    /// aborts, the budget is exhausted, or `cancel` fires during a backoff
    /// sleep. At least one attempt is always made.
    pub async fn run<T, E, F, Fut, C>(
        &self,
        cancel: &CancellationToken,
        mut op: F,
        classify: C,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> RetryDecision,
        E: Display,
    {
        let start = Instant::now();
        let mut interval = self.initial_interval;
        let mut attempt: u32 = 1;

        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if classify(&err) == RetryDecision::Abort {
                debug!(attempt, error = %err, "Attempt failed, not retryable");
                return Err(err);
            }

            let delay = self.jittered(interval);
            if let Some(budget) = self.max_elapsed
                && start.elapsed() + delay > budget
            {
                warn!(attempt, error = %err, "Retry budget exhausted");
                return Err(err);
            }

            warn!(
                attempt,
                error = %err,
                delay_ms = delay.as_millis() as u64,
                "Attempt failed, backing off"
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(attempt, "Retry cancelled");
                    return Err(err);
                }
                _ = tokio::time::sleep(delay) => {}
            }

            interval = self.next_interval(interval);
            attempt = attempt.saturating_add(1);
        }
    }

    fn next_interval(&self, current: Duration) -> Duration {
        current.mul_f64(self.multiplier).min(self.max_interval)
    }

    fn jittered(&self, interval: Duration) -> Duration {
        let factor = self.randomization_factor.clamp(0.0, 1.0);
        if factor == 0.0 {
            return interval;
        }
        let scale = rand::thread_rng().gen_range(1.0 - factor..=1.0 + factor);
        interval.mul_f64(scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_elapsed: Option<Duration>) -> RetryPolicy {
        RetryPolicy {
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(5),
            multiplier: 2.0,
            randomization_factor: 0.0,
            max_elapsed,
        }
    }

    fn counting(
        fail_times: u32,
    ) -> (
        Arc<AtomicU32>,
        impl FnMut() -> std::future::Ready<Result<u32, String>>,
    ) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let op = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(if n > fail_times {
                Ok(n)
            } else {
                Err(format!("failure {n}"))
            })
        };
        (calls, op)
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let (calls, op) = counting(3);
        let result = fast(Some(Duration::from_secs(5)))
            .run(&CancellationToken::new(), op, |_| RetryDecision::Retry)
            .await;
        assert_eq!(result, Ok(4));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn abort_stops_after_first_attempt() {
        let (calls, op) = counting(10);
        let result = fast(Some(Duration::from_secs(5)))
            .run(&CancellationToken::new(), op, |_| RetryDecision::Abort)
            .await;
        assert_eq!(result, Err("failure 1".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_when_budget_is_spent() {
        let (calls, op) = counting(u32::MAX);
        let result = fast(Some(Duration::from_millis(30)))
            .run(&CancellationToken::new(), op, |_| RetryDecision::Retry)
            .await;
        assert!(result.is_err());
        assert!(calls.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn cancellation_interrupts_backoff() {
        let (calls, op) = counting(u32::MAX);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = fast(None)
            .run(&cancel, op, |_| RetryDecision::Retry)
            .await;
        assert_eq!(result, Err("failure 1".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn interval_growth_is_capped() {
        let policy = fast(None);
        let mut interval = policy.initial_interval;
        for _ in 0..10 {
            interval = policy.next_interval(interval);
        }
        assert_eq!(interval, policy.max_interval);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy::default();
        let base = Duration::from_millis(100);
        for _ in 0..100 {
            let d = policy.jittered(base);
            assert!(d >= Duration::from_millis(50) && d <= Duration::from_millis(150));
        }
    }
}
