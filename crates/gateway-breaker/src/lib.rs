// gateway-breaker: a small circuit breaker guarding the model-backend call.
//
// Closed -> Open after `fail_max` consecutive failures.
// Open -> HalfOpen once `reset_timeout` has elapsed; the next caller probes.
// HalfOpen success -> Closed (failure count reset). HalfOpen failure -> Open.

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
enum Status {
    Closed,
    Open(Instant),
    HalfOpen,
}

struct Inner {
    status: Status,
    consecutive_failures: u32,
}

/// Error returned by `CircuitBreaker::call`: either the breaker was open and
/// the wrapped call never ran, or the call ran and failed.
#[derive(Debug)]
pub enum BreakerError<E> {
    Open,
    Inner(E),
}

impl<E: std::fmt::Display> std::fmt::Display for BreakerError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakerError::Open => write!(f, "circuit breaker is open"),
            BreakerError::Inner(e) => write!(f, "{e}"),
        }
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for BreakerError<E> {}

pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    fail_max: u32,
    reset_timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(fail_max: u32, reset_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                status: Status::Closed,
                consecutive_failures: 0,
            }),
            fail_max,
            reset_timeout,
        }
    }

    #[must_use]
    pub fn state(&self) -> BreakerState {
        match self.inner.lock().unwrap().status {
            Status::Closed => BreakerState::Closed,
            Status::Open(_) => BreakerState::Open,
            Status::HalfOpen => BreakerState::HalfOpen,
        }
    }

    /// Run `f` under the breaker. Returns `BreakerError::Open` without
    /// calling `f` if the breaker is open (or already probing in
    /// half-open). Only one probe runs at a time: concurrent callers that
    /// observe `HalfOpen` are rejected immediately rather than piling onto
    /// the probe.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let is_probe = {
            let mut inner = self.inner.lock().unwrap();
            match inner.status {
                Status::Closed => false,
                Status::HalfOpen => return Err(BreakerError::Open),
                Status::Open(opened_at) => {
                    if opened_at.elapsed() >= self.reset_timeout {
                        inner.status = Status::HalfOpen;
                        true
                    } else {
                        return Err(BreakerError::Open);
                    }
                }
            }
        };

        match f().await {
            Ok(value) => {
                let mut inner = self.inner.lock().unwrap();
                if is_probe || inner.consecutive_failures > 0 {
                    tracing::info!("circuit breaker closed");
                }
                inner.status = Status::Closed;
                inner.consecutive_failures = 0;
                Ok(value)
            }
            Err(err) => {
                let mut inner = self.inner.lock().unwrap();
                if is_probe {
                    inner.status = Status::Open(Instant::now());
                    tracing::warn!("circuit breaker probe failed, reopening");
                } else {
                    inner.consecutive_failures += 1;
                    if inner.consecutive_failures >= self.fail_max {
                        inner.status = Status::Open(Instant::now());
                        tracing::warn!(
                            failures = inner.consecutive_failures,
                            "circuit breaker opened"
                        );
                    }
                }
                Err(BreakerError::Inner(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn opens_after_fail_max_consecutive_failures() {
        let breaker = CircuitBreaker::new(5, Duration::from_secs(30));
        for _ in 0..4 {
            let result = breaker.call(|| async { Err::<(), _>("boom") }).await;
            assert!(matches!(result, Err(BreakerError::Inner("boom"))));
            assert_eq!(breaker.state(), BreakerState::Closed);
        }
        let result = breaker.call(|| async { Err::<(), _>("boom") }).await;
        assert!(matches!(result, Err(BreakerError::Inner("boom"))));
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn open_breaker_fails_fast_without_calling_inner() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(30));
        let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        assert_eq!(breaker.state(), BreakerState::Open);

        let calls = AtomicU32::new(0);
        let result = breaker
            .call(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, &str>(()) }
            })
            .await;
        assert!(matches!(result, Err(BreakerError::Open)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_probe_success_closes_and_resets_failures() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(30));
        let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        assert_eq!(breaker.state(), BreakerState::Open);

        tokio::time::advance(Duration::from_secs(31)).await;

        let result = breaker.call(|| async { Ok::<_, &str>(42) }).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(breaker.state(), BreakerState::Closed);

        // Failures reset: a single subsequent failure must not reopen it.
        let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_probe_failure_reopens_immediately() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(30));
        let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        tokio::time::advance(Duration::from_secs(31)).await;

        let result = breaker.call(|| async { Err::<(), _>("boom again") }).await;
        assert!(matches!(result, Err(BreakerError::Inner("boom again"))));
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn successful_calls_never_trip_the_breaker() {
        let breaker = CircuitBreaker::new(5, Duration::from_secs(30));
        for _ in 0..20 {
            let result = breaker.call(|| async { Ok::<_, &str>(()) }).await;
            assert!(result.is_ok());
        }
        assert_eq!(breaker.state(), BreakerState::Closed);
    }
}
