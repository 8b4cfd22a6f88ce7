//! Fail-fast guard around a remote data source.
//!
//! After `failure_threshold` consecutive failures every call is rejected
//! until `cooldown` has passed; the next call is then let through as a probe
//! and `success_threshold` consecutive successes close the breaker again.

use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
enum Phase {
    Closed { failures: usize },
    Open { since: Instant },
    HalfOpen { successes: usize },
}

pub struct CircuitBreaker {
    name: String,
    phase: Mutex<Phase>,
    failure_threshold: usize,
    success_threshold: usize,
    cooldown: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("Circuit breaker is open: {0}")]
    Open(String),

    #[error(transparent)]
    Inner(E),
}

impl CircuitBreaker {
    pub fn new(
        name: impl Into<String>,
        failure_threshold: usize,
        success_threshold: usize,
        cooldown: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            phase: Mutex::new(Phase::Closed { failures: 0 }),
            failure_threshold: failure_threshold.max(1),
            success_threshold: success_threshold.max(1),
            cooldown,
        }
    }

    pub async fn call<F, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        self.call_counting(f, |_| true).await
    }

    /// Like `call`, but only errors for which `trips` returns true count
    /// towards opening the breaker. Other errors leave its state untouched.
    pub async fn call_counting<F, T, E, P>(
        &self,
        f: F,
        trips: P,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        self.admit::<E>().await?;
        match f.await {
            Ok(value) => {
                self.record_success().await;
                Ok(value)
            }
            Err(e) => {
                if trips(&e) {
                    self.record_failure().await;
                }
                Err(CircuitBreakerError::Inner(e))
            }
        }
    }

    pub async fn state(&self) -> CircuitState {
        match *self.phase.lock().await {
            Phase::Closed { .. } => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    async fn admit<E>(&self) -> Result<(), CircuitBreakerError<E>> {
        let mut phase = self.phase.lock().await;
        if let Phase::Open { since } = *phase {
            let elapsed = since.elapsed();
            if elapsed < self.cooldown {
                return Err(CircuitBreakerError::Open(format!(
                    "[{}] rejecting calls for another {:?}",
                    self.name,
                    self.cooldown - elapsed
                )));
            }
            info!("CircuitBreaker [{}]: cooldown over, probing", self.name);
            *phase = Phase::HalfOpen { successes: 0 };
        }
        Ok(())
    }

    async fn record_success(&self) {
        let mut phase = self.phase.lock().await;
        match *phase {
            Phase::Closed { .. } => *phase = Phase::Closed { failures: 0 },
            Phase::HalfOpen { successes } => {
                let successes = successes + 1;
                if successes >= self.success_threshold {
                    info!("CircuitBreaker [{}]: closed after {} successes", self.name, successes);
                    *phase = Phase::Closed { failures: 0 };
                } else {
                    *phase = Phase::HalfOpen { successes };
                }
            }
            Phase::Open { .. } => {}
        }
    }

    async fn record_failure(&self) {
        let mut phase = self.phase.lock().await;
        match *phase {
            Phase::Closed { failures } => {
                let failures = failures + 1;
                if failures >= self.failure_threshold {
                    error!(
                        "CircuitBreaker [{}]: opened after {} consecutive failures",
                        self.name, failures
                    );
                    *phase = Phase::Open {
                        since: Instant::now(),
                    };
                } else {
                    *phase = Phase::Closed { failures };
                }
            }
            Phase::HalfOpen { .. } => {
                warn!("CircuitBreaker [{}]: probe failed, reopening", self.name);
                *phase = Phase::Open {
                    since: Instant::now(),
                };
            }
            Phase::Open { .. } => {
                *phase = Phase::Open {
                    since: Instant::now(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn fail(cb: &CircuitBreaker) {
        let _ = cb.call(async { Err::<(), &str>("HTTP 503") }).await;
    }

    #[tokio::test]
    async fn test_opens_and_fails_fast() {
        let cb = CircuitBreaker::new("klines", 3, 1, Duration::from_secs(60));
        for _ in 0..3 {
            fail(&cb).await;
        }
        assert_eq!(cb.state().await, CircuitState::Open);

        let result = cb.call(async { Ok::<u32, &str>(1) }).await;
        assert!(matches!(result, Err(CircuitBreakerError::Open(_))));
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let cb = CircuitBreaker::new("klines", 2, 1, Duration::from_secs(60));
        fail(&cb).await;
        assert!(cb.call(async { Ok::<(), &str>(()) }).await.is_ok());
        fail(&cb).await;
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_non_tripping_errors_leave_breaker_closed() {
        let cb = CircuitBreaker::new("klines", 2, 1, Duration::from_secs(60));
        let is_server_error = |e: &&str| e.starts_with("HTTP 5");

        for _ in 0..5 {
            let result = cb
                .call_counting(async { Err::<(), &str>("HTTP 400") }, is_server_error)
                .await;
            assert!(matches!(result, Err(CircuitBreakerError::Inner("HTTP 400"))));
        }
        assert_eq!(cb.state().await, CircuitState::Closed);

        for _ in 0..2 {
            let _ = cb
                .call_counting(async { Err::<(), &str>("HTTP 503") }, is_server_error)
                .await;
        }
        assert_eq!(cb.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_probe_closes_or_reopens() {
        let cb = CircuitBreaker::new("klines", 1, 2, Duration::from_millis(50));
        fail(&cb).await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(cb.call(async { Ok::<(), &str>(()) }).await.is_ok());
        assert_eq!(cb.state().await, CircuitState::HalfOpen);
        assert!(cb.call(async { Ok::<(), &str>(()) }).await.is_ok());
        assert_eq!(cb.state().await, CircuitState::Closed);

        fail(&cb).await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        fail(&cb).await;
        assert_eq!(cb.state().await, CircuitState::Open);
    }
}
