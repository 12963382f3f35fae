//! Generic circuit breaker guarding external calls (SMTP transport, LLM
//! diagnosis HTTP client) against cascade failures, mirroring
//! `workflow-engine-core::error::circuit_breaker`.

use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout: Duration,
    pub window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(60),
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitError<E> {
    #[error("circuit breaker is open")]
    Open,
    #[error(transparent)]
    Inner(E),
}

/// Guards a fallible async call: once `failure_threshold` failures land
/// within `window`, further calls fail fast with [`CircuitError::Open`]
/// until `timeout` elapses, at which point one probe is let through
/// (half-open); `success_threshold` consecutive successes close it again.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: Arc<RwLock<CircuitState>>,
    failure_count: AtomicU32,
    success_count: AtomicU32,
    last_failure_time: Mutex<Option<Instant>>,
    state_changed_at: Mutex<Instant>,
    total_calls: AtomicU64,
    total_failures: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(CircuitState::Closed)),
            failure_count: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            last_failure_time: Mutex::new(None),
            state_changed_at: Mutex::new(Instant::now()),
            total_calls: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
        }
    }

    pub async fn state(&self) -> CircuitState {
        let state = *self.state.read().await;
        if state == CircuitState::Open {
            let changed_at = *self.state_changed_at.lock().unwrap();
            if changed_at.elapsed() >= self.config.timeout {
                self.transition_to(CircuitState::HalfOpen).await;
                return CircuitState::HalfOpen;
            }
        }
        state
    }

    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        if self.state().await == CircuitState::Open {
            return Err(CircuitError::Open);
        }
        match f().await {
            Ok(v) => {
                self.on_success().await;
                Ok(v)
            }
            Err(e) => {
                self.on_failure().await;
                Err(CircuitError::Inner(e))
            }
        }
    }

    async fn on_success(&self) {
        match *self.state.read().await {
            CircuitState::HalfOpen => {
                let count = self.success_count.fetch_add(1, Ordering::SeqCst) + 1;
                if count >= self.config.success_threshold {
                    self.transition_to(CircuitState::Closed).await;
                }
            }
            CircuitState::Closed => self.failure_count.store(0, Ordering::SeqCst),
            CircuitState::Open => {}
        }
    }

    async fn on_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        match *self.state.read().await {
            CircuitState::HalfOpen => self.transition_to(CircuitState::Open).await,
            CircuitState::Closed => {
                let now = Instant::now();
                let should_increment = {
                    let mut last = self.last_failure_time.lock().unwrap();
                    match *last {
                        Some(prev) if now.duration_since(prev) > self.config.window => {
                            self.failure_count.store(1, Ordering::SeqCst);
                            *last = Some(now);
                            false
                        }
                        Some(_) => true,
                        None => {
                            *last = Some(now);
                            true
                        }
                    }
                };
                if should_increment {
                    let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
                    if count >= self.config.failure_threshold {
                        self.transition_to(CircuitState::Open).await;
                    }
                }
            }
            CircuitState::Open => {}
        }
    }

    async fn transition_to(&self, new_state: CircuitState) {
        let mut state = self.state.write().await;
        if *state == new_state {
            return;
        }
        let old_state = *state;
        *state = new_state;
        *self.state_changed_at.lock().unwrap() = Instant::now();
        match new_state {
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::SeqCst);
                self.success_count.store(0, Ordering::SeqCst);
            }
            CircuitState::HalfOpen => self.success_count.store(0, Ordering::SeqCst),
            CircuitState::Open => self.failure_count.store(0, Ordering::SeqCst),
        }
        tracing::info!(?old_state, ?new_state, "circuit breaker state changed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_failure_threshold_and_half_opens_after_timeout() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            success_threshold: 1,
            timeout: Duration::from_millis(50),
            window: Duration::from_secs(60),
        });

        let _ = cb.call(|| async { Err::<(), &str>("boom") }).await;
        assert_eq!(cb.state().await, CircuitState::Closed);
        let _ = cb.call(|| async { Err::<(), &str>("boom") }).await;
        assert_eq!(cb.state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cb.state().await, CircuitState::HalfOpen);

        let _ = cb.call(|| async { Ok::<_, &str>(()) }).await;
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn open_circuit_fails_fast() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            ..Default::default()
        });
        let _ = cb.call(|| async { Err::<(), &str>("boom") }).await;
        let result = cb.call(|| async { Ok::<_, &str>(42) }).await;
        assert!(matches!(result, Err(CircuitError::Open)));
    }
}
