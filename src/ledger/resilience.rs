use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};

use crate::models::{ProgressionError, Result};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,    // Normal operation
    Open,      // Failing, don't try
    HalfOpen,  // Testing if the ledger recovered
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub open_duration: Duration,
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_duration: Duration::from_secs(30),
            half_open_max_calls: 2,
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<Instant>,
    half_open_calls: u32,
}

/// Stops hammering a ledger endpoint that keeps failing.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<BreakerState>,
    config: CircuitBreakerConfig,
    name: String,
}

impl CircuitBreaker {
    pub fn new(name: String, config: CircuitBreakerConfig) -> Self {
        Self {
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                opened_at: None,
                half_open_calls: 0,
            }),
            config,
            name,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit or refuse one call, moving OPEN to HALF_OPEN once the open
    /// window has passed.
    pub fn try_acquire(&self) -> Result<()> {
        let mut s = self.lock();

        if s.state == CircuitState::Open {
            let elapsed = s.opened_at.map(|t| t.elapsed()).unwrap_or_default();
            if elapsed < self.config.open_duration {
                return Err(ProgressionError::CircuitBreakerOpen(format!(
                    "Circuit breaker {} is open",
                    self.name
                )));
            }
            s.state = CircuitState::HalfOpen;
            s.success_count = 0;
            s.half_open_calls = 0;
            info!("Circuit breaker {} transitioned to HALF_OPEN", self.name);
        }

        if s.state == CircuitState::HalfOpen {
            if s.half_open_calls >= self.config.half_open_max_calls {
                return Err(ProgressionError::CircuitBreakerOpen(format!(
                    "Circuit breaker {} half-open limit reached",
                    self.name
                )));
            }
            s.half_open_calls += 1;
        }

        Ok(())
    }

    pub fn on_success(&self) {
        let mut s = self.lock();
        match s.state {
            CircuitState::Closed => {
                s.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                s.success_count += 1;
                if s.success_count >= self.config.success_threshold {
                    s.state = CircuitState::Closed;
                    s.failure_count = 0;
                    s.success_count = 0;
                    s.half_open_calls = 0;
                    info!("Circuit breaker {} transitioned to CLOSED", self.name);
                }
            }
            CircuitState::Open => {
                warn!("Success recorded while circuit breaker {} is OPEN", self.name);
            }
        }
    }

    pub fn on_failure(&self) {
        let mut s = self.lock();
        match s.state {
            CircuitState::Closed => {
                s.failure_count += 1;
                if s.failure_count >= self.config.failure_threshold {
                    Self::open(&mut s);
                    error!(
                        "Circuit breaker {} transitioned to OPEN after {} failures",
                        self.name, self.config.failure_threshold
                    );
                }
            }
            CircuitState::HalfOpen => {
                Self::open(&mut s);
                warn!("Circuit breaker {} transitioned back to OPEN from HALF_OPEN", self.name);
            }
            CircuitState::Open => {
                s.opened_at = Some(Instant::now());
            }
        }
    }

    fn open(s: &mut BreakerState) {
        s.state = CircuitState::Open;
        s.opened_at = Some(Instant::now());
        s.success_count = 0;
        s.half_open_calls = 0;
    }

    /// Get current circuit breaker state for monitoring
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }
}

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
        }
    }
}

/// Retry with exponential backoff
pub async fn retry_with_backoff<F, T, Fut, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    info!("Operation {} succeeded on attempt {}", operation_name, attempt);
                }
                return Ok(result);
            }
            Err(e) => {
                warn!("Operation {} failed on attempt {}: {}", operation_name, attempt, e);

                if attempt >= attempts {
                    error!("Operation {} failed after {} attempts", operation_name, attempts);
                    return Err(e);
                }

                sleep(calculate_delay(config, attempt)).await;
                attempt += 1;
            }
        }
    }
}

fn calculate_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let delay_ms = config.base_delay.as_millis() as f64
        * config.backoff_multiplier.powi((attempt - 1) as i32);

    let delay = Duration::from_millis(delay_ms as u64);

    if delay > config.max_delay {
        config.max_delay
    } else {
        delay
    }
}

/// Circuit breaker + per-attempt timeout + retry around one ledger seam.
#[derive(Debug)]
pub struct ResilientCaller {
    circuit_breaker: CircuitBreaker,
    retry_config: RetryConfig,
    call_timeout: Duration,
    name: String,
}

impl ResilientCaller {
    pub fn new(
        name: String,
        circuit_config: CircuitBreakerConfig,
        retry_config: RetryConfig,
        call_timeout: Duration,
    ) -> Self {
        let circuit_breaker = CircuitBreaker::new(format!("{}_circuit", name), circuit_config);

        Self {
            circuit_breaker,
            retry_config,
            call_timeout,
            name,
        }
    }

    pub async fn call<F, T, Fut>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.circuit_breaker.try_acquire()?;

        let result = retry_with_backoff(&self.retry_config, &self.name, || {
            let attempt = operation();
            let call_timeout = self.call_timeout;
            let source_name = self.name.clone();
            async move {
                match timeout(call_timeout, attempt).await {
                    Ok(result) => result,
                    Err(_) => Err(ProgressionError::LedgerTimeout { source_name }),
                }
            }
        })
        .await;

        match &result {
            Ok(_) => self.circuit_breaker.on_success(),
            Err(_) => self.circuit_breaker.on_failure(),
        }

        result
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    pub fn failure_count(&self) -> u32 {
        self.circuit_breaker.failure_count()
    }
}
