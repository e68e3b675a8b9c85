//! Rate-limited gateway in front of the chain node.
//!
//! Every RPC the scanner issues goes through [`Gateway::execute`], which
//! stacks the circuit breaker and the rate limiter in front of the call
//! and keeps rolling telemetry counters. `execute` fails fast; the
//! scanner's per-unit retry policy lives in [`Gateway::execute_with_retry`].

pub mod backoff;
pub mod circuit;
pub mod rate_limiter;

pub use backoff::ExponentialBackoff;
pub use circuit::{CircuitBreaker, CircuitState};
pub use rate_limiter::RateLimiter;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::rpc::RpcError;

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Rolling counters surfaced for health reporting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatewaySnapshot {
    pub allowed: u64,
    pub rate_limited: u64,
    pub circuit_rejected: u64,
    pub upstream_failures: u64,
    pub upstream_successes: u64,
    pub recent_minute_requests: usize,
    pub circuit_state: Option<&'static str>,
}

pub struct Gateway {
    limiter: Mutex<RateLimiter>,
    breaker: Mutex<CircuitBreaker>,
    retry_initial_delay_ms: u64,
    retry_max_delay_ms: u64,
    max_retries: u32,
    allowed: AtomicU64,
    rate_limited: AtomicU64,
    circuit_rejected: AtomicU64,
    upstream_failures: AtomicU64,
    upstream_successes: AtomicU64,
}

impl Gateway {
    pub fn new(config: &ScanConfig) -> Self {
        let now = now_ms();
        Self {
            limiter: Mutex::new(RateLimiter::new(
                config.min_request_spacing_ms,
                config.requests_per_second,
                config.requests_per_minute,
                config.requests_per_hour,
                config.burst_limit,
                now,
            )),
            breaker: Mutex::new(CircuitBreaker::new(
                config.circuit_failure_threshold,
                config.circuit_recovery_timeout_ms,
                config.circuit_probe_successes,
            )),
            retry_initial_delay_ms: config.retry_initial_delay_ms,
            retry_max_delay_ms: config.retry_max_delay_ms,
            max_retries: config.max_retries,
            allowed: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
            circuit_rejected: AtomicU64::new(0),
            upstream_failures: AtomicU64::new(0),
            upstream_successes: AtomicU64::new(0),
        }
    }

    /// Run one upstream call with fail-fast semantics: `CircuitOpen` or
    /// `RateLimited` without touching the node, otherwise the call's own
    /// outcome mapped into the scan error taxonomy.
    pub async fn execute<T, Fut>(&self, fut: Fut) -> Result<T, ScanError>
    where
        Fut: Future<Output = Result<T, RpcError>>,
    {
        let now = now_ms();

        {
            let mut breaker = self.breaker.lock().unwrap();
            if !breaker.allow(now) {
                drop(breaker);
                self.circuit_rejected.fetch_add(1, Ordering::Relaxed);
                return Err(ScanError::CircuitOpen);
            }
        }

        {
            let mut limiter = self.limiter.lock().unwrap();
            if let Err(retry_after_ms) = limiter.try_acquire(now) {
                drop(limiter);
                self.rate_limited.fetch_add(1, Ordering::Relaxed);
                // A locally throttled request is not an upstream outcome;
                // the breaker sees nothing.
                self.release_probe_slot();
                return Err(ScanError::RateLimited { retry_after_ms });
            }
        }

        self.allowed.fetch_add(1, Ordering::Relaxed);

        match fut.await {
            Ok(value) => {
                self.upstream_successes.fetch_add(1, Ordering::Relaxed);
                self.breaker.lock().unwrap().record_success();
                Ok(value)
            }
            Err(e) => {
                if e.is_transient() {
                    self.upstream_failures.fetch_add(1, Ordering::Relaxed);
                    self.breaker.lock().unwrap().record_failure(now_ms());
                    Err(ScanError::Transient(e.to_string()))
                } else {
                    // Application-level errors are the caller's problem,
                    // not a sign the node is unhealthy.
                    self.breaker.lock().unwrap().record_success();
                    Err(ScanError::Validation(e.to_string()))
                }
            }
        }
    }

    /// Run one upstream call with the full per-unit retry policy:
    /// exponential backoff on transient failures, sleeping out the
    /// limiter's retry-after on throttling, failing fast on an open
    /// circuit. The factory is re-invoked for each attempt.
    pub async fn execute_with_retry<T, Fut, F>(&self, f: F) -> Result<T, ScanError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, RpcError>>,
    {
        let mut backoff = ExponentialBackoff::new(
            self.retry_initial_delay_ms,
            self.retry_max_delay_ms,
            self.max_retries,
        );

        loop {
            match self.execute(f()).await {
                Ok(value) => return Ok(value),
                Err(ScanError::RateLimited { retry_after_ms }) => {
                    tokio::time::sleep(Duration::from_millis(retry_after_ms)).await;
                }
                Err(e @ ScanError::Transient(_)) => {
                    if backoff.sleep().await.is_err() {
                        return Err(e);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn snapshot(&self) -> GatewaySnapshot {
        let recent = self
            .limiter
            .lock()
            .unwrap()
            .recent_minute_count(now_ms());
        let state = match self.breaker.lock().unwrap().state() {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        GatewaySnapshot {
            allowed: self.allowed.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            circuit_rejected: self.circuit_rejected.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
            upstream_successes: self.upstream_successes.load(Ordering::Relaxed),
            recent_minute_requests: recent,
            circuit_state: Some(state),
        }
    }

    /// A throttled request while HALF_OPEN never reached the node, so the
    /// probe slot it claimed in `allow` must be handed back.
    fn release_probe_slot(&self) {
        self.breaker.lock().unwrap().release_probe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ScanConfig {
        ScanConfig {
            burst_limit: 3,
            requests_per_second: 100,
            requests_per_minute: 10_000,
            requests_per_hour: 100_000,
            min_request_spacing_ms: 0,
            circuit_failure_threshold: 2,
            circuit_recovery_timeout_ms: 60_000,
            retry_initial_delay_ms: 1,
            retry_max_delay_ms: 5,
            max_retries: 2,
            ..ScanConfig::default()
        }
    }

    #[tokio::test]
    async fn test_execute_passes_through_success() {
        let gateway = Gateway::new(&test_config());
        let result = gateway.execute(async { Ok::<_, RpcError>(42u64) }).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(gateway.snapshot().allowed, 1);
    }

    #[tokio::test]
    async fn test_burst_exhaustion_yields_rate_limited() {
        let gateway = Gateway::new(&test_config());
        for _ in 0..3 {
            gateway
                .execute(async { Ok::<_, RpcError>(()) })
                .await
                .unwrap();
        }
        let err = gateway
            .execute(async { Ok::<_, RpcError>(()) })
            .await
            .unwrap_err();
        match err {
            ScanError::RateLimited { retry_after_ms } => assert!(retry_after_ms > 0),
            other => panic!("expected RateLimited, got {:?}", other),
        }
        assert_eq!(gateway.snapshot().rate_limited, 1);
    }

    #[tokio::test]
    async fn test_circuit_opens_and_fails_fast() {
        let gateway = Gateway::new(&test_config());
        for _ in 0..2 {
            let _ = gateway
                .execute(async { Err::<(), _>(RpcError::Transport("down".into())) })
                .await;
        }
        let err = gateway
            .execute(async { Ok::<_, RpcError>(()) })
            .await
            .unwrap_err();
        assert_eq!(err, ScanError::CircuitOpen);
        assert_eq!(gateway.snapshot().circuit_state, Some("open"));
    }

    #[tokio::test]
    async fn test_non_transient_error_does_not_trip_breaker() {
        let gateway = Gateway::new(&test_config());
        for _ in 0..3 {
            let err = gateway
                .execute(async {
                    Err::<(), _>(RpcError::Rpc {
                        code: -5,
                        message: "block not found".into(),
                    })
                })
                .await
                .unwrap_err();
            assert!(matches!(err, ScanError::Validation(_)));
        }
        assert_eq!(gateway.snapshot().circuit_state, Some("closed"));
    }

    #[tokio::test]
    async fn test_retry_recovers_after_transient_failures() {
        use std::sync::atomic::AtomicU32;

        let gateway = Gateway::new(&ScanConfig {
            circuit_failure_threshold: 10,
            ..test_config()
        });
        let calls = AtomicU32::new(0);

        let result = gateway
            .execute_with_retry(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(RpcError::Transport("flaky".into()))
                    } else {
                        Ok(7u32)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let gateway = Gateway::new(&ScanConfig {
            circuit_failure_threshold: 100,
            ..test_config()
        });

        let result: Result<(), _> = gateway
            .execute_with_retry(|| async { Err(RpcError::Transport("down".into())) })
            .await;
        assert!(matches!(result, Err(ScanError::Transient(_))));
    }
}
