//! Error taxonomy for the ingestion pipeline.
//!
//! Only `FatalConfiguration` ever aborts a scan; everything else is
//! retried, skipped, and counted per unit of work.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ScanError {
    /// Timeout / connection failure from the upstream node. Retried with
    /// exponential backoff, then skipped.
    Transient(String),
    /// Rejected by the local rate limiter; retry after the given delay.
    RateLimited { retry_after_ms: u64 },
    /// Rejected fast because the circuit breaker is open.
    CircuitOpen,
    /// Store-level failure (constraint violation, connection loss).
    Persistence(String),
    /// Malformed block / transaction shape; the unit is skipped.
    Validation(String),
    /// Cannot establish the scan range or reach the chain tip. Aborts the
    /// scan and propagates to the caller.
    FatalConfiguration(String),
}

impl ScanError {
    /// Transient errors are worth another attempt through the gateway's
    /// backoff; everything else either fails fast or is a per-unit skip.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScanError::Transient(_) | ScanError::RateLimited { .. }
        )
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ScanError::FatalConfiguration(_))
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Transient(msg) => write!(f, "transient upstream error: {}", msg),
            ScanError::RateLimited { retry_after_ms } => {
                write!(f, "rate limited, retry after {}ms", retry_after_ms)
            }
            ScanError::CircuitOpen => write!(f, "circuit breaker open"),
            ScanError::Persistence(msg) => write!(f, "persistence error: {}", msg),
            ScanError::Validation(msg) => write!(f, "validation error: {}", msg),
            ScanError::FatalConfiguration(msg) => {
                write!(f, "fatal configuration error: {}", msg)
            }
        }
    }
}

impl std::error::Error for ScanError {}

impl From<rusqlite::Error> for ScanError {
    fn from(e: rusqlite::Error) -> Self {
        ScanError::Persistence(e.to_string())
    }
}
