//! Exponential backoff with jitter for transient upstream failures.

use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug)]
pub struct ExponentialBackoff {
    initial_delay_ms: u64,
    max_delay_ms: u64,
    max_retries: u32,
    current_attempt: u32,
}

#[derive(Debug)]
pub struct MaxRetriesExceeded;

impl std::fmt::Display for MaxRetriesExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Maximum retry attempts exceeded")
    }
}

impl std::error::Error for MaxRetriesExceeded {}

impl ExponentialBackoff {
    pub fn new(initial_delay_ms: u64, max_delay_ms: u64, max_retries: u32) -> Self {
        Self {
            initial_delay_ms,
            max_delay_ms,
            max_retries,
            current_attempt: 0,
        }
    }

    /// The delay for the next attempt, doubled each time and capped, with
    /// up to 20% random jitter to avoid retry alignment across workers.
    pub fn next_delay_ms(&mut self) -> Result<u64, MaxRetriesExceeded> {
        if self.current_attempt >= self.max_retries {
            return Err(MaxRetriesExceeded);
        }

        let base = std::cmp::min(
            self.initial_delay_ms
                .saturating_mul(2_u64.saturating_pow(self.current_attempt)),
            self.max_delay_ms,
        );
        self.current_attempt += 1;

        let jitter = rand::thread_rng().gen_range(0..=base / 5 + 1);
        Ok(base + jitter)
    }

    pub async fn sleep(&mut self) -> Result<(), MaxRetriesExceeded> {
        let delay = self.next_delay_ms()?;

        log::warn!(
            "⏳ Retry attempt {} of {} in {}ms",
            self.current_attempt,
            self.max_retries,
            delay
        );

        sleep(Duration::from_millis(delay)).await;
        Ok(())
    }

    pub fn attempts(&self) -> u32 {
        self.current_attempt
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }
}
