//! Windowed rate limiter with a refillable burst bucket.
//!
//! Four independent constraints, all of which must admit a request:
//! minimum inter-request spacing, per-second / per-minute / per-hour
//! window caps, and a token bucket for bursts. `try_acquire` reports the
//! smallest wait that would make the request admissible, so callers can
//! sleep exactly that long instead of polling.
//!
//! Time is injected as a millisecond timestamp to keep the limiter
//! deterministic under test.

use std::collections::VecDeque;

const HOUR_MS: u64 = 3_600_000;
const MINUTE_MS: u64 = 60_000;
const SECOND_MS: u64 = 1_000;

#[derive(Debug)]
pub struct RateLimiter {
    min_spacing_ms: u64,
    per_second: u32,
    per_minute: u32,
    per_hour: u32,
    burst_capacity: f64,
    /// Tokens refill at the per-second rate.
    refill_per_ms: f64,
    tokens: f64,
    last_refill_ms: u64,
    last_request_ms: Option<u64>,
    /// Timestamps of admitted requests, pruned to the last hour.
    history: VecDeque<u64>,
}

impl RateLimiter {
    pub fn new(
        min_spacing_ms: u64,
        per_second: u32,
        per_minute: u32,
        per_hour: u32,
        burst_limit: u32,
        now_ms: u64,
    ) -> Self {
        Self {
            min_spacing_ms,
            per_second,
            per_minute,
            per_hour,
            burst_capacity: burst_limit as f64,
            refill_per_ms: per_second as f64 / SECOND_MS as f64,
            tokens: burst_limit as f64,
            last_refill_ms: now_ms,
            last_request_ms: None,
            history: VecDeque::new(),
        }
    }

    /// Admit a request at `now_ms`, or report how long to wait.
    pub fn try_acquire(&mut self, now_ms: u64) -> Result<(), u64> {
        self.refill(now_ms);
        self.prune(now_ms);

        let mut wait: u64 = 0;

        if let Some(last) = self.last_request_ms {
            let next_allowed = last + self.min_spacing_ms;
            if now_ms < next_allowed {
                wait = wait.max(next_allowed - now_ms);
            }
        }

        wait = wait.max(self.window_wait(now_ms, SECOND_MS, self.per_second));
        wait = wait.max(self.window_wait(now_ms, MINUTE_MS, self.per_minute));
        wait = wait.max(self.window_wait(now_ms, HOUR_MS, self.per_hour));

        if self.tokens < 1.0 {
            let deficit = 1.0 - self.tokens;
            let refill_wait = (deficit / self.refill_per_ms).ceil() as u64;
            wait = wait.max(refill_wait.max(1));
        }

        if wait > 0 {
            return Err(wait);
        }

        self.tokens -= 1.0;
        self.last_request_ms = Some(now_ms);
        self.history.push_back(now_ms);
        Ok(())
    }

    /// Requests admitted within the trailing minute.
    pub fn recent_minute_count(&self, now_ms: u64) -> usize {
        let cutoff = now_ms.saturating_sub(MINUTE_MS);
        self.history.iter().filter(|t| **t >= cutoff).count()
    }

    fn refill(&mut self, now_ms: u64) {
        let elapsed = now_ms.saturating_sub(self.last_refill_ms);
        if elapsed > 0 {
            self.tokens =
                (self.tokens + elapsed as f64 * self.refill_per_ms).min(self.burst_capacity);
            self.last_refill_ms = now_ms;
        }
    }

    fn prune(&mut self, now_ms: u64) {
        let cutoff = now_ms.saturating_sub(HOUR_MS);
        while let Some(front) = self.history.front() {
            if *front < cutoff {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }

    /// Wait until the oldest request in the window ages out, if the window
    /// cap is already met.
    fn window_wait(&self, now_ms: u64, window_ms: u64, cap: u32) -> u64 {
        if cap == 0 {
            return 0;
        }
        let cutoff = now_ms.saturating_sub(window_ms);
        let in_window: Vec<u64> = self
            .history
            .iter()
            .copied()
            .filter(|t| *t >= cutoff)
            .collect();
        if (in_window.len() as u32) < cap {
            return 0;
        }
        // History is ordered, so the first in-window entry is the oldest.
        match in_window.first() {
            Some(oldest) => (oldest + window_ms + 1).saturating_sub(now_ms).max(1),
            None => 0,
        }
    }
}
