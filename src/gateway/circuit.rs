//! Circuit breaker guarding the chain node.
//!
//! CLOSED -> OPEN after N consecutive failures; OPEN -> HALF_OPEN once the
//! recovery timeout elapses; HALF_OPEN admits one probe at a time and
//! closes after M consecutive probe successes, reopening on any probe
//! failure. Converts a storm of slow timeouts into immediate rejections.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: CircuitState,
    failure_threshold: u32,
    recovery_timeout_ms: u64,
    probe_successes_required: u32,
    consecutive_failures: u32,
    probe_successes: u32,
    probe_in_flight: bool,
    opened_at_ms: u64,
}

impl CircuitBreaker {
    pub fn new(
        failure_threshold: u32,
        recovery_timeout_ms: u64,
        probe_successes_required: u32,
    ) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_threshold: failure_threshold.max(1),
            recovery_timeout_ms,
            probe_successes_required: probe_successes_required.max(1),
            consecutive_failures: 0,
            probe_successes: 0,
            probe_in_flight: false,
            opened_at_ms: 0,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Whether a request may go out at `now_ms`. Transitions OPEN to
    /// HALF_OPEN when the recovery timeout has elapsed; while HALF_OPEN,
    /// only a single probe is admitted at a time.
    pub fn allow(&mut self, now_ms: u64) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if now_ms.saturating_sub(self.opened_at_ms) >= self.recovery_timeout_ms {
                    self.state = CircuitState::HalfOpen;
                    self.probe_successes = 0;
                    self.probe_in_flight = true;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if self.probe_in_flight {
                    false
                } else {
                    self.probe_in_flight = true;
                    true
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                self.probe_in_flight = false;
                self.probe_successes += 1;
                if self.probe_successes >= self.probe_successes_required {
                    self.state = CircuitState::Closed;
                    self.consecutive_failures = 0;
                    self.probe_successes = 0;
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Hand back a probe slot claimed by `allow` when the request never
    /// reached the node (e.g. locally rate limited). Not an outcome.
    pub fn release_probe(&mut self) {
        if self.state == CircuitState::HalfOpen {
            self.probe_in_flight = false;
        }
    }

    pub fn record_failure(&mut self, now_ms: u64) {
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.failure_threshold {
                    self.trip(now_ms);
                }
            }
            CircuitState::HalfOpen => {
                // Any probe failure reopens immediately.
                self.trip(now_ms);
            }
            CircuitState::Open => {}
        }
    }

    fn trip(&mut self, now_ms: u64) {
        self.state = CircuitState::Open;
        self.opened_at_ms = now_ms;
        self.probe_in_flight = false;
        self.probe_successes = 0;
        log::warn!(
            "circuit breaker opened after {} consecutive failures",
            self.consecutive_failures
        );
    }
}
