//! Scan state machine and progress bookkeeping.
//!
//! Progress is process-local and ephemeral; the durable resume point is
//! whatever the store already holds. Counters only advance after a batch
//! has fully settled.

use std::collections::VecDeque;

/// Lifecycle of one scan pass. Complete and Error are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    DiscoveringParticipants,
    DeterminingRange,
    ScanningBlocks,
    ComputingStatistics,
    Complete,
    Error,
}

impl ScanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::DiscoveringParticipants => "discovering_participants",
            ScanState::DeterminingRange => "determining_range",
            ScanState::ScanningBlocks => "scanning_blocks",
            ScanState::ComputingStatistics => "computing_statistics",
            ScanState::Complete => "complete",
            ScanState::Error => "error",
        }
    }
}

/// Snapshot handed to external callers.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanProgress {
    pub state: ScanState,
    pub total_blocks: u64,
    pub processed_blocks: u64,
    pub events_found: u64,
    pub error_count: u64,
    /// Most recent non-fatal errors, capped.
    pub recent_errors: Vec<String>,
    pub eta_seconds: Option<u64>,
}

#[derive(Debug)]
pub struct ProgressTracker {
    state: ScanState,
    total_blocks: u64,
    processed_blocks: u64,
    events_found: u64,
    error_count: u64,
    recent_errors: VecDeque<String>,
    max_recorded_errors: usize,
    started_at_ms: u64,
    eta_seconds: Option<u64>,
}

impl ProgressTracker {
    pub fn new(max_recorded_errors: usize) -> Self {
        Self {
            state: ScanState::Idle,
            total_blocks: 0,
            processed_blocks: 0,
            events_found: 0,
            error_count: 0,
            recent_errors: VecDeque::new(),
            max_recorded_errors: max_recorded_errors.max(1),
            started_at_ms: 0,
            eta_seconds: None,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn set_state(&mut self, state: ScanState) {
        self.state = state;
    }

    /// Reset counters for a fresh pass over `total_blocks` blocks.
    pub fn begin(&mut self, total_blocks: u64, now_ms: u64) {
        self.total_blocks = total_blocks;
        self.processed_blocks = 0;
        self.events_found = 0;
        self.error_count = 0;
        self.recent_errors.clear();
        self.started_at_ms = now_ms;
        self.eta_seconds = None;
    }

    pub fn record_block(&mut self, found_event: bool) {
        self.processed_blocks += 1;
        if found_event {
            self.events_found += 1;
        }
    }

    /// A failed unit still counts as processed; the scan moved past it.
    pub fn record_error(&mut self, message: String) {
        self.processed_blocks += 1;
        self.error_count += 1;
        if self.recent_errors.len() >= self.max_recorded_errors {
            self.recent_errors.pop_front();
        }
        self.recent_errors.push_back(message);
    }

    /// ETA from observed throughput, refreshed at batch boundaries.
    pub fn recompute_eta(&mut self, now_ms: u64) {
        if self.processed_blocks == 0 {
            self.eta_seconds = None;
            return;
        }
        let elapsed_s = now_ms.saturating_sub(self.started_at_ms) as f64 / 1000.0;
        let remaining = self.total_blocks.saturating_sub(self.processed_blocks);
        let per_block = elapsed_s / self.processed_blocks as f64;
        self.eta_seconds = Some((per_block * remaining as f64).ceil() as u64);
    }

    pub fn snapshot(&self) -> ScanProgress {
        ScanProgress {
            state: self.state,
            total_blocks: self.total_blocks,
            processed_blocks: self.processed_blocks,
            events_found: self.events_found,
            error_count: self.error_count,
            recent_errors: self.recent_errors.iter().cloned().collect(),
            eta_seconds: self.eta_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eta_from_throughput() {
        let mut tracker = ProgressTracker::new(10);
        tracker.begin(100, 0);
        for _ in 0..20 {
            tracker.record_block(false);
        }
        // 20 blocks in 10 seconds: 0.5s/block, 80 remaining.
        tracker.recompute_eta(10_000);
        assert_eq!(tracker.snapshot().eta_seconds, Some(40));
    }

    #[test]
    fn test_error_list_is_bounded() {
        let mut tracker = ProgressTracker::new(3);
        tracker.begin(10, 0);
        for i in 0..5 {
            tracker.record_error(format!("block {} failed", i));
        }
        let snap = tracker.snapshot();
        assert_eq!(snap.error_count, 5);
        assert_eq!(snap.recent_errors.len(), 3);
        assert_eq!(snap.recent_errors[0], "block 2 failed");
    }

    #[test]
    fn test_begin_resets_counters() {
        let mut tracker = ProgressTracker::new(5);
        tracker.begin(10, 0);
        tracker.record_block(true);
        tracker.record_error("boom".into());

        tracker.begin(20, 1_000);
        let snap = tracker.snapshot();
        assert_eq!(snap.processed_blocks, 0);
        assert_eq!(snap.events_found, 0);
        assert_eq!(snap.error_count, 0);
        assert!(snap.recent_errors.is_empty());
    }
}
