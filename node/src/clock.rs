// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use rewind_core::clock::Clock;
use rewind_core::state::RecoveryRecord;
use tokio::time::Instant;

/// Microseconds on a timeline that continues across node restarts. Built on
/// tokio's clock so paused-time tests advance it.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
    base_us: u64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::with_base(0)
    }

    pub fn with_base(base_us: u64) -> Self {
        Self { epoch: Instant::now(), base_us }
    }

    /// Resumes after the latest instant a previous run recorded.
    pub fn resume_after(record: &RecoveryRecord) -> Self {
        let latest = record
            .checkpoint_timestamp
            .max(record.rollback_timestamp)
            .max(record.last_action_us);
        Self::with_base(latest)
    }

    pub fn base_us(&self) -> u64 {
        self.base_us
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_us(&self) -> u64 {
        // +1 so a fresh stamp is never mistaken for "no checkpoint".
        self.base_us + self.epoch.elapsed().as_micros() as u64 + 1
    }
}
