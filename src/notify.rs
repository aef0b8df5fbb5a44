// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Rollback-completed notification path.
//!
//! The kernel delivers a signal when a timer-driven rollback has finished.
//! The handler must not allocate, block or touch the bus, so it only reads
//! the device clock, writes the rollback timestamp, posts the checkpoint id
//! into a single-slot channel and acknowledges. The control loop drains the
//! slot on its next cycle.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::device::{CheckpointId, RollbackAck};
use crate::state::RecoveryState;

const EMPTY: u64 = 0;

/// Single-slot, lock-free mailbox. A newer post overwrites an unread one.
pub struct RollbackSlot {
    // Holds `id + 1`; zero means empty.
    slot: AtomicU64,
}

impl RollbackSlot {
    pub const fn new() -> Self {
        Self { slot: AtomicU64::new(EMPTY) }
    }

    pub fn post(&self, id: CheckpointId) {
        self.slot.store(u64::from(id.0) + 1, Ordering::Release);
    }

    pub fn take(&self) -> Option<CheckpointId> {
        match self.slot.swap(EMPTY, Ordering::AcqRel) {
            EMPTY => None,
            tagged => Some(CheckpointId((tagged - 1) as u32)),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.slot.load(Ordering::Acquire) != EMPTY
    }
}

impl Default for RollbackSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Body of the rollback signal handler. Async-signal-safe as long as `ack`
/// is (the Linux device only issues ioctls).
///
/// If the device clock cannot be read, the timestamp is taken as one tick
/// past the checkpoint so the resume is still observable.
pub fn handle_rollback_signal<A: RollbackAck + ?Sized>(
    state: &RecoveryState,
    ack: &A,
    id: CheckpointId,
) {
    let ts = match ack.read_clock(id) {
        Ok(ts) if ts > state.checkpoint_timestamp() => ts,
        _ => state.checkpoint_timestamp().saturating_add(1),
    };
    state.record_rollback(ts);
    state.post_rollback(id);
    let _ = ack.acknowledge_rollback_processed(id);
}
