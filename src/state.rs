// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Recovery state that survives both process restart and rollback.
//!
//! Every field is a lock-free atomic so the same struct can be shared
//! between the control loop and the rollback signal handler. Exactly one
//! writer touches each field during a recovery episode:
//!
//! | field                  | writer                         |
//! |------------------------|--------------------------------|
//! | `checkpoint_timestamp` | session manager                |
//! | `rollback_timestamp`   | signal handler / session       |
//! | `in_reboot`            | snapshot store, resync         |
//! | `snapshot_taken`       | trigger policy                 |
//! | `last_action_us`       | trigger policy                 |
//! | `companion_synced`     | companion link (node)          |

use core::sync::atomic::{fence, AtomicBool, AtomicU64, Ordering};

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::device::CheckpointId;
use crate::notify::RollbackSlot;

pub struct RecoveryState {
    checkpoint_timestamp: AtomicU64,
    rollback_timestamp: AtomicU64,
    last_action_us: AtomicU64,
    in_reboot: AtomicBool,
    snapshot_taken: AtomicBool,
    companion_synced: AtomicBool,
    pending: RollbackSlot,
}

impl RecoveryState {
    pub const fn new() -> Self {
        Self {
            checkpoint_timestamp: AtomicU64::new(0),
            rollback_timestamp: AtomicU64::new(0),
            last_action_us: AtomicU64::new(0),
            in_reboot: AtomicBool::new(false),
            snapshot_taken: AtomicBool::new(false),
            companion_synced: AtomicBool::new(false),
            pending: RollbackSlot::new(),
        }
    }

    // --- Timestamp pair ---

    pub fn checkpoint_timestamp(&self) -> u64 {
        self.checkpoint_timestamp.load(Ordering::Acquire)
    }

    /// Stores a new checkpoint timestamp and returns the previous one.
    pub fn stamp_checkpoint(&self, ts: u64) -> u64 {
        self.checkpoint_timestamp.swap(ts, Ordering::AcqRel)
    }

    pub fn rollback_timestamp(&self) -> u64 {
        self.rollback_timestamp.load(Ordering::Acquire)
    }

    /// Signal-safe: a single atomic store.
    pub fn record_rollback(&self, ts: u64) {
        self.rollback_timestamp.store(ts, Ordering::Release);
    }

    /// True when the last rollback happened after the last checkpoint, i.e.
    /// execution is running on state restored from that checkpoint.
    pub fn resumed_from_rollback(&self) -> bool {
        self.rollback_timestamp() > self.checkpoint_timestamp()
    }

    /// Time that vanished from the process's point of view in the last
    /// rollback. `None` before any rollback.
    pub fn drift_us(&self) -> Option<u64> {
        match self.rollback_timestamp() {
            0 => None,
            rb => Some(rb.saturating_sub(self.checkpoint_timestamp())),
        }
    }

    // --- Pending notification ---

    /// Signal-safe: posts the checkpoint id of a completed rollback.
    pub fn post_rollback(&self, id: CheckpointId) {
        self.pending.post(id);
    }

    pub fn take_pending_rollback(&self) -> Option<CheckpointId> {
        self.pending.take()
    }

    pub fn rollback_pending(&self) -> bool {
        self.pending.is_pending()
    }

    // --- Flags ---

    pub fn in_reboot(&self) -> bool {
        self.in_reboot.load(Ordering::Acquire)
    }

    /// Toggles the in-reboot marker behind a full fence so that flash writes
    /// and handler stores on either side are ordered against it.
    pub fn set_in_reboot(&self, value: bool) {
        fence(Ordering::SeqCst);
        self.in_reboot.store(value, Ordering::SeqCst);
        fence(Ordering::SeqCst);
    }

    pub fn snapshot_taken(&self) -> bool {
        self.snapshot_taken.load(Ordering::Acquire)
    }

    /// Returns `true` if this call set the flag.
    pub fn mark_snapshot_taken(&self) -> bool {
        !self.snapshot_taken.swap(true, Ordering::AcqRel)
    }

    /// Re-enables the one-shot snapshot trigger after an external erase.
    pub fn clear_snapshot_taken(&self) {
        self.snapshot_taken.store(false, Ordering::Release);
    }

    pub fn last_action_us(&self) -> u64 {
        self.last_action_us.load(Ordering::Acquire)
    }

    pub fn set_last_action_us(&self, ts: u64) {
        self.last_action_us.store(ts, Ordering::Release);
    }

    pub fn companion_synced(&self) -> bool {
        self.companion_synced.load(Ordering::Acquire)
    }

    pub fn set_companion_synced(&self, value: bool) {
        self.companion_synced.store(value, Ordering::Release);
    }

    // --- Persistence ---

    /// Plain copy of the fields that must outlive a process restart.
    pub fn record(&self) -> RecoveryRecord {
        RecoveryRecord {
            checkpoint_timestamp: self.checkpoint_timestamp(),
            rollback_timestamp: self.rollback_timestamp(),
            last_action_us: self.last_action_us(),
            in_reboot: self.in_reboot(),
            snapshot_taken: self.snapshot_taken(),
        }
    }

    pub fn load_record(&self, record: &RecoveryRecord) {
        self.checkpoint_timestamp.store(record.checkpoint_timestamp, Ordering::Release);
        self.rollback_timestamp.store(record.rollback_timestamp, Ordering::Release);
        self.last_action_us.store(record.last_action_us, Ordering::Release);
        self.snapshot_taken.store(record.snapshot_taken, Ordering::Release);
        self.set_in_reboot(record.in_reboot);
    }
}

impl Default for RecoveryState {
    fn default() -> Self {
        Self::new()
    }
}

const FLAG_IN_REBOOT: u32 = 1 << 0;
const FLAG_SNAPSHOT_TAKEN: u32 = 1 << 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryRecord {
    pub checkpoint_timestamp: u64,
    pub rollback_timestamp: u64,
    pub last_action_us: u64,
    pub in_reboot: bool,
    pub snapshot_taken: bool,
}

impl RecoveryRecord {
    pub const SIZE: usize = 8 + 8 + 8 + 4; // 28 bytes

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        LittleEndian::write_u64(&mut buf[0..8], self.checkpoint_timestamp);
        LittleEndian::write_u64(&mut buf[8..16], self.rollback_timestamp);
        LittleEndian::write_u64(&mut buf[16..24], self.last_action_us);

        let mut flags = 0;
        if self.in_reboot {
            flags |= FLAG_IN_REBOOT;
        }
        if self.snapshot_taken {
            flags |= FLAG_SNAPSHOT_TAKEN;
        }
        LittleEndian::write_u32(&mut buf[24..28], flags);
        buf
    }

    /// Returns `None` if `buf` is shorter than [`Self::SIZE`].
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::SIZE {
            return None;
        }
        let flags = LittleEndian::read_u32(&buf[24..28]);
        Some(Self {
            checkpoint_timestamp: LittleEndian::read_u64(&buf[0..8]),
            rollback_timestamp: LittleEndian::read_u64(&buf[8..16]),
            last_action_us: LittleEndian::read_u64(&buf[16..24]),
            in_reboot: flags & FLAG_IN_REBOOT != 0,
            snapshot_taken: flags & FLAG_SNAPSHOT_TAKEN != 0,
        })
    }
}
