// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Client view of the kernel checkpoint capability.
//!
//! The in-kernel capture itself is opaque; these traits are the narrow API
//! the session manager drives. Every call is fallible and reports the
//! kernel's negative status as [`DeviceStatus`].

use serde::{Deserialize, Serialize};

use crate::error::DeviceStatus;

/// Opaque handle of a kernel checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckpointId(pub u32);

/// Where the kernel should deliver the rollback-completed signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalTarget {
    pub pid: u32,
    pub thread_id: i32,
    pub signal: i32,
}

/// The subset of the capability that is safe to call from the rollback
/// signal handler.
pub trait RollbackAck {
    fn read_clock(&self, id: CheckpointId) -> Result<u64, DeviceStatus>;
    fn acknowledge_rollback_processed(&self, id: CheckpointId) -> Result<(), DeviceStatus>;
}

pub trait CheckpointDevice: RollbackAck {
    fn create_checkpoint(&mut self, pid: u32) -> Result<CheckpointId, DeviceStatus>;

    /// Restores process state to `id`. On a real kernel this does not return
    /// to the call site: execution resumes where `create_checkpoint` returned.
    fn rollback(&mut self, id: CheckpointId) -> Result<(), DeviceStatus>;

    fn arm_timer(&mut self, id: CheckpointId, seconds: u32, periodic: bool) -> Result<(), DeviceStatus>;

    fn disarm_timer(&mut self, id: CheckpointId) -> Result<(), DeviceStatus>;

    fn capture_rollback_signal(
        &mut self,
        id: CheckpointId,
        thread_id: i32,
        signal: i32,
    ) -> Result<(), DeviceStatus>;
}

/// Opens checkpoint device handles.
pub trait CheckpointDriver {
    type Device: CheckpointDevice;

    fn open(&mut self) -> Result<Self::Device, DeviceStatus>;
}
