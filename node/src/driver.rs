// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Checkpoint driver selected at startup.

use rewind_core::device::{CheckpointDevice, CheckpointDriver, CheckpointId, RollbackAck};
use rewind_core::error::DeviceStatus;

#[cfg(target_os = "linux")]
use crate::device::{LinuxCheckpointDevice, LinuxCheckpointDriver};
use crate::sim::{SimulatedDevice, SimulatedDriver};

pub enum NodeDriver {
    #[cfg(target_os = "linux")]
    Linux(LinuxCheckpointDriver),
    Simulated(SimulatedDriver),
}

pub enum NodeDevice {
    #[cfg(target_os = "linux")]
    Linux(LinuxCheckpointDevice),
    Simulated(SimulatedDevice),
}

macro_rules! on_device {
    ($dev:expr, $d:ident => $body:expr) => {
        match $dev {
            #[cfg(target_os = "linux")]
            NodeDevice::Linux($d) => $body,
            NodeDevice::Simulated($d) => $body,
        }
    };
}

impl CheckpointDriver for NodeDriver {
    type Device = NodeDevice;

    fn open(&mut self) -> Result<NodeDevice, DeviceStatus> {
        match self {
            #[cfg(target_os = "linux")]
            NodeDriver::Linux(d) => d.open().map(NodeDevice::Linux),
            NodeDriver::Simulated(d) => d.open().map(NodeDevice::Simulated),
        }
    }
}

impl RollbackAck for NodeDevice {
    fn read_clock(&self, id: CheckpointId) -> Result<u64, DeviceStatus> {
        on_device!(self, d => d.read_clock(id))
    }

    fn acknowledge_rollback_processed(&self, id: CheckpointId) -> Result<(), DeviceStatus> {
        on_device!(self, d => d.acknowledge_rollback_processed(id))
    }
}

impl CheckpointDevice for NodeDevice {
    fn create_checkpoint(&mut self, pid: u32) -> Result<CheckpointId, DeviceStatus> {
        on_device!(self, d => d.create_checkpoint(pid))
    }

    fn rollback(&mut self, id: CheckpointId) -> Result<(), DeviceStatus> {
        on_device!(self, d => d.rollback(id))
    }

    fn arm_timer(&mut self, id: CheckpointId, seconds: u32, periodic: bool) -> Result<(), DeviceStatus> {
        on_device!(self, d => d.arm_timer(id, seconds, periodic))
    }

    fn disarm_timer(&mut self, id: CheckpointId) -> Result<(), DeviceStatus> {
        on_device!(self, d => d.disarm_timer(id))
    }

    fn capture_rollback_signal(&mut self, id: CheckpointId, thread_id: i32, signal: i32) -> Result<(), DeviceStatus> {
        on_device!(self, d => d.capture_rollback_signal(id, thread_id, signal))
    }
}
