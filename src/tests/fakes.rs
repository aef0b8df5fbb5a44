// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Deterministic test doubles for the external seams.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use crate::bus::{Publisher, Subscriber, VehicleCommand};
use crate::clock::Clock;
use crate::device::{CheckpointDevice, CheckpointDriver, CheckpointId, RollbackAck, SignalTarget};
use crate::error::{BusError, DeviceStatus, StoreError, StoreResult};
use crate::params::ParamSource;
use crate::region::{MemoryRegion, RegionProvider};
use crate::state::RecoveryState;

pub const TARGET: SignalTarget = SignalTarget { pid: 42, thread_id: 42, signal: 36 };

// --- Clock ---

#[derive(Default)]
pub struct FakeClock(pub Cell<u64>);

impl FakeClock {
    pub fn at(us: u64) -> Self {
        Self(Cell::new(us))
    }

    pub fn advance(&self, us: u64) {
        self.0.set(self.0.get() + us);
    }
}

impl Clock for FakeClock {
    fn now_us(&self) -> u64 {
        self.0.get()
    }
}

// --- Checkpoint device ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Create(u32),
    Rollback(CheckpointId),
    Arm(CheckpointId, u32, bool),
    Disarm(CheckpointId),
    Capture(CheckpointId, i32, i32),
    Ack(CheckpointId),
}

#[derive(Default)]
pub struct DeviceLog {
    pub calls: Vec<Call>,
    pub next_id: u32,
    pub clock_us: u64,
    pub fail_create: Option<i32>,
    pub fail_arm: Option<i32>,
    pub fail_capture: Option<i32>,
    pub fail_clock: bool,
}

pub type SharedLog = Rc<RefCell<DeviceLog>>;

pub struct FakeDriver {
    pub log: SharedLog,
    pub fail_open: Option<i32>,
}

impl FakeDriver {
    pub fn new() -> (Self, SharedLog) {
        let log = SharedLog::default();
        (Self { log: log.clone(), fail_open: None }, log)
    }
}

pub struct FakeDevice {
    log: SharedLog,
}

impl CheckpointDriver for FakeDriver {
    type Device = FakeDevice;

    fn open(&mut self) -> Result<FakeDevice, DeviceStatus> {
        match self.fail_open {
            Some(code) => Err(DeviceStatus(code)),
            None => Ok(FakeDevice { log: self.log.clone() }),
        }
    }
}

impl RollbackAck for FakeDevice {
    fn read_clock(&self, _id: CheckpointId) -> Result<u64, DeviceStatus> {
        let log = self.log.borrow();
        if log.fail_clock {
            Err(DeviceStatus(-5))
        } else {
            Ok(log.clock_us)
        }
    }

    fn acknowledge_rollback_processed(&self, id: CheckpointId) -> Result<(), DeviceStatus> {
        self.log.borrow_mut().calls.push(Call::Ack(id));
        Ok(())
    }
}

impl CheckpointDevice for FakeDevice {
    fn create_checkpoint(&mut self, pid: u32) -> Result<CheckpointId, DeviceStatus> {
        let mut log = self.log.borrow_mut();
        if let Some(code) = log.fail_create {
            return Err(DeviceStatus(code));
        }
        log.calls.push(Call::Create(pid));
        log.next_id += 1;
        Ok(CheckpointId(log.next_id))
    }

    fn rollback(&mut self, id: CheckpointId) -> Result<(), DeviceStatus> {
        self.log.borrow_mut().calls.push(Call::Rollback(id));
        Ok(())
    }

    fn arm_timer(&mut self, id: CheckpointId, seconds: u32, periodic: bool) -> Result<(), DeviceStatus> {
        let mut log = self.log.borrow_mut();
        if let Some(code) = log.fail_arm {
            return Err(DeviceStatus(code));
        }
        log.calls.push(Call::Arm(id, seconds, periodic));
        Ok(())
    }

    fn disarm_timer(&mut self, id: CheckpointId) -> Result<(), DeviceStatus> {
        self.log.borrow_mut().calls.push(Call::Disarm(id));
        Ok(())
    }

    fn capture_rollback_signal(&mut self, id: CheckpointId, thread_id: i32, signal: i32) -> Result<(), DeviceStatus> {
        let mut log = self.log.borrow_mut();
        if let Some(code) = log.fail_capture {
            return Err(DeviceStatus(code));
        }
        log.calls.push(Call::Capture(id, thread_id, signal));
        Ok(())
    }
}

// --- Regions ---

/// Records what the store asked of it; a mirror counts as used once written.
pub struct ScriptedProvider<'a> {
    regions: Vec<MemoryRegion>,
    recovery: &'a RecoveryState,
    pub fail_at: Option<usize>,
    pub written: Vec<usize>,
    pub marker_during_write: Vec<bool>,
}

impl<'a> ScriptedProvider<'a> {
    pub fn new(recovery: &'a RecoveryState, layout: &[(&'static str, usize)]) -> Self {
        let regions = layout
            .iter()
            .map(|(name, len)| MemoryRegion { name: *name, base: 0, len: *len, mirror: 0 })
            .collect();
        Self { regions, recovery, fail_at: None, written: Vec::new(), marker_during_write: Vec::new() }
    }
}

impl RegionProvider for ScriptedProvider<'_> {
    fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    fn is_erased(&self, index: usize) -> bool {
        index < self.regions.len() && !self.written.contains(&index)
    }

    fn write_mirror(&mut self, index: usize) -> StoreResult<usize> {
        self.marker_during_write.push(self.recovery.in_reboot());
        if self.fail_at == Some(index) {
            return Err(StoreError::Io);
        }
        let len = self.regions.get(index).ok_or(StoreError::NoSuchRegion)?.len;
        self.written.push(index);
        Ok(len)
    }

    fn read_mirror(&mut self, _index: usize) {}
}

// --- Bus ---

pub struct QueueSub<T> {
    pub queue: Rc<RefCell<VecDeque<T>>>,
}

impl<T> QueueSub<T> {
    pub fn new() -> (Self, Rc<RefCell<VecDeque<T>>>) {
        let queue = Rc::new(RefCell::new(VecDeque::new()));
        (Self { queue: queue.clone() }, queue)
    }
}

impl<T> Subscriber<T> for QueueSub<T> {
    fn updated(&mut self) -> bool {
        !self.queue.borrow().is_empty()
    }

    fn copy(&mut self) -> T {
        self.queue.borrow_mut().pop_front().expect("copy without update")
    }
}

#[derive(Default)]
pub struct RecordingBus {
    pub sent: Vec<VehicleCommand>,
    pub fail: bool,
}

impl Publisher<VehicleCommand> for RecordingBus {
    fn publish(&mut self, msg: &VehicleCommand) -> Result<(), BusError> {
        if self.fail {
            return Err(BusError::NoSubscribers);
        }
        self.sent.push(*msg);
        Ok(())
    }
}

// --- Params ---

#[derive(Default)]
pub struct MapParams(pub Vec<(&'static str, i32)>);

impl ParamSource for MapParams {
    fn get_i32(&self, key: &str) -> Option<i32> {
        self.0.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }
}
