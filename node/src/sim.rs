// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! In-process checkpoint device for hosts without the kernel module.
//!
//! A checkpoint is a copy of the process image; rollback writes it back.
//! Timers are tokio tasks that restore the image and then deliver the
//! rollback notification through the same handler the real signal uses.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rewind_core::clock::Clock;
use rewind_core::device::{CheckpointDevice, CheckpointDriver, CheckpointId, RollbackAck};
use rewind_core::error::DeviceStatus;
use rewind_core::notify::handle_rollback_signal;
use rewind_core::state::RecoveryState;
use tokio::task::JoinHandle;

use crate::clock::MonotonicClock;

/// Volatile memory the simulated kernel captures and restores.
pub type ProcessImage = Arc<Mutex<Vec<u8>>>;

const ENOENT: i32 = 2;
const EINVAL: i32 = 22;
const ENOSYS: i32 = 38;

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct SimShared {
    clock: MonotonicClock,
    image: ProcessImage,
    recovery: &'static RecoveryState,
    next_id: AtomicU32,
    checkpoints: Mutex<HashMap<CheckpointId, Vec<u8>>>,
    signals: Mutex<HashMap<CheckpointId, (i32, i32)>>,
    timers: Mutex<HashMap<CheckpointId, JoinHandle<()>>>,
    acks: AtomicU64,
}

impl SimShared {
    fn restore_image(&self, id: CheckpointId) -> Result<(), DeviceStatus> {
        let checkpoints = lock(&self.checkpoints);
        let saved = checkpoints.get(&id).ok_or(DeviceStatus(-EINVAL))?;
        lock(&self.image).clone_from(saved);
        Ok(())
    }

    /// Restores the image and posts the notification under the image lock,
    /// so a writer holding that lock sees either neither or both.
    fn fire(&self, id: CheckpointId, periodic: bool) {
        if !periodic {
            lock(&self.timers).remove(&id);
        }
        let checkpoints = lock(&self.checkpoints);
        let Some(saved) = checkpoints.get(&id) else {
            return;
        };
        let mut image = lock(&self.image);
        image.clone_from(saved);
        tracing::debug!(checkpoint = id.0, "simulated timer fired");
        if lock(&self.signals).contains_key(&id) {
            handle_rollback_signal(self.recovery, self, id);
        }
    }
}

impl RollbackAck for SimShared {
    fn read_clock(&self, _id: CheckpointId) -> Result<u64, DeviceStatus> {
        Ok(self.clock.now_us())
    }

    fn acknowledge_rollback_processed(&self, _id: CheckpointId) -> Result<(), DeviceStatus> {
        self.acks.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

#[derive(Clone)]
pub struct SimulatedDriver {
    shared: Arc<SimShared>,
}

impl SimulatedDriver {
    pub fn new(image: ProcessImage, recovery: &'static RecoveryState, clock: MonotonicClock) -> Self {
        Self {
            shared: Arc::new(SimShared {
                clock,
                image,
                recovery,
                next_id: AtomicU32::new(0),
                checkpoints: Mutex::new(HashMap::new()),
                signals: Mutex::new(HashMap::new()),
                timers: Mutex::new(HashMap::new()),
                acks: AtomicU64::new(0),
            }),
        }
    }

    /// Rollback notifications acknowledged so far.
    pub fn notifications(&self) -> u64 {
        self.shared.acks.load(Ordering::Acquire)
    }

    pub fn pending_timers(&self) -> usize {
        lock(&self.shared.timers).len()
    }
}

impl CheckpointDriver for SimulatedDriver {
    type Device = SimulatedDevice;

    fn open(&mut self) -> Result<SimulatedDevice, DeviceStatus> {
        Ok(SimulatedDevice { shared: self.shared.clone() })
    }
}

pub struct SimulatedDevice {
    shared: Arc<SimShared>,
}

impl RollbackAck for SimulatedDevice {
    fn read_clock(&self, id: CheckpointId) -> Result<u64, DeviceStatus> {
        self.shared.read_clock(id)
    }

    fn acknowledge_rollback_processed(&self, id: CheckpointId) -> Result<(), DeviceStatus> {
        self.shared.acknowledge_rollback_processed(id)
    }
}

impl CheckpointDevice for SimulatedDevice {
    fn create_checkpoint(&mut self, _pid: u32) -> Result<CheckpointId, DeviceStatus> {
        let id = CheckpointId(self.shared.next_id.fetch_add(1, Ordering::AcqRel) + 1);
        let copy = lock(&self.shared.image).clone();
        lock(&self.shared.checkpoints).insert(id, copy);
        Ok(id)
    }

    fn rollback(&mut self, id: CheckpointId) -> Result<(), DeviceStatus> {
        self.shared.restore_image(id)
    }

    fn arm_timer(&mut self, id: CheckpointId, seconds: u32, periodic: bool) -> Result<(), DeviceStatus> {
        if !lock(&self.shared.checkpoints).contains_key(&id) {
            return Err(DeviceStatus(-EINVAL));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| DeviceStatus(-ENOSYS))?;

        let shared = self.shared.clone();
        let period = Duration::from_secs(u64::from(seconds));
        let task = runtime.spawn(async move {
            loop {
                tokio::time::sleep(period).await;
                shared.fire(id, periodic);
                if !periodic {
                    break;
                }
            }
        });

        if let Some(previous) = lock(&self.shared.timers).insert(id, task) {
            previous.abort();
        }
        Ok(())
    }

    fn disarm_timer(&mut self, id: CheckpointId) -> Result<(), DeviceStatus> {
        match lock(&self.shared.timers).remove(&id) {
            Some(task) => {
                task.abort();
                Ok(())
            }
            None => Err(DeviceStatus(-ENOENT)),
        }
    }

    fn capture_rollback_signal(&mut self, id: CheckpointId, thread_id: i32, signal: i32) -> Result<(), DeviceStatus> {
        if !lock(&self.shared.checkpoints).contains_key(&id) {
            return Err(DeviceStatus(-EINVAL));
        }
        lock(&self.shared.signals).insert(id, (thread_id, signal));
        Ok(())
    }
}

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        for (_, task) in lock(&self.shared.timers).drain() {
            task.abort();
        }
        lock(&self.shared.checkpoints).clear();
        lock(&self.shared.signals).clear();
    }
}
