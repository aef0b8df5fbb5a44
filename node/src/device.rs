// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Client for the checkpoint character device.
//!
//! Every request is one ioctl on the open device; the kernel returns a
//! negative errno on failure, reported as [`DeviceStatus`].

use std::fs::{File, OpenOptions};
use std::os::fd::{AsRawFd, RawFd};
use std::path::PathBuf;

use rewind_core::device::{CheckpointDevice, CheckpointDriver, CheckpointId, RollbackAck};
use rewind_core::error::DeviceStatus;

use crate::signal;

const CKPT_MAGIC: u8 = b'k';

#[repr(C)]
pub struct CkptCreate {
    pub pid: u32,
    pub id: u32,
}

#[repr(C)]
pub struct CkptTimer {
    pub id: u32,
    pub seconds: u32,
    pub periodic: u32,
}

#[repr(C)]
pub struct CkptSignal {
    pub id: u32,
    pub tid: i32,
    pub signo: i32,
}

#[repr(C)]
pub struct CkptClock {
    pub id: u32,
    pub reserved: u32,
    pub clock_us: u64,
}

mod ioctl {
    use super::*;

    nix::ioctl_readwrite!(create, CKPT_MAGIC, 1, CkptCreate);
    nix::ioctl_write_int!(rollback, CKPT_MAGIC, 2);
    nix::ioctl_write_ptr!(arm_timer, CKPT_MAGIC, 3, CkptTimer);
    nix::ioctl_write_int!(disarm_timer, CKPT_MAGIC, 4);
    nix::ioctl_write_ptr!(capture_signal, CKPT_MAGIC, 5, CkptSignal);
    nix::ioctl_write_int!(ack, CKPT_MAGIC, 6);
    nix::ioctl_readwrite!(clock, CKPT_MAGIC, 7, CkptClock);
}

fn status(e: nix::Error) -> DeviceStatus {
    DeviceStatus(-(e as i32))
}

/// Borrowed descriptor; the only form the signal handler sees.
#[derive(Debug, Clone, Copy)]
pub struct DeviceFd(pub RawFd);

impl RollbackAck for DeviceFd {
    fn read_clock(&self, id: CheckpointId) -> Result<u64, DeviceStatus> {
        let mut req = CkptClock { id: id.0, reserved: 0, clock_us: 0 };
        unsafe { ioctl::clock(self.0, &mut req) }.map_err(status)?;
        Ok(req.clock_us)
    }

    fn acknowledge_rollback_processed(&self, id: CheckpointId) -> Result<(), DeviceStatus> {
        unsafe { ioctl::ack(self.0, id.0 as nix::sys::ioctl::ioctl_param_type) }.map_err(status)?;
        Ok(())
    }
}

pub struct LinuxCheckpointDriver {
    path: PathBuf,
    signal: i32,
}

impl LinuxCheckpointDriver {
    /// `signal` is the absolute signal number the kernel will raise.
    pub fn new(path: PathBuf, signal: i32) -> Self {
        Self { path, signal }
    }
}

impl CheckpointDriver for LinuxCheckpointDriver {
    type Device = LinuxCheckpointDevice;

    fn open(&mut self) -> Result<LinuxCheckpointDevice, DeviceStatus> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| DeviceStatus(-e.raw_os_error().unwrap_or(libc::ENODEV)))?;
        signal::install(file.as_raw_fd(), self.signal)?;
        tracing::info!(path = %self.path.display(), signal = self.signal, "checkpoint device opened");
        Ok(LinuxCheckpointDevice { file })
    }
}

pub struct LinuxCheckpointDevice {
    file: File,
}

impl LinuxCheckpointDevice {
    fn fd(&self) -> DeviceFd {
        DeviceFd(self.file.as_raw_fd())
    }
}

impl RollbackAck for LinuxCheckpointDevice {
    fn read_clock(&self, id: CheckpointId) -> Result<u64, DeviceStatus> {
        self.fd().read_clock(id)
    }

    fn acknowledge_rollback_processed(&self, id: CheckpointId) -> Result<(), DeviceStatus> {
        self.fd().acknowledge_rollback_processed(id)
    }
}

impl CheckpointDevice for LinuxCheckpointDevice {
    fn create_checkpoint(&mut self, pid: u32) -> Result<CheckpointId, DeviceStatus> {
        let mut req = CkptCreate { pid, id: 0 };
        unsafe { ioctl::create(self.file.as_raw_fd(), &mut req) }.map_err(status)?;
        Ok(CheckpointId(req.id))
    }

    fn rollback(&mut self, id: CheckpointId) -> Result<(), DeviceStatus> {
        unsafe { ioctl::rollback(self.file.as_raw_fd(), id.0 as nix::sys::ioctl::ioctl_param_type) }
            .map_err(status)?;
        Ok(())
    }

    fn arm_timer(&mut self, id: CheckpointId, seconds: u32, periodic: bool) -> Result<(), DeviceStatus> {
        let req = CkptTimer { id: id.0, seconds, periodic: u32::from(periodic) };
        unsafe { ioctl::arm_timer(self.file.as_raw_fd(), &req) }.map_err(status)?;
        Ok(())
    }

    fn disarm_timer(&mut self, id: CheckpointId) -> Result<(), DeviceStatus> {
        unsafe { ioctl::disarm_timer(self.file.as_raw_fd(), id.0 as nix::sys::ioctl::ioctl_param_type) }
            .map_err(status)?;
        Ok(())
    }

    fn capture_rollback_signal(&mut self, id: CheckpointId, thread_id: i32, signal: i32) -> Result<(), DeviceStatus> {
        let req = CkptSignal { id: id.0, tid: thread_id, signo: signal };
        unsafe { ioctl::capture_signal(self.file.as_raw_fd(), &req) }.map_err(status)?;
        Ok(())
    }
}

impl Drop for LinuxCheckpointDevice {
    fn drop(&mut self) {
        // Stop the handler from touching the descriptor before it closes.
        signal::detach();
    }
}
