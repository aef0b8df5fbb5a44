// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Rollback signal plumbing.
//!
//! The handler may only touch atomics and issue ioctls, so everything it
//! needs is in statics: the process-wide [`crate::RECOVERY`] state and the
//! raw descriptor of the open checkpoint device.

use std::os::fd::RawFd;
use std::sync::atomic::{AtomicI32, Ordering};

use rewind_core::device::CheckpointId;
use rewind_core::error::DeviceStatus;
use rewind_core::notify::handle_rollback_signal;

use crate::device::DeviceFd;
use crate::RECOVERY;

static DEVICE_FD: AtomicI32 = AtomicI32::new(-1);
static INSTALLED_SIGNAL: AtomicI32 = AtomicI32::new(0);

/// `SIGRTMIN + offset`.
pub fn rollback_signal(offset: i32) -> i32 {
    libc::SIGRTMIN() + offset
}

/// Publishes `fd` to the handler and installs it for `signo` (once).
pub fn install(fd: RawFd, signo: i32) -> Result<(), DeviceStatus> {
    DEVICE_FD.store(fd, Ordering::Release);
    if INSTALLED_SIGNAL.swap(signo, Ordering::AcqRel) == signo {
        return Ok(());
    }

    let rc = unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = on_rollback as *const () as libc::sighandler_t;
        action.sa_flags = libc::SA_SIGINFO | libc::SA_RESTART;
        libc::sigemptyset(&mut action.sa_mask);
        libc::sigaction(signo, &action, std::ptr::null_mut())
    };
    if rc != 0 {
        INSTALLED_SIGNAL.store(0, Ordering::Release);
        DEVICE_FD.store(-1, Ordering::Release);
        return Err(DeviceStatus(-(nix::errno::Errno::last() as i32)));
    }
    Ok(())
}

pub fn detach() {
    DEVICE_FD.store(-1, Ordering::Release);
}

extern "C" fn on_rollback(_signo: libc::c_int, info: *mut libc::siginfo_t, _ctx: *mut libc::c_void) {
    let fd = DEVICE_FD.load(Ordering::Acquire);
    if fd < 0 || info.is_null() {
        return;
    }
    // The kernel passes the checkpoint id in si_value.
    let id = unsafe { (*info).si_value().sival_ptr as usize as u32 };
    handle_rollback_signal(&RECOVERY, &DeviceFd(fd), CheckpointId(id));
}
