// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Time sources.

use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::config::DEFAULT_CYCLES_PER_US;

/// Monotonic microsecond clock.
pub trait Clock {
    fn now_us(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }
}

/// Free-running 32-bit cycle counter.
pub trait CycleCounter {
    fn cycles(&self) -> u32;
}

/// Address of the Cortex-M DWT cycle counter (`DWT_CYCCNT`).
pub const DWT_CYCCNT: usize = 0xE000_1004;

/// Reads `DWT_CYCCNT` directly.
pub struct DwtCounter {
    _private: (),
}

impl DwtCounter {
    /// # Safety
    /// The DWT unit must exist at [`DWT_CYCCNT`] and be enabled.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl CycleCounter for DwtCounter {
    fn cycles(&self) -> u32 {
        unsafe { core::ptr::read_volatile(DWT_CYCCNT as *const u32) }
    }
}

/// Extends a wrapping cycle counter to a 64-bit microsecond clock.
///
/// `base` and `last` are the values that must live in across-reboot memory
/// on the target so that time stays monotonic through a restore.
/// Wraps are only detected if `now_us` is called at least once per counter
/// period (25 s at 168 MHz).
pub struct CycleClock<C> {
    counter: C,
    cycles_per_us: u64,
    base: AtomicU64,
    last: AtomicU32,
}

impl<C: CycleCounter> CycleClock<C> {
    pub fn new(counter: C) -> Self {
        Self::with_rate(counter, DEFAULT_CYCLES_PER_US)
    }

    pub fn with_rate(counter: C, cycles_per_us: u64) -> Self {
        Self {
            counter,
            cycles_per_us: cycles_per_us.max(1),
            base: AtomicU64::new(0),
            last: AtomicU32::new(0),
        }
    }

    pub fn counter(&self) -> &C {
        &self.counter
    }
}

impl<C: CycleCounter> Clock for CycleClock<C> {
    fn now_us(&self) -> u64 {
        let cycles = self.counter.cycles();
        let last = self.last.swap(cycles, Ordering::AcqRel);
        if cycles < last {
            self.base.fetch_add(1 << 32, Ordering::AcqRel);
        }
        (self.base.load(Ordering::Acquire) + u64::from(cycles)) / self.cycles_per_us
    }
}
