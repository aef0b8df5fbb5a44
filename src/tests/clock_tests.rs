// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::cell::Cell;

use crate::clock::{Clock, CycleClock, CycleCounter};

struct StepCounter(Cell<u32>);

impl CycleCounter for StepCounter {
    fn cycles(&self) -> u32 {
        self.0.get()
    }
}

#[test]
fn test_cycle_clock_divides_by_rate() {
    let clock = CycleClock::with_rate(StepCounter(Cell::new(168 * 1_000)), 168);
    assert_eq!(clock.now_us(), 1_000);
}

#[test]
fn test_cycle_clock_extends_across_wrap() {
    let clock = CycleClock::with_rate(StepCounter(Cell::new(u32::MAX - 9)), 1);
    let before = clock.now_us();

    clock.counter().0.set(5);
    let after = clock.now_us();

    assert_eq!(after, (1u64 << 32) + 5);
    assert!(after > before);
    assert_eq!(after - before, 15);
}
