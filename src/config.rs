// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Configuration constants and parameter keys.

/// Parameter: system id used as source/target of the forced-disarm command.
pub const PARAM_SYS_ID: &str = "MAV_SYS_ID";
/// Parameter: component id used as source/target of the forced-disarm command.
pub const PARAM_COMP_ID: &str = "MAV_COMP_ID";
/// Parameter: minimum time between automatic rollback checks, in microseconds.
pub const PARAM_REBOOT_PERIOD: &str = "YL_REBOOT_PERIOD";
pub const PARAM_PWM_DISARMED: &str = "PWM_DISARMED";
pub const PARAM_PWM_MIN: &str = "PWM_MIN";
pub const PARAM_PWM_MAX: &str = "PWM_MAX";

pub const DEFAULT_SYS_ID: u8 = 1;
pub const DEFAULT_COMP_ID: u8 = 1;

/// Default and floor for [`PARAM_REBOOT_PERIOD`].
pub const MIN_ROLLBACK_PERIOD_US: u64 = 1_000_000;

/// How often the rollback period parameter is re-read.
pub const PARAM_REFRESH_US: u64 = 2_000_000;

/// Word value of an erased flash cell.
pub const ERASED_WORD: u32 = 0xFFFF_FFFF;

/// Cycle counter ticks per microsecond on a 168 MHz core.
pub const DEFAULT_CYCLES_PER_US: u64 = 168;

/// Offset from `SIGRTMIN` of the signal that carries rollback notifications.
pub const DEFAULT_ROLLBACK_SIGNAL_OFFSET: i32 = 2;
