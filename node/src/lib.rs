// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use rewind_core::state::RecoveryState;

pub mod config;
pub mod errors;
pub mod api;
pub mod params;
pub mod telemetry;
pub mod bus;
pub mod clock;
pub mod sim;
pub mod driver;
pub mod controller;
pub mod companion;
pub mod server;

#[cfg(target_os = "linux")]
pub mod device;
#[cfg(target_os = "linux")]
pub mod signal;

/// Process-wide recovery state. The rollback signal handler reaches it
/// without any other context, so there is exactly one.
pub static RECOVERY: RecoveryState = RecoveryState::new();
