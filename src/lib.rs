// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
#![no_std]

//! rewind-core: checkpoint/rollback orchestration for a flight-control process.
//!
//! Two recovery strategies share one interface: a flash-mirrored memory
//! snapshot ([`snapshot::SnapshotStore`]) and a kernel-assisted checkpoint
//! session ([`session::SessionManager`]). Everything that has to survive a
//! restart or a rollback lives in [`state::RecoveryState`].

extern crate alloc;

#[cfg(any(test, feature = "std"))]
#[macro_use]
extern crate std;

pub mod config;
pub mod error;
pub mod state;
pub mod clock;
pub mod region;
pub mod snapshot;
pub mod bus;
pub mod params;
pub mod trigger;
pub mod device;
pub mod notify;
pub mod session;
pub mod resync;
pub mod strategy;

#[cfg(test)]
pub mod tests;
