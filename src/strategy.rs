// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! One interface over the two recovery mechanisms. A deployment picks one;
//! neither is layered on the other.

use crate::clock::Clock;
use crate::device::CheckpointDriver;
use crate::error::RecoveryError;
use crate::region::RegionProvider;
use crate::session::{SessionManager, SessionState};
use crate::snapshot::SnapshotStore;

pub trait RecoveryStrategy {
    fn name(&self) -> &'static str;

    /// Captures the current state.
    fn snapshot(&mut self) -> Result<(), RecoveryError>;

    /// Returns to the captured state.
    fn restore(&mut self) -> Result<(), RecoveryError>;
}

impl<P: RegionProvider> RecoveryStrategy for SnapshotStore<'_, P> {
    fn name(&self) -> &'static str {
        "flash"
    }

    fn snapshot(&mut self) -> Result<(), RecoveryError> {
        self.save()?;
        Ok(())
    }

    fn restore(&mut self) -> Result<(), RecoveryError> {
        if !self.snapshot_safe() {
            return Err(RecoveryError::NotSafe);
        }
        SnapshotStore::restore(self);
        Ok(())
    }
}

impl<D: CheckpointDriver, C: Clock> RecoveryStrategy for SessionManager<'_, D, C> {
    fn name(&self) -> &'static str {
        "kernel"
    }

    fn snapshot(&mut self) -> Result<(), RecoveryError> {
        if self.state() == SessionState::Closed {
            self.open()?;
        }
        self.create_checkpoint()?;
        Ok(())
    }

    fn restore(&mut self) -> Result<(), RecoveryError> {
        self.rollback()?;
        Ok(())
    }
}
