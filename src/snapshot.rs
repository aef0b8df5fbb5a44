// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Flash-mirrored snapshot of the process's volatile memory.
//!
//! One save per erase: the mirror is single-use flash, so a second save
//! fails with [`StoreError::AlreadyUsed`] until the device is erased
//! externally.

use crate::error::{StoreError, StoreResult};
use crate::region::RegionProvider;
use crate::state::RecoveryState;

pub struct SnapshotStore<'a, P> {
    provider: P,
    recovery: &'a RecoveryState,
}

impl<'a, P: RegionProvider> SnapshotStore<'a, P> {
    pub fn new(provider: P, recovery: &'a RecoveryState) -> Self {
        Self { provider, recovery }
    }

    /// Copies every region into its mirror. Synchronous flash I/O: the
    /// caller's loop stalls for the length of the write.
    ///
    /// The in-reboot marker is raised for the duration of the copy, so the
    /// captured image carries it and a later restore wakes up resyncing.
    pub fn save(&mut self) -> StoreResult<usize> {
        tracing::info!("storing snapshot");

        // 1. Every mirror must be erased before anything is written.
        let count = self.provider.regions().len();
        for idx in 0..count {
            if !self.provider.is_erased(idx) {
                tracing::error!(region = self.provider.regions()[idx].name, "section already used");
                return Err(StoreError::AlreadyUsed);
            }
        }

        // 2. Copy in fixed order under the marker.
        self.recovery.set_in_reboot(true);
        let mut written = 0;
        let mut result = Ok(());
        for idx in 0..count {
            match self.provider.write_mirror(idx) {
                Ok(n) => written += n,
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        self.recovery.set_in_reboot(false);

        match result {
            Ok(()) => {
                tracing::info!(bytes = written, "snapshot stored");
                Ok(written)
            }
            Err(e) => {
                tracing::error!(error = %e, bytes = written, "snapshot store failed");
                Err(e)
            }
        }
    }

    /// Copies every mirror back into live memory in the same order as
    /// [`save`](Self::save). Only call when [`snapshot_safe`](Self::snapshot_safe).
    pub fn restore(&mut self) {
        for idx in 0..self.provider.regions().len() {
            self.provider.read_mirror(idx);
        }
        // The image was captured mid-save; the marker is live again.
        self.recovery.set_in_reboot(true);
        tracing::info!("snapshot restored");
    }

    /// Whether the companion microcontroller has finished its handshake.
    pub fn snapshot_safe(&self) -> bool {
        self.recovery.companion_synced()
    }

    /// Whether a save would currently succeed.
    pub fn mirrors_erased(&self) -> bool {
        (0..self.provider.regions().len()).all(|idx| self.provider.is_erased(idx))
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    pub fn recovery(&self) -> &'a RecoveryState {
        self.recovery
    }
}
