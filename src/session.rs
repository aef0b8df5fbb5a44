// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Client-side state machine for a kernel-assisted checkpoint.
//!
//! ```text
//! Closed -> Opened -> Checkpointed -> (TimerArmed)* -> RolledBack
//! ```
//!
//! Failures never cause a partial transition: the session stays in the
//! state it was in and the caller decides whether to re-issue.

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::device::{CheckpointDevice, CheckpointDriver, CheckpointId, RollbackAck, SignalTarget};
use crate::error::{SessionError, SessionResult};
use crate::state::RecoveryState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Closed,
    Opened,
    Checkpointed,
    TimerArmed,
    RolledBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub pid: u32,
    pub created_at_us: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackTimer {
    pub duration_secs: u32,
    pub periodic: bool,
}

/// A rollback observed by the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackEvent {
    pub checkpoint: CheckpointId,
    pub checkpoint_timestamp: u64,
    pub rollback_timestamp: u64,
}

pub struct SessionManager<'a, D: CheckpointDriver, C> {
    driver: D,
    device: Option<D::Device>,
    clock: C,
    recovery: &'a RecoveryState,
    target: SignalTarget,
    state: SessionState,
    checkpoint: Option<Checkpoint>,
    timer: Option<RollbackTimer>,
}

impl<'a, D: CheckpointDriver, C: Clock> SessionManager<'a, D, C> {
    pub fn new(driver: D, clock: C, recovery: &'a RecoveryState, target: SignalTarget) -> Self {
        Self {
            driver,
            device: None,
            clock,
            recovery,
            target,
            state: SessionState::Closed,
            checkpoint: None,
            timer: None,
        }
    }

    // --- Read APIs ---

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn checkpoint(&self) -> Option<Checkpoint> {
        self.checkpoint
    }

    pub fn timer(&self) -> Option<RollbackTimer> {
        self.timer
    }

    pub fn recovery(&self) -> &'a RecoveryState {
        self.recovery
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn device(&self) -> Option<&D::Device> {
        self.device.as_ref()
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    // --- Lifecycle ---

    /// Acquires the checkpoint device. A second `open` without `close` is
    /// rejected rather than leaking the first handle.
    pub fn open(&mut self) -> SessionResult<()> {
        if self.device.is_some() {
            return Err(SessionError::NotReady);
        }
        match self.driver.open() {
            Ok(device) => {
                self.device = Some(device);
                self.state = SessionState::Opened;
                tracing::debug!("checkpoint device opened");
                Ok(())
            }
            Err(status) => {
                tracing::error!(status = status.0, "checkpoint device unavailable");
                Err(SessionError::DeviceUnavailable(status))
            }
        }
    }

    /// Releases the device handle. The kernel tears down its checkpoints.
    pub fn close(&mut self) {
        self.device = None;
        self.checkpoint = None;
        self.timer = None;
        self.state = SessionState::Closed;
    }

    // --- Operations ---

    /// Takes a new checkpoint of the calling process.
    ///
    /// The checkpoint timestamp is written before the request is issued: if
    /// a rollback later targets this checkpoint, execution comes back out of
    /// this call and the pre-call stamp is the only marker of that instant.
    pub fn create_checkpoint(&mut self) -> SessionResult<Checkpoint> {
        if self.state == SessionState::TimerArmed {
            return Err(SessionError::NotReady);
        }
        let device = self.device.as_mut().ok_or(SessionError::NotReady)?;

        let now = self.clock.now_us();
        let previous = self.recovery.stamp_checkpoint(now);

        let id = match device.create_checkpoint(self.target.pid) {
            Ok(id) => id,
            Err(status) => {
                self.recovery.stamp_checkpoint(previous);
                tracing::error!(status = status.0, "checkpoint creation failed");
                return Err(SessionError::Io(status));
            }
        };

        if let Err(status) = device.capture_rollback_signal(id, self.target.thread_id, self.target.signal) {
            tracing::warn!(
                checkpoint = id.0,
                status = status.0,
                "rollback signal not registered; timer rollbacks will go unnoticed"
            );
        }

        let checkpoint = Checkpoint { id, pid: self.target.pid, created_at_us: now };
        self.checkpoint = Some(checkpoint);
        self.state = SessionState::Checkpointed;

        if self.recovery.resumed_from_rollback() {
            tracing::info!(
                checkpoint = id.0,
                checkpoint_ts = self.recovery.checkpoint_timestamp(),
                rollback_ts = self.recovery.rollback_timestamp(),
                "resumed from rollback"
            );
        } else {
            tracing::info!(checkpoint = id.0, at_us = now, "checkpoint created");
        }
        Ok(checkpoint)
    }

    /// Arms (or re-arms) the rollback timer for the current checkpoint.
    pub fn arm_timer(&mut self, duration_secs: u32, periodic: bool) -> SessionResult<()> {
        if duration_secs == 0 {
            return Err(SessionError::InvalidDuration);
        }
        let checkpoint = self.checkpoint.ok_or(SessionError::NotReady)?;
        let device = self.device.as_mut().ok_or(SessionError::NotReady)?;

        device
            .arm_timer(checkpoint.id, duration_secs, periodic)
            .map_err(SessionError::Io)?;

        let timer = RollbackTimer { duration_secs, periodic };
        if let Some(previous) = self.timer.replace(timer) {
            tracing::debug!(previous_secs = previous.duration_secs, "rollback timer replaced");
        }
        self.state = SessionState::TimerArmed;
        tracing::info!(checkpoint = checkpoint.id.0, duration_secs, periodic, "rollback timer armed");
        Ok(())
    }

    /// Cancels the pending timer. Once a timer has fired there is nothing
    /// left to cancel.
    pub fn disarm_timer(&mut self) -> SessionResult<()> {
        if self.timer.is_none() {
            return Err(SessionError::NoActiveTimer);
        }
        let checkpoint = self.checkpoint.ok_or(SessionError::NoActiveTimer)?;
        let device = self.device.as_mut().ok_or(SessionError::NotReady)?;

        device.disarm_timer(checkpoint.id).map_err(SessionError::Io)?;

        self.timer = None;
        self.state = SessionState::Checkpointed;
        tracing::info!(checkpoint = checkpoint.id.0, "rollback timer disarmed");
        Ok(())
    }

    /// Synchronous rollback to the current checkpoint.
    ///
    /// Against a real kernel this call does not come back: execution resumes
    /// out of [`create_checkpoint`](Self::create_checkpoint). When the device
    /// does return, the rollback is recorded exactly as the signal handler
    /// would and picked up by the next [`poll_rollback`](Self::poll_rollback).
    pub fn rollback(&mut self) -> SessionResult<()> {
        let checkpoint = self.checkpoint.ok_or(SessionError::NoCheckpoint)?;
        let device = self.device.as_mut().ok_or(SessionError::NotReady)?;

        device.rollback(checkpoint.id).map_err(SessionError::Io)?;

        let ts = match device.read_clock(checkpoint.id) {
            Ok(ts) if ts > self.recovery.checkpoint_timestamp() => ts,
            _ => self.clock.now_us().max(self.recovery.checkpoint_timestamp() + 1),
        };
        self.recovery.record_rollback(ts);
        self.recovery.post_rollback(checkpoint.id);
        Ok(())
    }

    /// Drains the rollback notification slot. Runs in control-loop context,
    /// never inside the signal handler.
    pub fn poll_rollback(&mut self) -> Option<RollbackEvent> {
        let id = self.recovery.take_pending_rollback()?;

        match self.checkpoint {
            Some(cp) if cp.id == id => {}
            _ => tracing::warn!(checkpoint = id.0, "rollback notification for unknown checkpoint"),
        }

        if matches!(self.timer, Some(t) if !t.periodic) {
            self.timer = None;
        }
        self.state = if self.timer.is_some() {
            SessionState::TimerArmed
        } else {
            SessionState::RolledBack
        };

        let event = RollbackEvent {
            checkpoint: id,
            checkpoint_timestamp: self.recovery.checkpoint_timestamp(),
            rollback_timestamp: self.recovery.rollback_timestamp(),
        };
        tracing::info!(
            checkpoint = id.0,
            drift_us = event.rollback_timestamp.saturating_sub(event.checkpoint_timestamp),
            "rollback completed"
        );
        Some(event)
    }
}
