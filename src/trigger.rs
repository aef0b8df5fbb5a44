// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Manual snapshot/rollback triggers.
//!
//! Two aux inputs are repurposed as booleans: aux 1 requests a rollback,
//! aux 2 a snapshot. Sampling is non-blocking and holds the last value when
//! nothing new arrived.

use alloc::boxed::Box;

use serde::{Deserialize, Serialize};

use crate::bus::{ManualControlSetpoint, RcChannels, RcFunction, Subscriber};
use crate::config::{MIN_ROLLBACK_PERIOD_US, PARAM_REBOOT_PERIOD, PARAM_REFRESH_US};
use crate::params::ParamSource;
use crate::state::RecoveryState;

/// Values strictly above this are active.
pub const TRIGGER_THRESHOLD: f32 = 0.5;

pub fn is_active(value: f32) -> bool {
    value > TRIGGER_THRESHOLD
}

/// Maps an RC channel from `[-1, 1]` onto `[0, 1]`.
pub fn normalize_rc(raw: f32) -> f32 {
    0.5 * raw + 0.5
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerState {
    pub snapshot_requested: bool,
    pub rollback_requested: bool,
}

/// One interchangeable input for the triggers.
pub trait TriggerSource {
    /// `None` when no new message arrived this cycle.
    fn sample(&mut self) -> Option<TriggerState>;
}

impl<T: TriggerSource + ?Sized> TriggerSource for Box<T> {
    fn sample(&mut self) -> Option<TriggerState> {
        (**self).sample()
    }
}

/// Raw RC channels; the aux functions select which channel feeds which
/// trigger. An unassigned function reads as inactive.
pub struct RcChannelSource<S> {
    sub: S,
}

impl<S: Subscriber<RcChannels>> RcChannelSource<S> {
    pub fn new(sub: S) -> Self {
        Self { sub }
    }
}

impl<S: Subscriber<RcChannels>> TriggerSource for RcChannelSource<S> {
    fn sample(&mut self) -> Option<TriggerState> {
        let rc = self.sub.poll()?;
        let active = |f| rc.value(f).map_or(false, |v| is_active(normalize_rc(v)));
        Some(TriggerState {
            rollback_requested: active(RcFunction::Aux1),
            snapshot_requested: active(RcFunction::Aux2),
        })
    }
}

/// Manual-control setpoint; aux values are already normalised.
pub struct ManualControlSource<S> {
    sub: S,
}

impl<S: Subscriber<ManualControlSetpoint>> ManualControlSource<S> {
    pub fn new(sub: S) -> Self {
        Self { sub }
    }
}

impl<S: Subscriber<ManualControlSetpoint>> TriggerSource for ManualControlSource<S> {
    fn sample(&mut self) -> Option<TriggerState> {
        let manual = self.sub.poll()?;
        Some(TriggerState {
            rollback_requested: is_active(manual.aux1),
            snapshot_requested: is_active(manual.aux2),
        })
    }
}

pub struct TriggerPoller<S> {
    source: S,
    state: TriggerState,
}

impl<S: TriggerSource> TriggerPoller<S> {
    pub fn new(source: S) -> Self {
        Self { source, state: TriggerState::default() }
    }

    /// Samples the source once; keeps the previous state if nothing arrived.
    pub fn poll(&mut self) -> TriggerState {
        if let Some(sample) = self.source.sample() {
            self.state = sample;
        }
        self.state
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }
}

/// Rate-limits the automatic rollback check and makes the snapshot trigger
/// one-shot. Built on the control loop's clock, not a kernel timer.
pub struct TriggerPolicy {
    period_us: u64,
    last_param_read: Option<u64>,
}

impl TriggerPolicy {
    pub fn new() -> Self {
        Self { period_us: MIN_ROLLBACK_PERIOD_US, last_param_read: None }
    }

    pub fn period_us(&self) -> u64 {
        self.period_us
    }

    fn refresh<P: ParamSource + ?Sized>(&mut self, now_us: u64, params: &P) {
        let due = match self.last_param_read {
            None => true,
            Some(t) => now_us.saturating_sub(t) > PARAM_REFRESH_US,
        };
        if !due {
            return;
        }
        let period = params
            .get_i32(PARAM_REBOOT_PERIOD)
            .map_or(MIN_ROLLBACK_PERIOD_US, |v| v.max(0) as u64);
        self.period_us = period.max(MIN_ROLLBACK_PERIOD_US);
        self.last_param_read = Some(now_us);
    }

    /// Returns `true` when a rollback should be performed this cycle.
    /// Nothing is sampled before `boot_complete` or within one period of the
    /// last action.
    pub fn poll_rollback<S, P>(
        &mut self,
        now_us: u64,
        boot_complete: bool,
        params: &P,
        poller: &mut TriggerPoller<S>,
        recovery: &RecoveryState,
    ) -> bool
    where
        S: TriggerSource,
        P: ParamSource + ?Sized,
    {
        if !boot_complete {
            return false;
        }
        self.refresh(now_us, params);

        if now_us.saturating_sub(recovery.last_action_us()) <= self.period_us {
            return false;
        }
        if !poller.poll().rollback_requested {
            return false;
        }
        recovery.set_last_action_us(now_us);
        tracing::info!(at_us = now_us, "restore detected");
        true
    }

    /// Returns `true` at most once per erase: the first cycle a snapshot is
    /// requested.
    pub fn poll_snapshot<S: TriggerSource>(
        &mut self,
        poller: &mut TriggerPoller<S>,
        recovery: &RecoveryState,
    ) -> bool {
        if recovery.snapshot_taken() {
            return false;
        }
        if !poller.poll().snapshot_requested {
            return false;
        }
        recovery.mark_snapshot_taken();
        tracing::info!(last_action_us = recovery.last_action_us(), "save detected");
        true
    }
}

impl Default for TriggerPolicy {
    fn default() -> Self {
        Self::new()
    }
}
