// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Publish/subscribe seam and the topics this crate touches.

use serde::{Deserialize, Serialize};

use crate::error::BusError;

pub const RC_CHANNELS_MAX: usize = 18;

/// `COMPONENT_ARM_DISARM`.
pub const VEHICLE_CMD_COMPONENT_ARM_DISARM: u32 = 400;
/// `param2` value that forces a disarm even in flight.
pub const FORCE_DISARM_MAGIC: f32 = 21196.0;

/// Roles an RC channel can be assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum RcFunction {
    Throttle = 0,
    Roll,
    Pitch,
    Yaw,
    Mode,
    Aux1,
    Aux2,
}

impl RcFunction {
    pub const COUNT: usize = 7;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RcChannels {
    pub timestamp_us: u64,
    /// Normalised channel values in `[-1, 1]`.
    pub channels: [f32; RC_CHANNELS_MAX],
    pub channel_count: u8,
    /// Channel index per [`RcFunction`], `-1` when unassigned.
    pub function: [i8; RcFunction::COUNT],
}

impl RcChannels {
    /// Value of the channel assigned to `f`, if any.
    pub fn value(&self, f: RcFunction) -> Option<f32> {
        let ch = self.function[f as usize];
        if ch < 0 || ch as u8 >= self.channel_count {
            return None;
        }
        self.channels.get(ch as usize).copied()
    }
}

impl Default for RcChannels {
    fn default() -> Self {
        Self {
            timestamp_us: 0,
            channels: [0.0; RC_CHANNELS_MAX],
            channel_count: 0,
            function: [-1; RcFunction::COUNT],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualControlSetpoint {
    pub timestamp_us: u64,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub r: f32,
    pub aux1: f32,
    pub aux2: f32,
}

/// Arming state as reported by the actuator side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorArmed {
    pub timestamp_us: u64,
    pub armed: bool,
    pub prearmed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleCommand {
    pub timestamp_us: u64,
    pub command: u32,
    pub param1: f32,
    pub param2: f32,
    pub param3: f32,
    pub param4: f32,
    pub param5: f32,
    pub param6: f32,
    pub param7: f32,
    pub target_system: u8,
    pub target_component: u8,
    pub source_system: u8,
    pub source_component: u8,
    pub confirmation: u8,
}

/// Subscribe/check/copy view of one topic.
pub trait Subscriber<T> {
    /// Whether a message arrived since the last [`copy`](Self::copy).
    fn updated(&mut self) -> bool;

    /// Latest message; marks it seen.
    fn copy(&mut self) -> T;

    /// Non-blocking: `Some` only if something new arrived.
    fn poll(&mut self) -> Option<T> {
        if self.updated() {
            Some(self.copy())
        } else {
            None
        }
    }
}

pub trait Publisher<T> {
    fn publish(&mut self, msg: &T) -> Result<(), BusError>;
}
