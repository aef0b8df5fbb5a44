// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use rewind_core::session::{Checkpoint, RollbackEvent, RollbackTimer, SessionState};
use rewind_core::trigger::TriggerState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Deserialize)]
pub struct TimerRequest {
    pub seconds: u32,
    #[serde(default)]
    pub periodic: bool,
}

#[derive(Serialize)]
pub struct OperationResponse {
    pub success: bool,
    pub strategy: &'static str,
    pub message: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub strategy: &'static str,
    /// Kernel strategy only.
    pub session_state: Option<SessionState>,
    pub checkpoint: Option<Checkpoint>,
    pub timer: Option<RollbackTimer>,
    /// Flash strategy only.
    pub mirrors_erased: Option<bool>,
    pub checkpoint_timestamp: u64,
    pub rollback_timestamp: u64,
    pub drift_us: Option<u64>,
    pub last_rollback: Option<RollbackEvent>,
    pub in_reboot: bool,
    pub snapshot_taken: bool,
    pub companion_synced: bool,
    pub triggers: TriggerState,
    pub rollback_period_us: u64,
    pub flight_cycle: u64,
    pub armed: bool,
    pub cycles: u64,
    pub disarms_published: u64,
}

#[derive(Serialize)]
pub struct InputAccepted {
    pub accepted: bool,
}

/// RC input as channel values in `[-1, 1]`, plus which channel feeds
/// each aux function.
#[derive(Deserialize)]
pub struct RcInput {
    pub channels: Vec<f32>,
    #[serde(default)]
    pub aux1_channel: Option<u8>,
    #[serde(default)]
    pub aux2_channel: Option<u8>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct ManualInput {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub r: f32,
    pub aux1: f32,
    pub aux2: f32,
}

#[derive(Deserialize)]
pub struct ArmedInput {
    pub armed: bool,
}

#[derive(Deserialize)]
pub struct ParamUpdate {
    pub name: String,
    pub value: i32,
}

#[derive(Serialize)]
pub struct ParamsResponse {
    pub params: BTreeMap<String, i32>,
}
