// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use rewind_core::bus::{ActuatorArmed, ManualControlSetpoint, RcChannels, RcFunction, RC_CHANNELS_MAX};
use rewind_core::clock::Clock;
use rewind_core::state::RecoveryState;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::*;
use crate::bus::NodeBus;
use crate::clock::MonotonicClock;
use crate::companion::spawn_companion;
use crate::config::NodeConfig;
use crate::controller::Controller;
use crate::errors::NodeError;
use crate::params::ParamTable;

pub type SharedController = Arc<Mutex<Controller>>;

#[derive(Clone)]
pub struct AppState {
    pub controller: SharedController,
    pub bus: Arc<NodeBus>,
    clock: MonotonicClock,
}

impl AppState {
    /// Builds the controller, brings up the companion and runs the
    /// start-of-process resync. Needs a tokio runtime.
    pub fn build(cfg: &NodeConfig, recovery: &'static RecoveryState) -> Result<Self, NodeError> {
        let bus = Arc::new(NodeBus::new());
        let mut controller = Controller::build(cfg, &bus, recovery)?;
        spawn_companion(bus.clone(), ParamTable::new(&cfg.params));
        let outcome = controller.start();
        tracing::info!(?outcome, "start-of-process resync");

        Ok(Self {
            controller: Arc::new(Mutex::new(controller)),
            bus,
            clock: MonotonicClock::new(),
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/checkpoint/save", post(checkpoint_save))
        .route("/v1/checkpoint/restore", post(checkpoint_restore))
        .route("/v1/checkpoint/timer", post(checkpoint_timer))
        .route("/v1/checkpoint/stop", post(checkpoint_stop))
        .route("/v1/checkpoint/done", post(checkpoint_done))
        .route("/v1/checkpoint/erase", post(checkpoint_erase))
        .route("/v1/status", get(status))
        .route("/v1/params", get(params_list).post(params_set))
        // Simulated vehicle inputs
        .route("/v1/inputs/rc", post(input_rc))
        .route("/v1/inputs/manual", post(input_manual))
        .route("/v1/inputs/armed", post(input_armed))
        // Observability
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Runs [`Controller::cycle`] at `cycle_hz` until the task is aborted.
pub fn spawn_control_loop(controller: SharedController, cycle_hz: u32) -> JoinHandle<()> {
    let period = Duration::from_micros(1_000_000 / u64::from(cycle_hz.max(1)));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let report = controller.lock().await.cycle();
            if report.resumed || report.restored {
                tracing::info!(cycle = report.cycle, resumed = report.resumed, restored = report.restored, "recovered");
            }
        }
    })
}

pub async fn run(cfg: NodeConfig, recovery: &'static RecoveryState) -> Result<(), NodeError> {
    let state = AppState::build(&cfg, recovery)?;
    let control = spawn_control_loop(state.controller.clone(), cfg.cycle_hz);

    let app = build_router(state);
    let listener = TcpListener::bind(cfg.bind_addr).await?;
    tracing::info!("Listening on {}", cfg.bind_addr);
    let served = axum::serve(listener, app).await;
    control.abort();
    Ok(served?)
}

fn reply(strategy: &'static str, message: impl Into<String>) -> Json<OperationResponse> {
    Json(OperationResponse { success: true, strategy, message: message.into() })
}

async fn checkpoint_save(State(state): State<AppState>) -> Result<Json<OperationResponse>, NodeError> {
    let mut controller = state.controller.lock().await;
    controller.save()?;
    Ok(reply(controller.strategy_name(), "checkpoint saved"))
}

async fn checkpoint_restore(State(state): State<AppState>) -> Result<Json<OperationResponse>, NodeError> {
    let mut controller = state.controller.lock().await;
    controller.restore()?;
    Ok(reply(controller.strategy_name(), "rollback requested"))
}

async fn checkpoint_timer(
    State(state): State<AppState>,
    Json(req): Json<TimerRequest>,
) -> Result<Json<OperationResponse>, NodeError> {
    let mut controller = state.controller.lock().await;
    controller.arm_timer(req.seconds, req.periodic)?;
    let kind = if req.periodic { "periodic" } else { "one-shot" };
    Ok(reply(controller.strategy_name(), format!("{} timer armed for {}s", kind, req.seconds)))
}

async fn checkpoint_stop(State(state): State<AppState>) -> Result<Json<OperationResponse>, NodeError> {
    let mut controller = state.controller.lock().await;
    controller.stop_timer()?;
    Ok(reply(controller.strategy_name(), "timer disarmed"))
}

async fn checkpoint_done(State(state): State<AppState>) -> Json<OperationResponse> {
    let mut controller = state.controller.lock().await;
    controller.done();
    reply(controller.strategy_name(), "in-reboot marker cleared")
}

async fn checkpoint_erase(State(state): State<AppState>) -> Result<Json<OperationResponse>, NodeError> {
    let mut controller = state.controller.lock().await;
    controller.erase()?;
    Ok(reply(controller.strategy_name(), "flash mirrors erased"))
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(state.controller.lock().await.status())
}

async fn params_list(State(state): State<AppState>) -> Json<ParamsResponse> {
    let controller = state.controller.lock().await;
    let params = controller.params().iter().map(|(k, v)| (k.to_string(), v)).collect();
    Json(ParamsResponse { params })
}

async fn params_set(
    State(state): State<AppState>,
    Json(req): Json<ParamUpdate>,
) -> Result<Json<ParamsResponse>, NodeError> {
    let mut controller = state.controller.lock().await;
    controller.set_param(&req.name, req.value)?;
    let params = controller.params().iter().map(|(k, v)| (k.to_string(), v)).collect();
    Ok(Json(ParamsResponse { params }))
}

async fn input_rc(State(state): State<AppState>, Json(req): Json<RcInput>) -> Json<InputAccepted> {
    let mut msg = RcChannels { timestamp_us: state.clock.now_us(), ..RcChannels::default() };
    let count = req.channels.len().min(RC_CHANNELS_MAX);
    msg.channels[..count].copy_from_slice(&req.channels[..count]);
    msg.channel_count = count as u8;
    let assign = |ch: Option<u8>| ch.and_then(|c| i8::try_from(c).ok()).unwrap_or(-1);
    msg.function[RcFunction::Aux1 as usize] = assign(req.aux1_channel);
    msg.function[RcFunction::Aux2 as usize] = assign(req.aux2_channel);
    state.bus.publish_rc(msg);
    Json(InputAccepted { accepted: true })
}

async fn input_manual(State(state): State<AppState>, Json(req): Json<ManualInput>) -> Json<InputAccepted> {
    state.bus.publish_manual(ManualControlSetpoint {
        timestamp_us: state.clock.now_us(),
        x: req.x,
        y: req.y,
        z: req.z,
        r: req.r,
        aux1: req.aux1,
        aux2: req.aux2,
    });
    Json(InputAccepted { accepted: true })
}

async fn input_armed(State(state): State<AppState>, Json(req): Json<ArmedInput>) -> Json<InputAccepted> {
    state.bus.publish_armed(ActuatorArmed {
        timestamp_us: state.clock.now_us(),
        armed: req.armed,
        prearmed: false,
    });
    Json(InputAccepted { accepted: true })
}

async fn metrics_handler() -> String {
    crate::telemetry::get_metrics()
}
