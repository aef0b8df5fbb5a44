// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::sync::OnceLock;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub const CHECKPOINTS_CREATED: &str = "rewind_checkpoints_created_total";
pub const ROLLBACKS: &str = "rewind_rollbacks_total";
pub const SNAPSHOTS_SAVED: &str = "rewind_snapshots_saved_total";
pub const DISARM_PUBLISHED: &str = "rewind_disarm_published_total";
pub const ROLLBACK_DRIFT: &str = "rewind_rollback_drift_us";
pub const CYCLE_DURATION: &str = "rewind_cycle_duration_seconds";

/// Initialize telemetry (logs + metrics)
pub fn init_telemetry() {
    // 1. Logs
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "rewind_node=debug,rewind_core=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Metrics
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROM_HANDLE.set(handle).is_err() {
                tracing::warn!("Prometheus handle already set. Telemetry re-initialized?");
            }
        }
        Err(e) => tracing::warn!("metrics recorder not installed: {}", e),
    }

    metrics::describe_counter!(CHECKPOINTS_CREATED, "Checkpoints and flash snapshots taken");
    metrics::describe_counter!(ROLLBACKS, "Rollbacks observed by the control loop");
    metrics::describe_counter!(SNAPSHOTS_SAVED, "Flash snapshots written");
    metrics::describe_counter!(DISARM_PUBLISHED, "Forced-disarm commands sent to the companion");
    metrics::describe_gauge!(ROLLBACK_DRIFT, "Rollback timestamp minus checkpoint timestamp of the last rollback");
    metrics::describe_histogram!(CYCLE_DURATION, "Time spent in one control cycle");

    metrics::gauge!("rewind_node_up", 1.0);
}

/// Get the Prometheus handle to render metrics
pub fn get_metrics() -> String {
    if let Some(handle) = PROM_HANDLE.get() {
        handle.render()
    } else {
        "# metrics not initialized".to_string()
    }
}
