// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::process::ExitCode;

use rewind_node::config::NodeConfig;
use rewind_node::telemetry::init_telemetry;
use rewind_node::RECOVERY;

#[tokio::main]
async fn main() -> ExitCode {
    init_telemetry();

    let cfg = match NodeConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("Initializing rewind node with config: {:?}", cfg);

    if let Err(e) = rewind_node::server::run(cfg, &RECOVERY).await {
        tracing::error!("node stopped: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
