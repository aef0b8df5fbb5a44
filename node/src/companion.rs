// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Stand-in for the companion microcontroller.
//!
//! Announces its arming state once at start (the handshake), then answers
//! arm/disarm commands by driving its outputs and reporting back.

use std::sync::Arc;

use rewind_core::bus::{ActuatorArmed, VEHICLE_CMD_COMPONENT_ARM_DISARM};
use rewind_core::config::{PARAM_PWM_DISARMED, PARAM_PWM_MIN};
use rewind_core::params::ParamSource;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::bus::NodeBus;
use crate::params::ParamTable;

pub fn spawn_companion(bus: Arc<NodeBus>, params: ParamTable) -> JoinHandle<()> {
    let mut commands = bus.subscribe_commands();
    let pwm_disarmed = params.get_i32(PARAM_PWM_DISARMED).unwrap_or(900);
    let pwm_min = params.get_i32(PARAM_PWM_MIN).unwrap_or(1000);

    bus.publish_armed(ActuatorArmed::default());
    tracing::debug!("companion announced");

    tokio::spawn(async move {
        loop {
            let cmd = match commands.recv().await {
                Ok(cmd) => cmd,
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "companion lagged behind command topic");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            if cmd.command != VEHICLE_CMD_COMPONENT_ARM_DISARM {
                continue;
            }

            let armed = cmd.param1 > 0.5;
            let pwm = if armed { pwm_min } else { pwm_disarmed };
            tracing::info!(armed, pwm, forced = cmd.param2 != 0.0, "companion outputs updated");
            bus.publish_armed(ActuatorArmed {
                timestamp_us: cmd.timestamp_us,
                armed,
                prearmed: false,
            });
        }
    })
}
