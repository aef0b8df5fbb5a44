// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Post-rollback resynchronisation with the companion microcontroller.
//!
//! After the flight process jumps backward it may believe it is armed with
//! stale actuator intent. Before anything else the companion gets an
//! explicit forced disarm.

use serde::Serialize;

use crate::bus::{Publisher, VehicleCommand, FORCE_DISARM_MAGIC, VEHICLE_CMD_COMPONENT_ARM_DISARM};
use crate::config::{DEFAULT_COMP_ID, DEFAULT_SYS_ID, PARAM_COMP_ID, PARAM_SYS_ID};
use crate::params::{get_id, ParamSource};
use crate::state::RecoveryState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResyncOutcome {
    /// No rollback marker and no resume: nothing sent.
    NotNeeded,
    Published,
    /// Publish failed; logged, the process carries on.
    Failed,
}

pub struct Resync {
    command: VehicleCommand,
}

impl Resync {
    /// Builds the disarm command once, from the configured ids.
    pub fn prepare<P: ParamSource + ?Sized>(params: &P) -> Self {
        let system = get_id(params, PARAM_SYS_ID, DEFAULT_SYS_ID);
        let component = get_id(params, PARAM_COMP_ID, DEFAULT_COMP_ID);
        Self {
            command: VehicleCommand {
                command: VEHICLE_CMD_COMPONENT_ARM_DISARM,
                param1: 0.0,
                param2: FORCE_DISARM_MAGIC,
                target_system: system,
                target_component: component,
                source_system: system,
                source_component: component,
                confirmation: 1,
                ..VehicleCommand::default()
            },
        }
    }

    pub fn command(&self) -> &VehicleCommand {
        &self.command
    }

    /// Publishes the forced disarm if the in-reboot marker is set or the
    /// session just reported a resume, then clears the marker.
    pub fn run<B: Publisher<VehicleCommand> + ?Sized>(
        &self,
        recovery: &RecoveryState,
        resumed: bool,
        bus: &mut B,
    ) -> ResyncOutcome {
        let in_reboot = recovery.in_reboot();
        if !in_reboot && !resumed {
            return ResyncOutcome::NotNeeded;
        }

        if resumed {
            tracing::info!(drift_us = recovery.drift_us().unwrap_or(0), "resumed from rollback, disarming companion");
        }

        let outcome = match bus.publish(&self.command) {
            Ok(()) => {
                tracing::info!(
                    target_system = self.command.target_system,
                    target_component = self.command.target_component,
                    "forced disarm published"
                );
                ResyncOutcome::Published
            }
            Err(e) => {
                tracing::warn!(error = %e, "forced disarm publish failed");
                ResyncOutcome::Failed
            }
        };
        recovery.set_in_reboot(false);
        outcome
    }
}
