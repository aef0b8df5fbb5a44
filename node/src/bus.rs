// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! In-process message bus. Input topics are `watch` channels (latest value
//! wins, matching the poll/copy model); vehicle commands go out on a
//! `broadcast` channel so every listener sees each one.

use rewind_core::bus::{ActuatorArmed, ManualControlSetpoint, Publisher, RcChannels, Subscriber, VehicleCommand};
use rewind_core::error::BusError;
use tokio::sync::{broadcast, watch};

const COMMAND_CAPACITY: usize = 16;

pub struct NodeBus {
    rc: watch::Sender<RcChannels>,
    manual: watch::Sender<ManualControlSetpoint>,
    armed: watch::Sender<ActuatorArmed>,
    commands: broadcast::Sender<VehicleCommand>,
}

impl NodeBus {
    pub fn new() -> Self {
        let (rc, _) = watch::channel(RcChannels::default());
        let (manual, _) = watch::channel(ManualControlSetpoint::default());
        let (armed, _) = watch::channel(ActuatorArmed::default());
        let (commands, _) = broadcast::channel(COMMAND_CAPACITY);
        Self { rc, manual, armed, commands }
    }

    pub fn publish_rc(&self, msg: RcChannels) {
        self.rc.send_replace(msg);
    }

    pub fn publish_manual(&self, msg: ManualControlSetpoint) {
        self.manual.send_replace(msg);
    }

    pub fn publish_armed(&self, msg: ActuatorArmed) {
        self.armed.send_replace(msg);
    }

    pub fn rc_subscriber(&self) -> WatchSubscriber<RcChannels> {
        WatchSubscriber { rx: self.rc.subscribe() }
    }

    pub fn manual_subscriber(&self) -> WatchSubscriber<ManualControlSetpoint> {
        WatchSubscriber { rx: self.manual.subscribe() }
    }

    pub fn armed_subscriber(&self) -> WatchSubscriber<ActuatorArmed> {
        WatchSubscriber { rx: self.armed.subscribe() }
    }

    pub fn command_publisher(&self) -> CommandPublisher {
        CommandPublisher { tx: self.commands.clone() }
    }

    pub fn subscribe_commands(&self) -> broadcast::Receiver<VehicleCommand> {
        self.commands.subscribe()
    }
}

impl Default for NodeBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Only values sent after the subscription count as updates.
pub struct WatchSubscriber<T> {
    rx: watch::Receiver<T>,
}

impl<T: Clone> Subscriber<T> for WatchSubscriber<T> {
    fn updated(&mut self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    fn copy(&mut self) -> T {
        self.rx.borrow_and_update().clone()
    }
}

#[derive(Clone)]
pub struct CommandPublisher {
    tx: broadcast::Sender<VehicleCommand>,
}

impl Publisher<VehicleCommand> for CommandPublisher {
    fn publish(&mut self, msg: &VehicleCommand) -> Result<(), BusError> {
        self.tx.send(*msg).map(|_| ()).map_err(|_| BusError::NoSubscribers)
    }
}
