// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! The control loop: one [`Controller::cycle`] per tick.
//!
//! Each cycle, in order:
//! 1. companion arming state (first message completes the handshake)
//! 2. rollbacks delivered since the last cycle
//! 3. rollback and snapshot triggers
//! 4. post-rollback resynchronisation
//! 5. flight image update and recovery record flush

use std::sync::{Arc, Mutex};
use std::time::Instant;

use rewind_core::bus::{ActuatorArmed, Subscriber};
use rewind_core::clock::Clock;
use rewind_core::device::SignalTarget;
use rewind_core::resync::{Resync, ResyncOutcome};
use rewind_core::session::{RollbackEvent, SessionManager};
use rewind_core::snapshot::SnapshotStore;
use rewind_core::state::{RecoveryRecord, RecoveryState};
use rewind_core::strategy::RecoveryStrategy;
use rewind_core::trigger::{ManualControlSource, RcChannelSource, TriggerPolicy, TriggerPoller, TriggerSource};
use rewind_persistence::{FlashImageProvider, RecordFile};

use crate::api::StatusResponse;
use crate::bus::{CommandPublisher, NodeBus, WatchSubscriber};
use crate::clock::MonotonicClock;
use crate::config::{NodeConfig, StrategyKind, TriggerSourceKind};
use crate::driver::NodeDriver;
use crate::errors::NodeError;
use crate::params::ParamTable;
use crate::sim::{lock, ProcessImage, SimulatedDriver};
use crate::telemetry::{CHECKPOINTS_CREATED, CYCLE_DURATION, DISARM_PUBLISHED, ROLLBACKS, ROLLBACK_DRIFT, SNAPSHOTS_SAVED};

/// The slice of flight state kept at the start of the first region, so a
/// rollback is visible from outside.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlightImage {
    pub cycle: u64,
    pub armed: bool,
}

impl FlightImage {
    pub const SIZE: usize = 8 + 8; // 16 bytes

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..8].copy_from_slice(&self.cycle.to_le_bytes());
        buf[8] = u8::from(self.armed);
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        if buf.len() < Self::SIZE {
            return Self::default();
        }
        let mut cycle = [0u8; 8];
        cycle.copy_from_slice(&buf[0..8]);
        Self {
            cycle: u64::from_le_bytes(cycle),
            armed: buf[8] != 0,
        }
    }
}

pub type KernelSession = SessionManager<'static, NodeDriver, MonotonicClock>;

/// The recovery strategy this node was configured with.
pub enum Recovery {
    Flash(SnapshotStore<'static, FlashImageProvider>),
    Kernel {
        session: KernelSession,
        image: ProcessImage,
    },
}

impl Recovery {
    pub fn strategy(&mut self) -> &mut dyn RecoveryStrategy {
        match self {
            Recovery::Flash(store) => store,
            Recovery::Kernel { session, .. } => session,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Recovery::Flash(_) => StrategyKind::Flash.as_str(),
            Recovery::Kernel { .. } => StrategyKind::Kernel.as_str(),
        }
    }

    fn load_image(&self) -> FlightImage {
        match self {
            Recovery::Flash(store) => FlightImage::from_bytes(store.provider().live(0)),
            Recovery::Kernel { image, .. } => FlightImage::from_bytes(&lock(image)),
        }
    }

    /// A kernel image restored by a rollback that no cycle has drained yet
    /// is left alone: the next cycle resumes from it.
    fn store_image(&mut self, recovery: &RecoveryState, flight: &FlightImage) {
        let bytes = flight.to_bytes();
        match self {
            Recovery::Flash(store) => store.provider_mut().live_mut(0)[..FlightImage::SIZE].copy_from_slice(&bytes),
            Recovery::Kernel { image, .. } => {
                let mut image = lock(image);
                if recovery.rollback_pending() {
                    tracing::debug!("rollback pending, flight image not written");
                    return;
                }
                image[..FlightImage::SIZE].copy_from_slice(&bytes);
            }
        }
    }
}

/// What one control cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub resumed: bool,
    pub restored: bool,
    pub snapshot_saved: bool,
    pub resync: ResyncOutcome,
}

pub struct Controller {
    recovery: &'static RecoveryState,
    backend: Recovery,
    poller: TriggerPoller<Box<dyn TriggerSource + Send>>,
    policy: TriggerPolicy,
    resync: Resync,
    armed: WatchSubscriber<ActuatorArmed>,
    commands: CommandPublisher,
    params: ParamTable,
    record: Option<RecordFile>,
    last_record: Option<RecoveryRecord>,
    clock: MonotonicClock,
    flight: FlightImage,
    boot_cycles: u64,
    cycles: u64,
    disarms_published: u64,
    last_rollback: Option<RollbackEvent>,
}

#[cfg(target_os = "linux")]
fn rollback_signal(offset: i32) -> i32 {
    crate::signal::rollback_signal(offset)
}

#[cfg(not(target_os = "linux"))]
fn rollback_signal(offset: i32) -> i32 {
    34 + offset
}

#[cfg(target_os = "linux")]
fn device_driver(cfg: &NodeConfig, recovery: &'static RecoveryState, signal: i32) -> Result<NodeDriver, NodeError> {
    if !std::ptr::eq(recovery, &crate::RECOVERY) {
        return Err(NodeError::Config("the checkpoint device needs the process-wide recovery state".into()));
    }
    Ok(NodeDriver::Linux(crate::device::LinuxCheckpointDriver::new(cfg.device_path.clone(), signal)))
}

#[cfg(not(target_os = "linux"))]
fn device_driver(_cfg: &NodeConfig, _recovery: &'static RecoveryState, _signal: i32) -> Result<NodeDriver, NodeError> {
    Err(NodeError::Config("the checkpoint device is only available on Linux".into()))
}

impl Controller {
    pub fn build(cfg: &NodeConfig, bus: &NodeBus, recovery: &'static RecoveryState) -> Result<Self, NodeError> {
        cfg.validate()?;
        let params = ParamTable::new(&cfg.params);

        // 1. Recovery record from the previous run.
        let (record, clock) = match &cfg.record_path {
            Some(path) => {
                let file = RecordFile::open(path)?;
                let clock = match file.load() {
                    Ok(Some(saved)) => {
                        recovery.load_record(&saved);
                        tracing::info!(
                            in_reboot = saved.in_reboot,
                            snapshot_taken = saved.snapshot_taken,
                            "recovery record loaded"
                        );
                        MonotonicClock::resume_after(&saved)
                    }
                    Ok(None) => MonotonicClock::new(),
                    Err(e) => {
                        tracing::warn!(error = %e, "recovery record unreadable, starting fresh");
                        MonotonicClock::new()
                    }
                };
                (Some(file), clock)
            }
            None => (None, MonotonicClock::new()),
        };

        // 2. Strategy.
        let backend = match cfg.strategy {
            StrategyKind::Flash => {
                let layout = [("sram", cfg.region_sizes.sram), ("ccm", cfg.region_sizes.ccm)];
                let provider = FlashImageProvider::open(&cfg.flash_image_path, &layout)?;
                Recovery::Flash(SnapshotStore::new(provider, recovery))
            }
            StrategyKind::Kernel => {
                let image: ProcessImage = Arc::new(Mutex::new(vec![0u8; cfg.region_sizes.sram]));
                let signal = rollback_signal(cfg.rollback_signal_offset);
                let driver = if cfg.simulate_device {
                    NodeDriver::Simulated(SimulatedDriver::new(image.clone(), recovery, clock))
                } else {
                    device_driver(cfg, recovery, signal)?
                };
                let pid = std::process::id();
                let target = SignalTarget { pid, thread_id: pid as i32, signal };
                let mut session = SessionManager::new(driver, clock, recovery, target);
                if let Err(e) = session.open() {
                    tracing::warn!(error = %e, "checkpoint device not available yet");
                }
                Recovery::Kernel { session, image }
            }
        };

        // 3. Trigger source.
        let source: Box<dyn TriggerSource + Send> = match cfg.trigger_source {
            TriggerSourceKind::Rc => Box::new(RcChannelSource::new(bus.rc_subscriber())),
            TriggerSourceKind::Manual => Box::new(ManualControlSource::new(bus.manual_subscriber())),
        };

        tracing::info!(
            strategy = backend.name(),
            trigger_source = ?cfg.trigger_source,
            "controller ready"
        );

        Ok(Self {
            recovery,
            backend,
            poller: TriggerPoller::new(source),
            policy: TriggerPolicy::new(),
            resync: Resync::prepare(&params),
            armed: bus.armed_subscriber(),
            commands: bus.command_publisher(),
            params,
            record,
            last_record: None,
            clock,
            flight: FlightImage::default(),
            boot_cycles: cfg.boot_cycles,
            cycles: 0,
            disarms_published: 0,
            last_rollback: None,
        })
    }

    /// Process start: resynchronise before the first cycle. A loaded record
    /// whose rollback is newer than its checkpoint counts as a resume even
    /// without the in-reboot marker.
    pub fn start(&mut self) -> ResyncOutcome {
        self.backend.store_image(self.recovery, &self.flight);
        let outcome = self.resync(self.recovery.resumed_from_rollback());
        self.flush_record();
        outcome
    }

    pub fn cycle(&mut self) -> CycleReport {
        let started = Instant::now();
        self.cycles += 1;
        let now = self.clock.now_us();
        let boot_complete = self.cycles > self.boot_cycles;

        // 1. Companion.
        if let Some(armed) = self.armed.poll() {
            if !self.recovery.companion_synced() {
                self.recovery.set_companion_synced(true);
                tracing::info!("companion handshake complete");
            }
            self.flight.armed = armed.armed;
        }

        // 2. Rollbacks.
        let mut resumed = false;
        if let Recovery::Kernel { session, image } = &mut self.backend {
            if let Some(event) = session.poll_rollback() {
                resumed = true;
                self.flight = FlightImage::from_bytes(&lock(image));
                self.last_rollback = Some(event);
                metrics::counter!(ROLLBACKS, 1);
                metrics::gauge!(
                    ROLLBACK_DRIFT,
                    event.rollback_timestamp.saturating_sub(event.checkpoint_timestamp) as f64
                );
            }
        }

        // 3. Triggers.
        let mut restored = false;
        if self.policy.poll_rollback(now, boot_complete, &self.params, &mut self.poller, self.recovery) {
            match self.restore() {
                Ok(()) => restored = true,
                Err(e) => tracing::warn!(error = %e, "triggered restore failed"),
            }
        }
        let mut snapshot_saved = false;
        if boot_complete && self.policy.poll_snapshot(&mut self.poller, self.recovery) {
            match self.save() {
                Ok(()) => snapshot_saved = true,
                Err(e) => tracing::warn!(error = %e, "triggered snapshot failed"),
            }
        }

        // 4. Resync.
        let resync = self.resync(resumed);

        // 5. Advance.
        self.flight.cycle += 1;
        self.backend.store_image(self.recovery, &self.flight);
        self.flush_record();

        metrics::histogram!(CYCLE_DURATION, started.elapsed().as_secs_f64());
        CycleReport {
            cycle: self.cycles,
            resumed,
            restored,
            snapshot_saved,
            resync,
        }
    }

    // --- Operations ---

    pub fn save(&mut self) -> Result<(), NodeError> {
        self.backend.store_image(self.recovery, &self.flight);
        self.backend.strategy().snapshot()?;
        match &self.backend {
            Recovery::Flash(_) => {
                self.recovery.mark_snapshot_taken();
                metrics::counter!(SNAPSHOTS_SAVED, 1);
            }
            Recovery::Kernel { .. } => {}
        }
        metrics::counter!(CHECKPOINTS_CREATED, 1);
        self.flush_record();
        Ok(())
    }

    /// Flash restores take effect immediately; kernel rollbacks are picked
    /// up by the next cycle.
    pub fn restore(&mut self) -> Result<(), NodeError> {
        self.backend.strategy().restore()?;
        if let Recovery::Flash(_) = &self.backend {
            self.flight = self.backend.load_image();
            metrics::counter!(ROLLBACKS, 1);
        }
        self.flush_record();
        Ok(())
    }

    pub fn arm_timer(&mut self, seconds: u32, periodic: bool) -> Result<(), NodeError> {
        match &mut self.backend {
            Recovery::Kernel { session, .. } => Ok(session.arm_timer(seconds, periodic)?),
            Recovery::Flash(_) => Err(NodeError::Unsupported(StrategyKind::Flash.as_str())),
        }
    }

    pub fn stop_timer(&mut self) -> Result<(), NodeError> {
        match &mut self.backend {
            Recovery::Kernel { session, .. } => Ok(session.disarm_timer()?),
            Recovery::Flash(_) => Err(NodeError::Unsupported(StrategyKind::Flash.as_str())),
        }
    }

    /// Operator acknowledgement that the companion has been resynchronised.
    pub fn done(&mut self) {
        self.recovery.set_in_reboot(false);
        tracing::info!("in-reboot marker cleared");
        self.flush_record();
    }

    /// External erase of the flash mirrors; re-enables the snapshot trigger.
    pub fn erase(&mut self) -> Result<(), NodeError> {
        match &mut self.backend {
            Recovery::Flash(store) => store.provider_mut().erase()?,
            Recovery::Kernel { .. } => return Err(NodeError::Unsupported(StrategyKind::Kernel.as_str())),
        }
        self.recovery.clear_snapshot_taken();
        self.flush_record();
        Ok(())
    }

    /// Changes a parameter. The rollback period is re-read by the trigger
    /// policy on its next refresh; ids used by the disarm command are fixed
    /// at build time.
    pub fn set_param(&mut self, name: &str, value: i32) -> Result<i32, NodeError> {
        let previous = self
            .params
            .set(name, value)
            .ok_or_else(|| NodeError::UnknownParam(name.to_string()))?;
        tracing::info!(param = name, previous, value, "parameter updated");
        Ok(previous)
    }

    // --- Read APIs ---

    pub fn params(&self) -> &ParamTable {
        &self.params
    }

    pub fn strategy_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn flight(&self) -> FlightImage {
        self.flight
    }

    pub fn backend(&self) -> &Recovery {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut Recovery {
        &mut self.backend
    }

    pub fn status(&self) -> StatusResponse {
        let (session_state, checkpoint, timer, mirrors_erased) = match &self.backend {
            Recovery::Kernel { session, .. } => (Some(session.state()), session.checkpoint(), session.timer(), None),
            Recovery::Flash(store) => (None, None, None, Some(store.mirrors_erased())),
        };
        StatusResponse {
            strategy: self.backend.name(),
            session_state,
            checkpoint,
            timer,
            mirrors_erased,
            checkpoint_timestamp: self.recovery.checkpoint_timestamp(),
            rollback_timestamp: self.recovery.rollback_timestamp(),
            drift_us: self.recovery.drift_us(),
            last_rollback: self.last_rollback,
            in_reboot: self.recovery.in_reboot(),
            snapshot_taken: self.recovery.snapshot_taken(),
            companion_synced: self.recovery.companion_synced(),
            triggers: self.poller.state(),
            rollback_period_us: self.policy.period_us(),
            flight_cycle: self.flight.cycle,
            armed: self.flight.armed,
            cycles: self.cycles,
            disarms_published: self.disarms_published,
        }
    }

    // --- Internals ---

    fn resync(&mut self, resumed: bool) -> ResyncOutcome {
        let outcome = self.resync.run(self.recovery, resumed, &mut self.commands);
        if outcome == ResyncOutcome::Published {
            self.disarms_published += 1;
            metrics::counter!(DISARM_PUBLISHED, 1);
        }
        outcome
    }

    fn flush_record(&mut self) {
        let Some(file) = self.record.as_mut() else {
            return;
        };
        let current = self.recovery.record();
        if self.last_record == Some(current) {
            return;
        }
        match file.store(&current) {
            Ok(()) => self.last_record = Some(current),
            Err(e) => tracing::warn!(path = %file.path().display(), error = %e, "recovery record not written"),
        }
    }
}
