use rewind_core::bus::{ActuatorArmed, ManualControlSetpoint, FORCE_DISARM_MAGIC, VEHICLE_CMD_COMPONENT_ARM_DISARM};
use rewind_core::config::PARAM_REBOOT_PERIOD;
use rewind_core::error::StoreError;
use rewind_core::resync::ResyncOutcome;
use rewind_core::state::{RecoveryRecord, RecoveryState};
use rewind_node::config::{NodeConfig, RegionSizes, StrategyKind, TriggerSourceKind};
use rewind_node::errors::NodeError;
use rewind_node::server::AppState;
use rewind_persistence::RecordFile;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

fn leaked() -> &'static RecoveryState {
    Box::leak(Box::new(RecoveryState::new()))
}

fn config(dir: &Path, strategy: StrategyKind) -> NodeConfig {
    NodeConfig {
        strategy,
        simulate_device: true,
        boot_cycles: 2,
        flash_image_path: dir.join("flash.img"),
        record_path: Some(dir.join("rewind.rec")),
        region_sizes: RegionSizes { sram: 64, ccm: 32 },
        ..NodeConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_timer_rollback_disarms_companion() {
    let dir = tempdir().unwrap();
    let cfg = config(dir.path(), StrategyKind::Kernel);
    let state = AppState::build(&cfg, leaked()).unwrap();
    let mut commands = state.bus.subscribe_commands();

    // Vehicle armed, companion agrees.
    state.bus.publish_armed(ActuatorArmed { armed: true, ..ActuatorArmed::default() });

    let mut controller = state.controller.lock().await;
    for _ in 0..3 {
        controller.cycle();
    }
    assert!(controller.status().companion_synced);
    assert!(controller.flight().armed);

    controller.save().unwrap();
    let saved_cycle = controller.flight().cycle;
    controller.arm_timer(1, false).unwrap();

    let mut resumed = None;
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let report = controller.cycle();
        if report.resumed {
            resumed = Some(report);
            break;
        }
    }
    let report = resumed.expect("timer rollback observed by the control loop");
    assert_eq!(report.resync, ResyncOutcome::Published);
    assert_eq!(controller.flight().cycle, saved_cycle + 1);

    let cmd = commands.recv().await.unwrap();
    assert_eq!(cmd.command, VEHICLE_CMD_COMPONENT_ARM_DISARM);
    assert_eq!(cmd.param1, 0.0);
    assert_eq!(cmd.param2, FORCE_DISARM_MAGIC);
    assert_eq!(cmd.confirmation, 1);

    // Companion answers; the next cycle sees the vehicle disarmed.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let report = controller.cycle();
    assert!(!report.resumed);
    assert_eq!(report.resync, ResyncOutcome::NotNeeded);
    assert!(!controller.flight().armed);

    let status = controller.status();
    assert_eq!(status.disarms_published, 1);
    assert!(status.timer.is_none());
    assert!(status.drift_us.unwrap() >= 1_000_000);
    assert_eq!(status.last_rollback.unwrap().checkpoint, status.checkpoint.unwrap().id);
}

#[tokio::test(start_paused = true)]
async fn test_flash_snapshot_then_triggered_restore() {
    let dir = tempdir().unwrap();
    let cfg = NodeConfig {
        trigger_source: TriggerSourceKind::Manual,
        ..config(dir.path(), StrategyKind::Flash)
    };
    let state = AppState::build(&cfg, leaked()).unwrap();
    let mut commands = state.bus.subscribe_commands();
    let mut controller = state.controller.lock().await;

    // Requests during boot are ignored.
    state.bus.publish_manual(ManualControlSetpoint { aux2: 1.0, ..ManualControlSetpoint::default() });
    assert!(!controller.cycle().snapshot_saved);
    assert!(!controller.cycle().snapshot_saved);

    let report = controller.cycle();
    assert!(report.snapshot_saved);
    let saved = controller.flight().cycle;
    assert!(controller.status().snapshot_taken);
    assert_eq!(controller.status().mirrors_erased, Some(false));

    // Held switch: no second save.
    assert!(!controller.cycle().snapshot_saved);

    state.bus.publish_manual(ManualControlSetpoint { aux1: 1.0, ..ManualControlSetpoint::default() });
    tokio::time::sleep(Duration::from_secs(6)).await;
    let report = controller.cycle();
    assert!(report.restored);
    assert_eq!(report.resync, ResyncOutcome::Published);
    assert_eq!(controller.flight().cycle, saved);
    assert!(!controller.status().in_reboot);

    let cmd = commands.recv().await.unwrap();
    assert_eq!(cmd.param2, FORCE_DISARM_MAGIC);

    // Rate limited: switch still held, no second restore.
    assert!(!controller.cycle().restored);

    assert!(matches!(controller.save(), Err(NodeError::Store(StoreError::AlreadyUsed))));
    controller.erase().unwrap();
    assert!(!controller.status().snapshot_taken);
    controller.save().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_restart_with_marker_resyncs_at_start() {
    let dir = tempdir().unwrap();
    let cfg = config(dir.path(), StrategyKind::Flash);
    let path = cfg.record_path.clone().unwrap();
    {
        let mut file = RecordFile::open(&path).unwrap();
        file.store(&RecoveryRecord {
            checkpoint_timestamp: 100,
            rollback_timestamp: 200,
            in_reboot: true,
            ..RecoveryRecord::default()
        })
        .unwrap();
    }

    let state = AppState::build(&cfg, leaked()).unwrap();
    let controller = state.controller.lock().await;
    let status = controller.status();
    assert_eq!(status.disarms_published, 1);
    assert!(!status.in_reboot);
    assert_eq!(status.checkpoint_timestamp, 100);
    assert!(!status.companion_synced);

    let reloaded = RecordFile::open(&path).unwrap().load().unwrap().unwrap();
    assert!(!reloaded.in_reboot);
    assert_eq!(reloaded.rollback_timestamp, 200);
}

#[tokio::test(start_paused = true)]
async fn test_flash_restore_refused_before_handshake() {
    let dir = tempdir().unwrap();
    let cfg = config(dir.path(), StrategyKind::Flash);
    let state = AppState::build(&cfg, leaked()).unwrap();
    let mut controller = state.controller.lock().await;

    controller.save().unwrap();
    assert!(matches!(controller.restore(), Err(NodeError::NotSafe)));

    controller.cycle();
    controller.restore().unwrap();
    assert!(matches!(controller.arm_timer(1, false), Err(NodeError::Unsupported(_))));
}

fn store_record(path: &Path, record: RecoveryRecord) {
    RecordFile::open(path).unwrap().store(&record).unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_unseen_rollback_resyncs_at_start() {
    // The handler stamped the rollback but the process died before a cycle
    // drained the slot: no marker, only the timestamps.
    let dir = tempdir().unwrap();
    let cfg = config(dir.path(), StrategyKind::Kernel);
    store_record(
        cfg.record_path.as_ref().unwrap(),
        RecoveryRecord { checkpoint_timestamp: 100, rollback_timestamp: 200, ..RecoveryRecord::default() },
    );

    let state = AppState::build(&cfg, leaked()).unwrap();
    let status = state.controller.lock().await.status();
    assert_eq!(status.rollback_timestamp, 200);
    assert_eq!(status.disarms_published, 1);

    // A checkpoint newer than the last rollback is a clean start.
    let dir = tempdir().unwrap();
    let cfg = config(dir.path(), StrategyKind::Kernel);
    store_record(
        cfg.record_path.as_ref().unwrap(),
        RecoveryRecord { checkpoint_timestamp: 300, rollback_timestamp: 200, ..RecoveryRecord::default() },
    );

    let state = AppState::build(&cfg, leaked()).unwrap();
    assert_eq!(state.controller.lock().await.status().disarms_published, 0);
}

#[tokio::test(start_paused = true)]
async fn test_pending_rollback_keeps_restored_image() {
    let dir = tempdir().unwrap();
    let cfg = config(dir.path(), StrategyKind::Kernel);
    let state = AppState::build(&cfg, leaked()).unwrap();
    let mut controller = state.controller.lock().await;

    for _ in 0..3 {
        controller.cycle();
    }
    controller.save().unwrap();
    let saved_cycle = controller.flight().cycle;
    controller.arm_timer(1, false).unwrap();
    controller.cycle();
    controller.cycle();

    // The timer fires between cycles; nothing has drained the slot yet.
    tokio::time::sleep(Duration::from_millis(1100)).await;

    // Writes the flight image before failing on the armed timer.
    assert!(controller.save().is_err());

    let report = controller.cycle();
    assert!(report.resumed);
    assert_eq!(controller.flight().cycle, saved_cycle + 1);
}

#[tokio::test(start_paused = true)]
async fn test_reboot_period_change_reaches_trigger_policy() {
    let dir = tempdir().unwrap();
    let cfg = NodeConfig {
        trigger_source: TriggerSourceKind::Manual,
        ..config(dir.path(), StrategyKind::Flash)
    };
    let state = AppState::build(&cfg, leaked()).unwrap();
    let mut controller = state.controller.lock().await;

    for _ in 0..3 {
        controller.cycle();
    }
    assert_eq!(controller.status().rollback_period_us, 1_000_000);
    assert_eq!(controller.set_param(PARAM_REBOOT_PERIOD, 10_000_000).unwrap(), 1_000_000);
    assert!(matches!(controller.set_param("NOT_A_PARAM", 1), Err(NodeError::UnknownParam(_))));
    controller.save().unwrap();

    state.bus.publish_manual(ManualControlSetpoint { aux1: 1.0, ..ManualControlSetpoint::default() });
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(!controller.cycle().restored);
    assert_eq!(controller.status().rollback_period_us, 10_000_000);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(controller.cycle().restored);
}
