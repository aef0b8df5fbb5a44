// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::device::CheckpointId;
use crate::notify::RollbackSlot;
use crate::state::{RecoveryRecord, RecoveryState};

#[test]
fn test_fresh_state_is_zeroed() {
    let state = RecoveryState::new();
    assert_eq!(state.checkpoint_timestamp(), 0);
    assert_eq!(state.rollback_timestamp(), 0);
    assert!(!state.in_reboot());
    assert!(!state.snapshot_taken());
    assert!(!state.resumed_from_rollback());
    assert_eq!(state.drift_us(), None);
}

#[test]
fn test_resume_detection_uses_pair_ordering() {
    let state = RecoveryState::new();

    state.stamp_checkpoint(1_000);
    assert!(!state.resumed_from_rollback());

    state.record_rollback(3_500);
    assert!(state.resumed_from_rollback());
    assert_eq!(state.drift_us(), Some(2_500));

    // A later checkpoint supersedes the old rollback.
    state.stamp_checkpoint(5_000);
    assert!(!state.resumed_from_rollback());
}

#[test]
fn test_snapshot_taken_is_one_shot() {
    let state = RecoveryState::new();
    assert!(state.mark_snapshot_taken());
    assert!(!state.mark_snapshot_taken());
    state.clear_snapshot_taken();
    assert!(state.mark_snapshot_taken());
}

#[test]
fn test_rollback_slot_single_entry() {
    let slot = RollbackSlot::new();
    assert_eq!(slot.take(), None);

    slot.post(CheckpointId(0));
    assert!(slot.is_pending());
    assert_eq!(slot.take(), Some(CheckpointId(0)));
    assert_eq!(slot.take(), None);

    // Newer post wins.
    slot.post(CheckpointId(3));
    slot.post(CheckpointId(7));
    assert_eq!(slot.take(), Some(CheckpointId(7)));
}

#[test]
fn test_record_survives_reload() {
    let state = RecoveryState::new();
    state.stamp_checkpoint(11);
    state.record_rollback(22);
    state.set_last_action_us(33);
    state.set_in_reboot(true);
    state.mark_snapshot_taken();
    state.set_companion_synced(true);

    let bytes = state.record().to_bytes();
    let decoded = RecoveryRecord::from_bytes(&bytes).unwrap();

    let restarted = RecoveryState::new();
    restarted.load_record(&decoded);
    assert_eq!(restarted.checkpoint_timestamp(), 11);
    assert_eq!(restarted.rollback_timestamp(), 22);
    assert_eq!(restarted.last_action_us(), 33);
    assert!(restarted.in_reboot());
    assert!(restarted.snapshot_taken());
    // The companion handshake is redone after every restart.
    assert!(!restarted.companion_synced());
}

#[test]
fn test_record_rejects_short_buffer() {
    assert_eq!(RecoveryRecord::from_bytes(&[0u8; RecoveryRecord::SIZE - 1]), None);
}
