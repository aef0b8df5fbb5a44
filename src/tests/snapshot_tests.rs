// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::error::StoreError;
use crate::region::{MemoryCopyProvider, RegionProvider};
use crate::tests::fakes::ScriptedProvider;
use crate::snapshot::SnapshotStore;
use crate::state::RecoveryState;

fn two_region_store(state: &RecoveryState) -> SnapshotStore<'_, MemoryCopyProvider> {
    SnapshotStore::new(MemoryCopyProvider::new(&[("sram", 64), ("ccm", 32)]), state)
}

#[test]
fn test_save_then_restore_is_bit_identical() {
    let state = RecoveryState::new();
    let mut store = two_region_store(&state);

    for (i, b) in store.provider_mut().live_mut(0).iter_mut().enumerate() {
        *b = i as u8;
    }
    store.provider_mut().live_mut(1).fill(0x5A);

    assert_eq!(store.save(), Ok(96));
    assert!(!state.in_reboot());
    assert!(!store.mirrors_erased());

    // Scribble over live memory.
    store.provider_mut().live_mut(0).fill(0);
    store.provider_mut().live_mut(1).fill(0);

    store.restore();

    let expected: std::vec::Vec<u8> = (0..64).map(|i| i as u8).collect();
    assert_eq!(store.provider().live(0), &expected[..]);
    assert_eq!(store.provider().live(1), &[0x5Au8; 32]);
}

#[test]
fn test_second_save_requires_erase() {
    let state = RecoveryState::new();
    let mut store = two_region_store(&state);

    assert!(store.save().is_ok());
    assert_eq!(store.save(), Err(StoreError::AlreadyUsed));

    store.provider_mut().erase();
    assert!(store.mirrors_erased());
    assert!(store.save().is_ok());
}

#[test]
fn test_partially_used_mirror_blocks_save() {
    let state = RecoveryState::new();
    let mut store = two_region_store(&state);

    // Only the second mirror has been written.
    store.provider_mut().write_mirror(1).unwrap();
    let before = store.provider().mirror(0).to_vec();

    assert_eq!(store.save(), Err(StoreError::AlreadyUsed));
    // Nothing was written, marker untouched.
    assert_eq!(store.provider().mirror(0), &before[..]);
    assert!(!state.in_reboot());
}

#[test]
fn test_restore_raises_in_reboot_marker() {
    let state = RecoveryState::new();
    let mut store = two_region_store(&state);
    store.save().unwrap();

    assert!(!state.in_reboot());
    store.restore();
    assert!(state.in_reboot());
}

#[test]
fn test_snapshot_safe_follows_companion() {
    let state = RecoveryState::new();
    let store = two_region_store(&state);
    assert!(!store.snapshot_safe());
    state.set_companion_synced(true);
    assert!(store.snapshot_safe());
}

#[test]
fn test_leading_erased_word_still_blocks_second_save() {
    let state = RecoveryState::new();
    let mut store = two_region_store(&state);

    store.provider_mut().live_mut(0)[..4].fill(0xFF);
    store.provider_mut().live_mut(0)[4..8].fill(0x0F);
    store.provider_mut().live_mut(1)[..4].fill(0xFF);
    store.save().unwrap();
    let first = store.provider().mirror(0).to_vec();

    store.provider_mut().live_mut(0)[4..8].fill(0xF0);
    assert_eq!(store.save(), Err(StoreError::AlreadyUsed));
    assert_eq!(store.provider().mirror(0), &first[..]);

    store.restore();
    assert_eq!(store.provider().live(0), &first[..]);
}

#[test]
fn test_save_raises_marker_during_copy() {
    let state = RecoveryState::new();
    let mut store = SnapshotStore::new(ScriptedProvider::new(&state, &[("sram", 16), ("ccm", 8)]), &state);

    assert_eq!(store.save(), Ok(24));
    assert_eq!(store.provider().marker_during_write, [true, true]);
    assert!(!state.in_reboot());
    assert!(!store.mirrors_erased());
}

#[test]
fn test_failed_write_returns_error_and_clears_marker() {
    let state = RecoveryState::new();
    let mut provider = ScriptedProvider::new(&state, &[("sram", 16), ("ccm", 8)]);
    provider.fail_at = Some(1);
    let mut store = SnapshotStore::new(provider, &state);

    assert_eq!(store.save(), Err(StoreError::Io));
    assert_eq!(store.provider().written, [0]);
    assert_eq!(store.provider().marker_during_write, [true, true]);
    assert!(!state.in_reboot());
}
