use rewind_core::device::SignalTarget;
use rewind_core::error::SessionError;
use rewind_core::session::{SessionManager, SessionState};
use rewind_core::state::RecoveryState;
use rewind_node::clock::MonotonicClock;
use rewind_node::sim::{ProcessImage, SimulatedDriver};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type SimSession = SessionManager<'static, SimulatedDriver, MonotonicClock>;

fn session() -> (SimSession, SimulatedDriver, ProcessImage) {
    let recovery: &'static RecoveryState = Box::leak(Box::new(RecoveryState::new()));
    let image: ProcessImage = Arc::new(Mutex::new(vec![0u8; 32]));
    let clock = MonotonicClock::new();
    let driver = SimulatedDriver::new(image.clone(), recovery, clock);
    let target = SignalTarget { pid: 1, thread_id: 1, signal: 40 };
    let mut session = SessionManager::new(driver.clone(), clock, recovery, target);
    session.open().unwrap();
    (session, driver, image)
}

#[tokio::test(start_paused = true)]
async fn test_one_shot_timer_fires_once() {
    let (mut session, driver, image) = session();
    image.lock().unwrap()[0] = 7;
    session.create_checkpoint().unwrap();
    image.lock().unwrap()[0] = 9;

    session.arm_timer(2, false).unwrap();
    tokio::time::sleep(Duration::from_millis(2100)).await;

    assert_eq!(driver.notifications(), 1);
    assert_eq!(driver.pending_timers(), 0);
    assert_eq!(image.lock().unwrap()[0], 7);

    let event = session.poll_rollback().expect("rollback delivered");
    assert!(event.rollback_timestamp > event.checkpoint_timestamp);
    assert_eq!(session.state(), SessionState::RolledBack);
    assert!(session.timer().is_none());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(driver.notifications(), 1);
    assert!(session.poll_rollback().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_rearm_replaces_pending_timer() {
    let (mut session, driver, _image) = session();
    session.create_checkpoint().unwrap();

    session.arm_timer(5, false).unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    session.arm_timer(5, false).unwrap();

    // The first deadline (t=5s) passes without a rollback.
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(driver.notifications(), 0);
    assert_eq!(driver.pending_timers(), 1);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(driver.notifications(), 1);
    assert!(session.poll_rollback().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_disarm_prevents_rollback() {
    let (mut session, driver, _image) = session();
    session.create_checkpoint().unwrap();

    session.arm_timer(2, false).unwrap();
    session.disarm_timer().unwrap();
    assert_eq!(session.state(), SessionState::Checkpointed);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(driver.notifications(), 0);
    assert!(session.poll_rollback().is_none());
    assert_eq!(session.disarm_timer(), Err(SessionError::NoActiveTimer));
}

#[tokio::test(start_paused = true)]
async fn test_periodic_timer_keeps_firing() {
    let (mut session, driver, _image) = session();
    session.create_checkpoint().unwrap();

    session.arm_timer(1, true).unwrap();
    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(driver.notifications(), 3);

    // One slot: the three deliveries collapse into one event.
    assert!(session.poll_rollback().is_some());
    assert!(session.poll_rollback().is_none());
    assert_eq!(session.state(), SessionState::TimerArmed);

    session.disarm_timer().unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(driver.notifications(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_arming_without_checkpoint_rejected() {
    let (mut session, driver, _image) = session();
    assert_eq!(session.arm_timer(1, false), Err(SessionError::NotReady));
    assert_eq!(session.arm_timer(0, false), Err(SessionError::InvalidDuration));
    assert_eq!(driver.pending_timers(), 0);
}
