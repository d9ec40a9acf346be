//! Update mode: only while unlocked, and cleared by leaving that state.

use std::time::Duration;

use safelock_core::LockState;
use safelock_harness::scenario::{Scenario, oracle};

#[test]
fn update_channel_polled_only_when_enabled() {
    let result = Scenario::new("polling")
        .joined("home", "pw")
        .advance(Duration::from_secs(1))
        .send(&[("update", "on")])
        .advance(Duration::from_millis(300))
        .oracle(Box::new(|world| {
            let polls = world.driver().sim_updates().polls();
            assert!(!polls.is_empty());
            assert!(polls.iter().all(|name| name == "safe"));
            assert!(world.update_enabled());
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn locking_clears_update_mode() {
    let result = Scenario::new("lock clears")
        .joined("home", "pw")
        .send(&[("update", "on")])
        .send(&[("lock", ""), ("lock1", "1"), ("lock2", "1")])
        .send(&[("update", "on")])
        .oracle(oracle::all_of(vec![
            oracle::lock_state(LockState::Locked),
            oracle::update_mode_consistent(),
            oracle::last_text("Update mode can only be changed while unlocked"),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn reconfiguring_the_network_clears_update_mode() {
    let result = Scenario::new("reconfigure clears")
        .joined("home", "pw")
        .send(&[("update", "on")])
        .send(&[("ssid", "other"), ("password", "x")])
        .oracle(Box::new(|world| {
            assert!(!world.update_enabled());
            assert!(world.runtime().restart_pending());
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn installed_update_restarts_with_mode_off() {
    let result = Scenario::new("install")
        .joined("home", "pw")
        .send(&[("update", "on")])
        .queue_update()
        .advance(Duration::from_millis(200))
        .oracle(Box::new(|world| {
            assert_eq!(world.runtime().boots(), 2);
            assert!(!world.update_enabled());
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn queued_image_waits_for_update_mode() {
    let result = Scenario::new("not enabled")
        .joined("home", "pw")
        .queue_update()
        .advance(Duration::from_secs(1))
        .oracle(Box::new(|world| {
            assert_eq!(world.runtime().boots(), 1);
            assert!(world.driver().sim_updates().polls().is_empty());
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}
