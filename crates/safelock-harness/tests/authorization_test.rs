//! Administrative credential gate.

use safelock_core::{LockState, NetworkIdentity, Page, Response, Slot};
use safelock_harness::scenario::Scenario;

fn guarded(name: &str) -> Scenario {
    Scenario::new(name)
        .joined("home", "pw")
        .stored(Slot::AdminUser, "admin")
        .stored(Slot::AdminPassword, "pw")
}

fn is_challenge(response: &Response) -> bool {
    matches!(response, Response::Challenge { realm } if realm == "safe")
}

#[test]
fn status_without_credentials_is_challenged() {
    let result = guarded("no credentials")
        .send(&[("status", "")])
        .oracle(Box::new(|world| {
            assert!(world.responses().iter().all(is_challenge));
            assert_eq!(world.responses().len(), 1);
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn wrong_credentials_change_nothing() {
    let result = guarded("wrong credentials")
        .send_as("admin", "guess", &[("lock", ""), ("lock1", "1"), ("lock2", "1")])
        .send_as("root", "pw", &[("open", "")])
        .oracle(Box::new(|world| {
            assert!(world.responses().iter().all(is_challenge));
            assert_eq!(world.lock_state(), LockState::Unlocked);
            assert!(world.actuator().openings().is_empty());
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn matching_credentials_proceed() {
    let result = guarded("matching credentials")
        .send_as("admin", "pw", &[("status", "")])
        .page(Page::Index)
        .oracle(Box::new(|world| {
            assert_eq!(world.responses()[0], Response::Text("Safe is unlocked".into()));
            assert!(is_challenge(&world.responses()[1]));
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn setauth_replaces_credentials() {
    let result = guarded("rotate")
        .send_as("admin", "pw", &[("setauth", ""), ("username", "ops"), ("password", "s3cret")])
        .send_as("admin", "pw", &[("status", "")])
        .send_as("ops", "s3cret", &[("status", "")])
        .oracle(Box::new(|world| {
            let responses = world.responses();
            assert_eq!(responses[0], Response::Text("Authentication details updated".into()));
            assert!(is_challenge(&responses[1]));
            assert_eq!(responses[2], Response::Text("Safe is unlocked".into()));
            assert_eq!(world.stored().admin_user, "ops");
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn empty_username_disables_authentication() {
    let result = guarded("disable")
        .send_as("admin", "pw", &[("setauth", ""), ("username", ""), ("password", "")])
        .send(&[("status", "")])
        .oracle(Box::new(|world| {
            assert_eq!(world.last_text(), Some("Safe is unlocked"));
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn standalone_bypasses_authentication() {
    let result = Scenario::new("standalone bypass")
        .stored(Slot::AdminUser, "admin")
        .stored(Slot::AdminPassword, "pw")
        .send(&[("status", "")])
        .oracle(Box::new(|world| {
            assert_eq!(world.network(), NetworkIdentity::Standalone);
            assert!(matches!(
                world.responses(),
                [Response::Page { page: Page::Provisioning, .. }]
            ));
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}
