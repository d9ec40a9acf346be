//! Scenario framework.
//!
//! Scenarios describe a device (stored slots, networks in range), a list of
//! steps, and an oracle that checks the final [`World`]. The oracle is
//! mandatory: a [`Scenario`] without one cannot be run.

mod builder;
mod world;

pub use builder::{RunnableScenario, Scenario};
pub use world::{DeviceEvent, SimRuntime, World};

/// Verification run against the final world.
pub type OracleFn = Box<dyn Fn(&World) -> Result<(), String>>;

/// Reusable oracles.
pub mod oracle {
    use safelock_core::{LockState, NetworkIdentity};

    use super::{OracleFn, World};

    /// Lock ends in `expected`.
    pub fn lock_state(expected: LockState) -> OracleFn {
        Box::new(move |world: &World| {
            let actual = world.lock_state();
            if actual == expected {
                Ok(())
            } else {
                Err(format!("lock state: expected {expected:?}, got {actual:?}"))
            }
        })
    }

    /// Device booted into `expected`.
    pub fn network(expected: NetworkIdentity) -> OracleFn {
        Box::new(move |world: &World| {
            let actual = world.network();
            if actual == expected {
                Ok(())
            } else {
                Err(format!("network: expected {expected:?}, got {actual:?}"))
            }
        })
    }

    /// Every pin that was energized has been released again.
    pub fn actuator_released() -> OracleFn {
        Box::new(|world: &World| {
            let actuator = world.actuator();
            match actuator.events().iter().find(|e| !actuator.is_released(&e.pin)) {
                Some(event) => Err(format!("pin {} left energized", event.pin)),
                None => Ok(()),
            }
        })
    }

    /// Update mode is only ever on while unlocked.
    pub fn update_mode_consistent() -> OracleFn {
        Box::new(|world: &World| {
            if world.update_enabled() && world.lock_state() != LockState::Unlocked {
                Err(format!("update mode on while {:?}", world.lock_state()))
            } else {
                Ok(())
            }
        })
    }

    /// Last response was exactly `expected`.
    pub fn last_text(expected: &'static str) -> OracleFn {
        Box::new(move |world: &World| match world.last_text() {
            Some(text) if text == expected => Ok(()),
            other => Err(format!("last response: expected {expected:?}, got {other:?}")),
        })
    }

    /// Every oracle passes.
    pub fn all_of(oracles: Vec<OracleFn>) -> OracleFn {
        Box::new(move |world: &World| oracles.iter().try_for_each(|oracle| oracle(world)))
    }
}
