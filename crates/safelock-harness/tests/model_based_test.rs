//! Model-based property tests.
//!
//! These tests generate random operation sequences and verify that the real
//! runtime behaves identically to the reference model.
//!
//! # Architecture
//!
//! ```text
//! proptest generates: Vec<Operation>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!      ModelDevice     World         Compare
//!      (reference)   (SimDriver)    text, time, state
//! ```

use proptest::prelude::*;
use safelock_app::RuntimeConfig;
use safelock_core::{Durability, LockState, MemoryEeprom, Response, SecretStore, Slot};
use safelock_harness::{ModelDevice, Operation, SimDriver, SimEnv, scenario::World};

fn joined_world(seed: u64) -> World {
    let mut store = SecretStore::new(MemoryEeprom::new());
    store.write(Slot::NetworkName, "home", Durability::Defer).unwrap();
    store.write(Slot::NetworkCredential, "pw", Durability::Commit).unwrap();

    let env = SimEnv::with_seed(seed);
    let mut driver = SimDriver::new(env.clone());
    driver.sim_radio_mut().add_network("home", "pw");
    World::boot(driver, env, store.into_inner(), RuntimeConfig::default())
}

/// Small alphabet so candidates collide with the stored secret often.
fn secret() -> impl Strategy<Value = String> {
    prop_oneof![
        8 => "[12]{0,2}",
        1 => Just("9".repeat(62)),
    ]
}

fn operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        Just(Operation::Status),
        (secret(), secret()).prop_map(|(secret, confirm)| Operation::Lock { secret, confirm }),
        secret().prop_map(|s| Operation::Lock { secret: s.clone(), confirm: s }),
        secret().prop_map(|candidate| Operation::TestSecret { candidate }),
        (secret(), any::<bool>()).prop_map(|(candidate, once)| Operation::Unlock { candidate, once }),
        prop_oneof![0..4u32, Just(601u32)].prop_map(|seconds| Operation::Open { seconds }),
        any::<bool>().prop_map(|enabled| Operation::Update { enabled }),
        Just(Operation::PowerLoss),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn runtime_matches_model(ops in prop::collection::vec(operation(), 1..40), seed in any::<u64>()) {
        let mut model = ModelDevice::new();
        let mut world = joined_world(seed);

        for (i, op) in ops.iter().enumerate() {
            let expected = model.apply(op);
            let before = world.now();

            let actual = match op.request() {
                Some(request) => match world.send(request) {
                    Some(Response::Text(text)) => Some(text),
                    other => {
                        prop_assert!(false, "step {i} {op:?}: non-text response {other:?}");
                        None
                    },
                },
                None => {
                    world.power_loss();
                    None
                },
            };

            prop_assert_eq!(actual, expected.text, "step {} {:?}", i, op);
            prop_assert_eq!(world.now() - before, expected.elapsed, "step {} {:?}", i, op);
            prop_assert_eq!(world.lock_state(), model.state(), "step {} {:?}", i, op);
            prop_assert_eq!(world.update_enabled(), model.update_enabled(), "step {} {:?}", i, op);
            prop_assert!(world.actuator().is_released("5"));
        }
    }

    #[test]
    fn stored_secret_tracks_lock_state(ops in prop::collection::vec(operation(), 1..40)) {
        let mut world = joined_world(0);

        for op in &ops {
            match op.request() {
                Some(request) => {
                    world.send(request);
                },
                None => world.power_loss(),
            }

            let stored = world.stored().unlock_secret;
            prop_assert_eq!(stored.is_empty(), world.lock_state() == LockState::Unlocked);
        }
    }
}
