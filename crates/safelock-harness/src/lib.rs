//! Deterministic simulation harness for Safelock testing.
//!
//! Virtual-clock implementations of the Environment and Driver traits, so the
//! production runtime can be exercised without real time, radios or relays.
//!
//! - [`SimEnv`]: shared virtual clock and seeded RNG
//! - [`SimDriver`]: request queue plus recording peripherals
//! - [`scenario`]: declarative scenarios with a mandatory oracle
//! - [`model`]: reference model of the lock for model-based tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod scenario;
pub mod sim_driver;
pub mod sim_env;

pub use model::{ModelDevice, Operation};
pub use sim_driver::{
    ActuatorEvent, ProgressLine, RecordingActuator, SimAdvertiser, SimDriver, SimRadio,
    SimResponder, SimUpdates,
};
pub use sim_env::SimEnv;
