//! Safelock core logic
//!
//! Pure state machine logic for a network-attached electromechanical lock,
//! completely decoupled from I/O. This enables deterministic testing of the
//! parts of the device that actually make decisions.
//!
//! # Architecture
//!
//! ```text
//!      ┌──────────────────────────────────┐
//!      │ dispatch (Controller)            │
//!      │ - authorization gate             │
//!      │ - command routing                │
//!      └──────────────────────────────────┘
//!         ↓              ↓              ↓
//! ┌──────────────┐ ┌──────────────┐ ┌──────────────┐
//! │ lock         │ │ network      │ │ command      │
//! │ - LockState  │ │ - join/AP    │ │ - parsing    │
//! └──────────────┘ └──────────────┘ └──────────────┘
//!         ↓              ↓
//!      ┌──────────────────────────────────┐
//!      │ store (SecretStore over Eeprom)  │
//!      └──────────────────────────────────┘
//! ```
//!
//! State transitions produce declarative actions that describe intended
//! effects (delay, drive the actuator, schedule a restart) rather than
//! executing them. The runtime in `safelock-app` interprets those actions
//! against a concrete [`platform`] implementation.
//!
//! # Components
//!
//! - [`store`]: Slotted secret store with marker-certified slots
//! - [`lock`]: Lock state machine (`Unlocked`, `Locked`, `UnlockedOnce`)
//! - [`open`]: Timed open sequence and scoped actuator guard
//! - [`network`]: Network identity state machine (join or standalone)
//! - [`command`]: Request parameters parsed into [`command::Command`]
//! - [`dispatch`]: Authorization and dispatch policy
//! - [`platform`]: Collaborator traits (actuator, radio, discovery, updates)
//! - [`mod@env`]: Environment abstraction (time)
//! - [`error`]: Error types

#![forbid(unsafe_code)]

pub mod command;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod lock;
pub mod network;
pub mod open;
pub mod platform;
pub mod store;

pub use command::{Command, Params, Reconfigure};
pub use dispatch::{
    Controller, ControllerAction, ControllerConfig, Credentials, Page, Request, Response, Target,
};
pub use env::Environment;
pub use error::{CommandError, LockError, PlatformError, StoreError};
pub use lock::{LockAction, LockMachine, LockState, UnlockMode};
pub use network::{
    JoinConfig, NetworkAction, NetworkCredentials, NetworkIdentity, NetworkMachine, NetworkState,
};
pub use open::{OpenSequence, OpenStep};
pub use platform::{Actuator, Advertiser, Radio, UpdateChannel, UpdatePoll};
pub use store::{Durability, Eeprom, MemoryEeprom, SecretStore, Secrets, Slot};
