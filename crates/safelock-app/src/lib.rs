//! Application layer for Safelock
//!
//! Generic runtime for the device's single cooperative loop, so the same
//! orchestration runs on the host server and in deterministic simulation.
//!
//! # Components
//!
//! - [`Driver`]: Trait for platform-specific I/O (requests and peripherals)
//! - [`Progress`]: Per-request sink for lines reported before the response
//! - [`Runtime`]: Boot, serve, open, restart and update polling over a Driver

#![forbid(unsafe_code)]

mod driver;
mod runtime;

pub use driver::{Driver, Progress};
pub use runtime::{Runtime, RuntimeConfig, describe_step};
