//! Safelock host server
//!
//! Runs the device loop on a host: HTTP for requests, a file for the
//! persistent region, sysfs GPIO for the relay.
//!
//! # Components
//!
//! - [`http`]: tiny_http transport implementing [`safelock_app::Driver`]
//! - [`pages`]: HTML templates with named substitutions
//! - [`eeprom`]: File-backed persistent region
//! - [`gpio`]: sysfs relay actuator
//! - [`host`]: Radio, discovery and update stand-ins for a host
//! - [`config`]: CLI flags layered over a TOML file
//! - [`mod@env`]: Wall-clock environment

#![forbid(unsafe_code)]

pub mod config;
pub mod eeprom;
pub mod env;
pub mod error;
pub mod gpio;
pub mod host;
pub mod http;
pub mod pages;

pub use config::{Args, ServerConfig};
pub use eeprom::FileEeprom;
pub use env::SystemEnv;
pub use error::ServerError;
pub use http::{HttpDriver, HttpResponder, Peripherals};
