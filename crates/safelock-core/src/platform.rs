//! Platform abstraction for the parts of the device the core does not own.
//!
//! The core decides; these collaborators act. Each trait is the narrowest
//! interface the decision logic needs:
//!
//! - [`Actuator`]: energize or release the relay pin
//! - [`Radio`]: join a configured network or host a standalone one
//! - [`Advertiser`]: publish the device name for service discovery
//! - [`UpdateChannel`]: accept a firmware image while update mode is on
//!
//! Production implementations live in `safelock-server`, recording ones in
//! `safelock-harness`.

use crate::{error::PlatformError, network::NetworkCredentials};

/// Drives the physical lock mechanism.
pub trait Actuator {
    /// Set `pin` high (`energized`) or low.
    fn drive(&mut self, pin: &str, energized: bool) -> Result<(), PlatformError>;
}

/// Network interface used during boot.
pub trait Radio {
    /// Hardware identifier, used to name the standalone network.
    fn chip_id(&self) -> u32;

    /// Start associating with a network. Returns without waiting.
    fn associate(&mut self, credentials: &NetworkCredentials) -> Result<(), PlatformError>;

    /// Whether association has completed.
    fn is_associated(&mut self) -> bool;

    /// Host an open network named `name`.
    fn host_standalone(&mut self, name: &str) -> Result<(), PlatformError>;
}

/// Service discovery advertisement.
pub trait Advertiser {
    /// Advertise the device under `name`.
    fn advertise(&mut self, name: &str) -> Result<(), PlatformError>;
}

/// Result of polling the firmware update channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePoll {
    /// Nothing arrived
    Idle,
    /// An image was installed and the device must restart
    Installed,
}

/// Firmware update transport.
///
/// Only polled while update mode is enabled.
pub trait UpdateChannel {
    /// Service the channel once, announcing the device as `device_name`.
    fn poll(&mut self, device_name: &str) -> Result<UpdatePoll, PlatformError>;
}
