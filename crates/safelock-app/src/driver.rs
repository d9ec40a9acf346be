//! Driver trait for abstracting I/O operations.
//!
//! The [`Driver`] trait decouples the runtime from specific I/O
//! implementations. The host server implements it over HTTP and the host
//! filesystem; the harness implements it with recording peripherals. The
//! generic [`crate::Runtime`] handles all orchestration.

use std::time::Duration;

use safelock_core::{
    Request, Response,
    platform::{Actuator, Advertiser, Radio, UpdateChannel},
};

/// Sink for lines a request reports before its final response.
///
/// An open reports one line per second while the actuator is energized.
/// The final response still carries every line, so a transport that
/// cannot stream may ignore them.
pub trait Progress {
    /// Deliver one line now.
    fn progress(&mut self, line: &str);
}

/// Abstracts I/O operations for the runtime.
///
/// Time is not part of the driver. The runtime owns its
/// [`safelock_core::Environment`] so it can sleep while the actuator is
/// borrowed.
pub trait Driver {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Handle used to answer one request.
    type Responder: Progress;

    /// Lock mechanism.
    type Actuator: Actuator;

    /// Network interface.
    type Radio: Radio;

    /// Service discovery.
    type Advertiser: Advertiser;

    /// Firmware update transport.
    type Updates: UpdateChannel;

    /// Wait up to `timeout` for the next request.
    ///
    /// Returns `None` if nothing arrived in time.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener is gone. The runtime stops.
    fn poll_request(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<(Request, Self::Responder)>, Self::Error>;

    /// Answer a request.
    ///
    /// # Errors
    ///
    /// Returns an error if the response could not be delivered. The runtime
    /// logs it and keeps serving.
    fn respond(&mut self, responder: Self::Responder, response: Response) -> Result<(), Self::Error>;

    /// The actuator.
    fn actuator(&mut self) -> &mut Self::Actuator;

    /// The radio.
    fn radio(&mut self) -> &mut Self::Radio;

    /// The advertiser.
    fn advertiser(&mut self) -> &mut Self::Advertiser;

    /// The update channel.
    fn updates(&mut self) -> &mut Self::Updates;
}
