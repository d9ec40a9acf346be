//! Timed open sequence.
//!
//! Opening the safe energizes the actuator for a number of seconds and then
//! releases it. The sequence is modelled as an iterator of [`OpenStep`]s so
//! that the actuator logic stays independent of whatever transport reports
//! progress to the caller:
//!
//! ```text
//! Energize → Hold{n} → Hold{n-1} → … → Hold{1} → Release
//! ```
//!
//! Each `Hold` is one second with the actuator energized. [`run`] executes a
//! sequence against an [`Actuator`] through an [`ActuatorGuard`], which
//! releases the pin when dropped, so an early return or a panic mid-sequence
//! still leaves the actuator de-energized.

use std::time::Duration;

use tracing::{error, info, trace};

use crate::{env::Environment, error::PlatformError, platform::Actuator};

/// Seconds used when an open request gives none (or zero).
pub const DEFAULT_OPEN_SECS: u32 = 5;

/// Longest accepted open.
pub const MAX_OPEN_SECS: u32 = 600;

/// Length of one hold step.
pub const TICK: Duration = Duration::from_secs(1);

/// One step of an open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenStep {
    /// Energize the actuator
    Energize,
    /// Keep it energized for one tick; `remaining` counts this tick
    Hold {
        /// Seconds left including this one
        remaining: u32,
    },
    /// Release the actuator
    Release,
}

/// Iterator over the steps of one open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSequence {
    seconds: u32,
    next: Option<OpenStep>,
}

impl OpenSequence {
    /// Sequence holding the actuator for `seconds` (zero means the default).
    pub fn new(seconds: u32) -> Self {
        let seconds = if seconds == 0 { DEFAULT_OPEN_SECS } else { seconds };
        Self { seconds, next: Some(OpenStep::Energize) }
    }

    /// Total hold time in seconds.
    pub fn seconds(&self) -> u32 {
        self.seconds
    }
}

impl Iterator for OpenSequence {
    type Item = OpenStep;

    fn next(&mut self) -> Option<OpenStep> {
        let current = self.next?;
        self.next = match current {
            OpenStep::Energize => Some(OpenStep::Hold { remaining: self.seconds }),
            OpenStep::Hold { remaining } if remaining > 1 => {
                Some(OpenStep::Hold { remaining: remaining - 1 })
            },
            OpenStep::Hold { .. } => Some(OpenStep::Release),
            OpenStep::Release => None,
        };
        Some(current)
    }
}

/// Energized actuator pin, released on drop.
pub struct ActuatorGuard<'a, A: Actuator + ?Sized> {
    actuator: &'a mut A,
    pin: &'a str,
}

impl<'a, A: Actuator + ?Sized> ActuatorGuard<'a, A> {
    /// Energize `pin`. If energizing fails the pin is driven low again.
    pub fn engage(actuator: &'a mut A, pin: &'a str) -> Result<Self, PlatformError> {
        let mut guard = Self { actuator, pin };
        guard.actuator.drive(pin, true)?;
        Ok(guard)
    }
}

impl<A: Actuator + ?Sized> Drop for ActuatorGuard<'_, A> {
    fn drop(&mut self) {
        if let Err(err) = self.actuator.drive(self.pin, false) {
            error!(pin = self.pin, %err, "failed to release actuator");
        }
    }
}

/// Execute an open sequence, reporting every hold tick to `report`.
///
/// Blocks for the whole sequence. The actuator is released before this
/// returns on every path.
pub fn run<A, E>(
    sequence: OpenSequence,
    pin: &str,
    actuator: &mut A,
    env: &E,
    mut report: impl FnMut(OpenStep),
) -> Result<(), PlatformError>
where
    A: Actuator + ?Sized,
    E: Environment,
{
    info!(pin, seconds = sequence.seconds(), "opening");
    let guard = ActuatorGuard::engage(actuator, pin)?;

    for step in sequence {
        match step {
            OpenStep::Energize => report(step),
            OpenStep::Hold { remaining } => {
                trace!(remaining, "holding");
                report(step);
                env.sleep(TICK);
            },
            OpenStep::Release => {},
        }
    }

    drop(guard);
    report(OpenStep::Release);
    info!(pin, "closed");
    Ok(())
}
