//! Relay actuator over the sysfs GPIO interface.
//!
//! Pin `N` is driven by writing `1` or `0` to `{root}/gpioN/value`. The pin
//! must already be exported and configured as an output.

use std::{fs, path::PathBuf};

use safelock_core::{PlatformError, platform::Actuator};
use tracing::trace;

/// Actuator writing to GPIO value files under `root`.
#[derive(Debug, Clone)]
pub struct SysfsActuator {
    root: PathBuf,
}

impl SysfsActuator {
    /// Drive pins below `root`, usually `/sys/class/gpio`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn value_path(&self, pin: &str) -> Result<PathBuf, PlatformError> {
        let number: u32 = pin
            .trim()
            .parse()
            .map_err(|_| PlatformError(format!("pin {pin:?} is not a GPIO number")))?;
        Ok(self.root.join(format!("gpio{number}")).join("value"))
    }
}

impl Actuator for SysfsActuator {
    fn drive(&mut self, pin: &str, energized: bool) -> Result<(), PlatformError> {
        let path = self.value_path(pin)?;
        trace!(path = %path.display(), energized, "drive");
        fs::write(&path, if energized { "1" } else { "0" })
            .map_err(|err| PlatformError(format!("pin {pin}: {err}")))
    }
}
