//! World state for scenario execution.
//!
//! The World owns one simulated device (runtime, driver and persistent
//! region) and provides the operations scenarios are built from, plus
//! accessors oracles verify against.

use std::time::Duration;

use safelock_app::{Runtime, RuntimeConfig};
use safelock_core::{
    Environment, LockState, MemoryEeprom, NetworkIdentity, Params, Request, Response, Secrets,
};
use tracing::debug;

use crate::{SimDriver, SimEnv, sim_driver::RecordingActuator};

/// Simulated device under test.
pub type SimRuntime = Runtime<SimDriver, SimEnv, MemoryEeprom>;

/// Events that occurred during scenario execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A request was served
    Served(Request),
    /// Virtual time was skipped
    Advanced(Duration),
    /// Power was cut and restored
    PowerLoss,
}

/// World state containing the device and its history.
pub struct World {
    runtime: SimRuntime,
    env: SimEnv,
    events: Vec<DeviceEvent>,
}

impl World {
    /// Boot a device from `eeprom` on a driver prepared by the caller.
    pub fn boot(driver: SimDriver, env: SimEnv, eeprom: MemoryEeprom, config: RuntimeConfig) -> Self {
        let runtime = Runtime::boot(driver, env.clone(), eeprom, config);
        Self { runtime, env, events: Vec::new() }
    }

    /// Serve one request and return its response.
    pub fn send(&mut self, request: Request) -> Option<Response> {
        debug!(target = ?request.target, "scenario request");
        let before = self.runtime.driver().responses().len();

        self.runtime.driver_mut().push_request(request.clone());
        while self.runtime.driver().pending() > 0 {
            // SimDriver never fails.
            let Ok(_) = self.runtime.step();
        }
        self.events.push(DeviceEvent::Served(request));

        let responses = self.runtime.driver().responses();
        responses.last().filter(|_| responses.len() > before).cloned()
    }

    /// Send command parameters without credentials.
    pub fn command(&mut self, pairs: &[(&str, &str)]) -> Option<Response> {
        self.send(Request::command(pairs.iter().copied().collect::<Params>()))
    }

    /// Let `duration` of virtual time pass with the loop idling.
    pub fn advance(&mut self, duration: Duration) {
        let until = self.env.now() + duration;
        while self.env.now() < until {
            let Ok(_) = self.runtime.step();
        }
        self.events.push(DeviceEvent::Advanced(duration));
    }

    /// Cut power: uncommitted writes are lost and the device boots again.
    pub fn power_loss(&mut self) {
        let eeprom = self.runtime.controller_mut().store_mut().eeprom_mut();
        *eeprom = eeprom.power_cycle();
        self.runtime.restart();
        self.events.push(DeviceEvent::PowerLoss);
    }

    /// The runtime.
    pub fn runtime(&self) -> &SimRuntime {
        &self.runtime
    }

    /// Mutable access to the runtime.
    pub fn runtime_mut(&mut self) -> &mut SimRuntime {
        &mut self.runtime
    }

    /// The driver.
    pub fn driver(&self) -> &SimDriver {
        self.runtime.driver()
    }

    /// Mutable access to the driver.
    pub fn driver_mut(&mut self) -> &mut SimDriver {
        self.runtime.driver_mut()
    }

    /// The actuator.
    pub fn actuator(&self) -> &RecordingActuator {
        self.driver().recorded_actuator()
    }

    /// Current lock state.
    pub fn lock_state(&self) -> LockState {
        self.runtime.controller().lock_state()
    }

    /// Network identity of the current boot.
    pub fn network(&self) -> NetworkIdentity {
        self.runtime.network()
    }

    /// Slots as stored on the persistent region right now.
    pub fn stored(&self) -> Secrets {
        self.runtime.controller().store().load()
    }

    /// Whether update mode is on.
    pub fn update_enabled(&self) -> bool {
        self.runtime.controller().update_enabled()
    }

    /// Virtual time elapsed.
    pub fn now(&self) -> Duration {
        self.env.now()
    }

    /// Every response, oldest first.
    pub fn responses(&self) -> &[Response] {
        self.driver().responses()
    }

    /// Text of the last response, if it was text.
    pub fn last_text(&self) -> Option<&str> {
        match self.driver().last_response() {
            Some(Response::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// Everything the scenario did, in order.
    pub fn events(&self) -> &[DeviceEvent] {
        &self.events
    }
}
