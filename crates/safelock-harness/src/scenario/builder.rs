//! Scenario builder API.
//!
//! Provides a declarative API for constructing scenario tests that enforce
//! the Oracle Pattern.

use std::time::Duration;

use safelock_app::RuntimeConfig;
use safelock_core::{Durability, MemoryEeprom, Page, Params, Request, SecretStore, Slot};

use crate::{
    SimDriver, SimEnv,
    scenario::{OracleFn, World},
};

#[derive(Debug, Clone)]
enum Step {
    Send(Request),
    Advance(Duration),
    PowerLoss,
    QueueUpdate,
}

/// Scenario builder.
///
/// Describe the device, then the steps. Must call `.oracle()` to get a
/// [`RunnableScenario`] that can be executed.
pub struct Scenario {
    name: String,
    seed: u64,
    stored: Vec<(Slot, String)>,
    in_range: Vec<(String, String)>,
    join_after: u32,
    config: RuntimeConfig,
    steps: Vec<Step>,
}

impl Scenario {
    /// Create a new scenario with the given name.
    ///
    /// The device starts blank: nothing stored, no network in range.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            seed: 0,
            stored: Vec::new(),
            in_range: Vec::new(),
            join_after: 0,
            config: RuntimeConfig::default(),
            steps: Vec::new(),
        }
    }

    /// Seed for the simulated chip id.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Store a slot value before the first boot.
    pub fn stored(mut self, slot: Slot, value: impl Into<String>) -> Self {
        self.stored.push((slot, value.into()));
        self
    }

    /// Store a network and put it in range, so the device boots joined.
    pub fn joined(self, name: &str, credential: &str) -> Self {
        self.stored(Slot::NetworkName, name)
            .stored(Slot::NetworkCredential, credential)
            .network_in_range(name, credential)
    }

    /// Put a network in range of the radio.
    pub fn network_in_range(mut self, name: impl Into<String>, credential: impl Into<String>) -> Self {
        self.in_range.push((name.into(), credential.into()));
        self
    }

    /// Failed association checks before a reachable network joins.
    pub fn join_after(mut self, polls: u32) -> Self {
        self.join_after = polls;
        self
    }

    /// Runtime configuration.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Send command parameters without credentials.
    pub fn send(mut self, pairs: &[(&str, &str)]) -> Self {
        let params: Params = pairs.iter().copied().collect();
        self.steps.push(Step::Send(Request::command(params)));
        self
    }

    /// Send command parameters with administrative credentials.
    pub fn send_as(mut self, username: &str, password: &str, pairs: &[(&str, &str)]) -> Self {
        let params: Params = pairs.iter().copied().collect();
        let request = Request::command(params).with_credentials(username, password);
        self.steps.push(Step::Send(request));
        self
    }

    /// Request a static page.
    pub fn page(mut self, page: Page) -> Self {
        self.steps.push(Step::Send(Request::page(page)));
        self
    }

    /// Let virtual time pass.
    pub fn advance(mut self, duration: Duration) -> Self {
        self.steps.push(Step::Advance(duration));
        self
    }

    /// Cut and restore power.
    pub fn power_loss(mut self) -> Self {
        self.steps.push(Step::PowerLoss);
        self
    }

    /// Make the update channel deliver an image on its next poll.
    pub fn queue_update(mut self) -> Self {
        self.steps.push(Step::QueueUpdate);
        self
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// The oracle is mandatory - you cannot run a scenario without
    /// verification.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute the scenario.
    ///
    /// 1. Writes the stored slots to a blank region
    /// 2. Boots the device (settling its network)
    /// 3. Executes every step in order
    /// 4. Runs the oracle against the final world
    pub fn run(self) -> Result<(), String> {
        let world = self.execute()?;
        (self.oracle)(&world).map_err(|err| format!("Scenario '{}': {err}", self.scenario.name))
    }

    fn execute(&self) -> Result<World, String> {
        let scenario = &self.scenario;

        let mut store = SecretStore::new(MemoryEeprom::new());
        for (slot, value) in &scenario.stored {
            store.write(*slot, value, Durability::Commit).map_err(|err| {
                format!("Scenario '{}': cannot store {slot:?}: {err}", scenario.name)
            })?;
        }

        let env = SimEnv::with_seed(scenario.seed);
        let mut driver = SimDriver::new(env.clone());
        let radio = driver.sim_radio_mut();
        for (name, credential) in &scenario.in_range {
            radio.add_network(name.as_str(), credential.as_str());
        }
        radio.set_join_after(scenario.join_after);

        let mut world = World::boot(driver, env, store.into_inner(), scenario.config.clone());
        for step in &scenario.steps {
            match step {
                Step::Send(request) => {
                    world.send(request.clone());
                },
                Step::Advance(duration) => world.advance(*duration),
                Step::PowerLoss => world.power_loss(),
                Step::QueueUpdate => world.driver_mut().sim_updates_mut().queue_install(),
            }
        }

        Ok(world)
    }
}
