//! Network identity state machine.
//!
//! # State Machine
//!
//! ```text
//! ┌──────────────┐  stored name   ┌─────────┐  associated   ┌────────┐
//! │ Initializing │───────────────>│ Joining │──────────────>│ Joined │
//! └──────────────┘                └─────────┘               └────────┘
//!        │                             │
//!        │ no stored name              │ attempts exhausted
//!        ↓                             ↓
//!   ┌────────────┐              ┌────────────┐
//!   │ Standalone │              │ Standalone │
//!   └────────────┘              └────────────┘
//! ```
//!
//! The outcome is recomputed on every boot. There is no persisted "last
//! known good" network and no retry after boot: a device in `Standalone`
//! leaves it only through reconfiguration followed by a restart.
//!
//! Like the lock machine, this one performs no I/O. [`NetworkMachine::boot`]
//! and [`NetworkMachine::poll`] return [`NetworkAction`]s; [`join`] drives
//! them against a [`Radio`] and an [`Environment`].

use std::time::Duration;

use tracing::{info, warn};

use crate::{env::Environment, platform::Radio};

/// Name and credential of a network to join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkCredentials {
    /// Network name
    pub name: String,
    /// Network credential (may be empty for open networks)
    pub credential: String,
}

/// Settled network identity, decided once per boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkIdentity {
    /// Connected to the configured network
    Joined,
    /// Hosting our own network for provisioning
    Standalone,
}

/// Network machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    /// Boot not started
    Initializing,
    /// Waiting for association
    Joining {
        /// Association checks that failed so far
        attempts: u32,
    },
    /// Associated
    Joined,
    /// Hosting the standalone network
    Standalone,
}

/// Join timing.
#[derive(Debug, Clone)]
pub struct JoinConfig {
    /// Association checks before falling back to standalone
    pub max_attempts: u32,
    /// Wait between checks
    pub retry_interval: Duration,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self { max_attempts: 60, retry_interval: Duration::from_secs(1) }
    }
}

/// Actions returned by the network state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkAction {
    /// Start associating with this network
    Associate(NetworkCredentials),
    /// Wait, then poll again
    Wait(Duration),
    /// Host an open network with this name
    HostStandalone {
        /// Name of the hosted network
        name: String,
    },
}

/// Name of the standalone network for a chip id.
///
/// Deterministic, so an operator can find a given device again.
pub fn standalone_name(chip_id: u32) -> String {
    format!("Safe-{:06X}", chip_id & 0x00FF_FFFF)
}

/// Network identity state machine.
#[derive(Debug, Clone)]
pub struct NetworkMachine {
    state: NetworkState,
    config: JoinConfig,
    chip_id: u32,
}

impl NetworkMachine {
    /// Machine in `Initializing`.
    pub fn new(config: JoinConfig, chip_id: u32) -> Self {
        Self { state: NetworkState::Initializing, config, chip_id }
    }

    /// Current state.
    pub fn state(&self) -> NetworkState {
        self.state
    }

    /// Identity once settled, `None` while initializing or joining.
    pub fn identity(&self) -> Option<NetworkIdentity> {
        match self.state {
            NetworkState::Joined => Some(NetworkIdentity::Joined),
            NetworkState::Standalone => Some(NetworkIdentity::Standalone),
            NetworkState::Initializing | NetworkState::Joining { .. } => None,
        }
    }

    /// Start the boot sequence from the stored credentials.
    ///
    /// An empty or missing network name skips joining entirely.
    pub fn boot(&mut self, credentials: Option<&NetworkCredentials>) -> Vec<NetworkAction> {
        if self.state != NetworkState::Initializing {
            return vec![];
        }

        match credentials.filter(|c| !c.name.is_empty()) {
            Some(credentials) => {
                info!(network = %credentials.name, "joining network");
                self.state = NetworkState::Joining { attempts: 0 };
                vec![
                    NetworkAction::Associate(credentials.clone()),
                    NetworkAction::Wait(self.config.retry_interval),
                ]
            },
            None => {
                info!("no network configured");
                self.fall_back()
            },
        }
    }

    /// Report the outcome of one association check.
    ///
    /// Every check follows a [`NetworkAction::Wait`], so `max_attempts`
    /// failures span `max_attempts * retry_interval`.
    pub fn poll(&mut self, associated: bool) -> Vec<NetworkAction> {
        let NetworkState::Joining { attempts } = self.state else {
            return vec![];
        };

        if associated {
            info!(attempts, "joined network");
            self.state = NetworkState::Joined;
            return vec![];
        }

        let attempts = attempts + 1;
        if attempts >= self.config.max_attempts {
            warn!(attempts, "could not join network");
            return self.fall_back();
        }

        self.state = NetworkState::Joining { attempts };
        vec![NetworkAction::Wait(self.config.retry_interval)]
    }

    fn fall_back(&mut self) -> Vec<NetworkAction> {
        self.state = NetworkState::Standalone;
        let name = standalone_name(self.chip_id);
        info!(%name, "hosting standalone network");
        vec![NetworkAction::HostStandalone { name }]
    }
}

/// Run the network phase of boot to completion.
///
/// Blocks for up to `max_attempts * retry_interval`. Radio failures while
/// associating count as failed attempts; a failure to host the standalone
/// network is logged and the device still considers itself standalone.
pub fn join<R, E>(
    credentials: Option<&NetworkCredentials>,
    config: JoinConfig,
    radio: &mut R,
    env: &E,
) -> NetworkIdentity
where
    R: Radio + ?Sized,
    E: Environment,
{
    let mut machine = NetworkMachine::new(config, radio.chip_id());
    let mut pending = machine.boot(credentials);

    while !pending.is_empty() {
        let mut next = Vec::new();
        for action in pending {
            match action {
                NetworkAction::Associate(credentials) => {
                    if let Err(err) = radio.associate(&credentials) {
                        warn!(%err, "association request failed");
                    }
                },
                NetworkAction::Wait(interval) => {
                    env.sleep(interval);
                    next.extend(machine.poll(radio.is_associated()));
                },
                NetworkAction::HostStandalone { name } => {
                    if let Err(err) = radio.host_standalone(&name) {
                        warn!(%err, "failed to host standalone network");
                    }
                },
            }
        }
        pending = next;
    }

    // Every path out of Joining settles the machine.
    machine.identity().unwrap_or(NetworkIdentity::Standalone)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn home() -> NetworkCredentials {
        NetworkCredentials { name: "home".to_string(), credential: "hunter2".to_string() }
    }

    #[test]
    fn no_stored_name_goes_standalone() {
        let mut machine = NetworkMachine::new(JoinConfig::default(), 0xABCDEF);
        let actions = machine.boot(None);

        assert_eq!(machine.identity(), Some(NetworkIdentity::Standalone));
        assert_eq!(actions, vec![NetworkAction::HostStandalone { name: "Safe-ABCDEF".into() }]);
    }

    #[test]
    fn empty_stored_name_goes_standalone() {
        let mut machine = NetworkMachine::new(JoinConfig::default(), 1);
        let credentials = NetworkCredentials { name: String::new(), credential: "x".into() };
        machine.boot(Some(&credentials));
        assert_eq!(machine.state(), NetworkState::Standalone);
    }

    #[test]
    fn join_succeeds_while_attempts_remain() {
        let mut machine = NetworkMachine::new(JoinConfig::default(), 1);
        let actions = machine.boot(Some(&home()));
        assert_eq!(actions, vec![
            NetworkAction::Associate(home()),
            NetworkAction::Wait(Duration::from_secs(1)),
        ]);
        assert_eq!(machine.identity(), None);

        for _ in 0..10 {
            let actions = machine.poll(false);
            assert_eq!(actions, vec![NetworkAction::Wait(Duration::from_secs(1))]);
        }
        assert_eq!(machine.state(), NetworkState::Joining { attempts: 10 });

        assert!(machine.poll(true).is_empty());
        assert_eq!(machine.identity(), Some(NetworkIdentity::Joined));
    }

    #[test]
    fn exhausted_attempts_fall_back() {
        let config = JoinConfig { max_attempts: 3, retry_interval: Duration::from_secs(1) };
        let mut machine = NetworkMachine::new(config, 0x1234);
        machine.boot(Some(&home()));

        machine.poll(false);
        machine.poll(false);
        let actions = machine.poll(false);

        assert_eq!(actions, vec![NetworkAction::HostStandalone { name: "Safe-001234".into() }]);
        assert_eq!(machine.identity(), Some(NetworkIdentity::Standalone));
    }

    #[test]
    fn settled_machine_ignores_input() {
        let mut machine = NetworkMachine::new(JoinConfig::default(), 1);
        machine.boot(None);

        assert!(machine.poll(true).is_empty());
        assert!(machine.boot(Some(&home())).is_empty());
        assert_eq!(machine.state(), NetworkState::Standalone);
    }

    #[test]
    fn standalone_name_uses_low_24_bits() {
        assert_eq!(standalone_name(0xFF12_3456), "Safe-123456");
        assert_eq!(standalone_name(0x0a), "Safe-00000A");
    }
}
