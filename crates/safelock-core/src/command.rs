//! Command parsing.
//!
//! Requests carry named parameters (form fields or query pairs). This module
//! turns them into a [`Command`]. When several command names are present the
//! first one in this order wins:
//!
//! `status`, `version`, `open`, `lock`, `pwtest`, `unlock_1`, `unlock_all`,
//! `setauth`, `update`, then the reconfiguration form (`setwifi`,
//! `safename`, `pin`, `ssid`).

use crate::{lock::UnlockMode, network::NetworkCredentials};

/// Ordered request parameters. Repeated keys keep their first value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    /// No parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one parameter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// Builder-style [`Params::insert`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Value for `key`, or the empty string.
    pub fn get_or_empty(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    /// Whether `key` is present, whatever its value.
    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    /// Whether there are no parameters at all.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { pairs: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

/// Fields of the reconfiguration form. `None` leaves the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconfigure {
    /// New device name, suffix stripped
    pub device_name: Option<String>,
    /// New actuator pin identifier
    pub actuator_pin: Option<String>,
    /// New network to join after restart
    pub network: Option<NetworkCredentials>,
}

impl Reconfigure {
    /// Fields present in the request. Empty fields count as omitted.
    pub fn from_params(params: &Params) -> Self {
        let non_empty = |key: &str| {
            params.get(key).map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
        };

        let device_name = non_empty("safename")
            .map(|name| strip_network_suffix(&name).to_string())
            .filter(|name| !name.is_empty());

        let network = non_empty("ssid").map(|name| NetworkCredentials {
            name,
            credential: params.get_or_empty("password").to_string(),
        });

        Self { device_name, actuator_pin: non_empty("pin"), network }
    }

    /// Whether no field was supplied.
    pub fn is_empty(&self) -> bool {
        self.device_name.is_none() && self.actuator_pin.is_none() && self.network.is_none()
    }
}

/// Strip a network-name suffix (`safe.local` becomes `safe`).
pub fn strip_network_suffix(name: &str) -> &str {
    name.strip_suffix(".local").unwrap_or(name)
}

/// Parsed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Report the lock state
    Status,

    /// Report the firmware version
    Version,

    /// Drive the actuator
    Open {
        /// Hold time, zero means the default
        seconds: u32,
    },

    /// Lock with a new secret
    Lock {
        /// New secret
        secret: String,
        /// Repeated secret
        confirm: String,
    },

    /// Check a secret without changing state
    TestSecret {
        /// Candidate secret
        candidate: String,
    },

    /// Unlock with the stored secret
    Unlock {
        /// Candidate secret
        candidate: String,
        /// One open or permanent
        mode: UnlockMode,
    },

    /// Replace the administrative credentials
    SetAuth {
        /// New username (empty disables authentication)
        username: String,
        /// New password
        password: String,
    },

    /// Enable or disable firmware updates
    SetUpdateMode {
        /// Requested state
        enabled: bool,
    },

    /// Change device name, pin or network
    Reconfigure(Reconfigure),
}

/// Parse request parameters into a command. `None` when nothing matched.
pub fn parse(params: &Params) -> Option<Command> {
    let unlock = || params.get_or_empty("unlock").to_string();

    let command = if params.contains("status") {
        Command::Status
    } else if params.contains("version") {
        Command::Version
    } else if params.contains("open") {
        let seconds = params.get("duration").and_then(|d| d.trim().parse().ok()).unwrap_or(0);
        Command::Open { seconds }
    } else if params.contains("lock") {
        Command::Lock {
            secret: params.get_or_empty("lock1").to_string(),
            confirm: params.get_or_empty("lock2").to_string(),
        }
    } else if params.contains("pwtest") {
        Command::TestSecret { candidate: unlock() }
    } else if params.contains("unlock_1") {
        Command::Unlock { candidate: unlock(), mode: UnlockMode::Once }
    } else if params.contains("unlock_all") {
        Command::Unlock { candidate: unlock(), mode: UnlockMode::Permanent }
    } else if params.contains("setauth") {
        Command::SetAuth {
            username: params.get_or_empty("username").to_string(),
            password: params.get_or_empty("password").to_string(),
        }
    } else if let Some(value) = params.get("update") {
        Command::SetUpdateMode { enabled: parse_switch(value) }
    } else if is_reconfigure(params) {
        Command::Reconfigure(Reconfigure::from_params(params))
    } else {
        return None;
    };

    Some(command)
}

/// Whether the request carries any reconfiguration form field.
pub fn is_reconfigure(params: &Params) -> bool {
    ["setwifi", "safename", "pin", "ssid"].iter().any(|key| params.contains(key))
}

fn parse_switch(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "on" | "1" | "true" | "enable")
}
