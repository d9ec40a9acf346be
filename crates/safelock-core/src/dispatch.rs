//! Request authorization and dispatch.
//!
//! The [`Controller`] owns all application state: the loaded secrets, the
//! lock machine, the network identity decided at boot and the update-mode
//! flag. The runtime hands it one [`Request`] at a time and executes the
//! [`ControllerAction`]s it returns.
//!
//! # Policy
//!
//! ```text
//!                       ┌─────────────────┐
//!   Request ──────────> │ Standalone?     │── yes ──> reconfiguration (no auth)
//!                       └─────────────────┘
//!                               │ no
//!                               ↓
//!                       ┌─────────────────┐
//!                       │ admin user set? │── yes, bad creds ──> challenge
//!                       └─────────────────┘
//!                               │
//!                               ↓
//!                    page, or first matching command
//! ```
//!
//! Every error becomes a response. Nothing here is fatal to the loop.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::{
    command::{self, Command, Params, Reconfigure},
    error::CommandError,
    lock::{LockAction, LockMachine, LockState, UnlockMode},
    network::NetworkIdentity,
    open::OpenSequence,
    store::{Durability, Eeprom, MAX_VALUE_LEN, SecretStore, Secrets, Slot},
};

/// Firmware version reported by the `version` command.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Administrative credentials presented with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Presented username
    pub username: String,
    /// Presented password
    pub password: String,
}

/// Static pages served alongside the command endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Page {
    /// Frameset
    Index,
    /// Title frame
    TopFrame,
    /// Menu with the command forms
    MenuFrame,
    /// Administrative credential form
    ChangeAuth,
    /// Network and device configuration form
    Provisioning,
}

/// What a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The command endpoint; parameters select the command
    Command,
    /// A static page
    Page(Page),
    /// A path the transport has no route for
    Unrouted,
}

/// One inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Endpoint
    pub target: Target,
    /// Named parameters
    pub params: Params,
    /// Administrative credentials, if the transport carried any
    pub credentials: Option<Credentials>,
}

impl Request {
    /// Request to the command endpoint.
    pub fn command(params: Params) -> Self {
        Self { target: Target::Command, params, credentials: None }
    }

    /// Request for a static page.
    pub fn page(page: Page) -> Self {
        Self { target: Target::Page(page), params: Params::new(), credentials: None }
    }

    /// Request for a path outside every route.
    pub fn unrouted() -> Self {
        Self { target: Target::Unrouted, params: Params::new(), credentials: None }
    }

    /// Replace the parameters.
    #[must_use]
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Attach administrative credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials { username: username.into(), password: password.into() });
        self
    }
}

/// Response body handed back to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Plain text message
    Text(String),
    /// Rendered page with named substitutions
    Page {
        /// Page template
        page: Page,
        /// Values for the template's placeholders
        vars: Vec<(&'static str, String)>,
    },
    /// Authentication challenge; nothing was processed
    Challenge {
        /// Realm to present
        realm: String,
    },
    /// No known command
    NotFound,
}

impl Response {
    fn text(message: impl Into<String>) -> Self {
        Response::Text(message.into())
    }
}

/// Actions returned by the controller, executed in order by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerAction {
    /// Block before continuing (wrong-secret penalty)
    Delay(Duration),
    /// Send this response
    Respond(Response),
    /// Run an open sequence on `pin` and stream its progress as the response
    Open {
        /// Actuator pin
        pin: String,
        /// Steps to execute
        sequence: OpenSequence,
    },
    /// Advertise the device under a new name
    Advertise {
        /// Device name
        name: String,
    },
    /// Restart the device after a delay
    ScheduleRestart {
        /// Delay before restarting
        after: Duration,
    },
}

/// Controller tunables.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Penalty before reporting a wrong unlock secret
    pub wrong_secret_delay: Duration,
    /// Delay between accepting new network settings and restarting
    pub restart_delay: Duration,
    /// Realm presented in authentication challenges
    pub realm: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            wrong_secret_delay: Duration::from_secs(2),
            restart_delay: Duration::from_secs(5),
            realm: "safe".to_string(),
        }
    }
}

/// Application state and dispatch policy.
#[derive(Debug)]
pub struct Controller<E> {
    store: SecretStore<E>,
    secrets: Secrets,
    lock: LockMachine,
    network: NetworkIdentity,
    update_enabled: bool,
    config: ControllerConfig,
}

impl<E: Eeprom> Controller<E> {
    /// Load every slot from `store` and derive the lock state.
    ///
    /// `network` is the identity settled by the network phase of boot.
    pub fn new(store: SecretStore<E>, network: NetworkIdentity, config: ControllerConfig) -> Self {
        let secrets = store.load();
        let lock = LockMachine::from_secret(secrets.unlock_secret.clone());
        info!(
            lock = ?lock.state(),
            ?network,
            device = secrets.device_name(),
            auth = secrets.requires_auth(),
            "controller ready"
        );

        Self { store, secrets, lock, network, update_enabled: false, config }
    }

    /// Forget all volatile state and start over from the store, as after a
    /// restart.
    pub fn reboot(&mut self, network: NetworkIdentity) {
        self.secrets = self.store.load();
        self.lock = LockMachine::from_secret(self.secrets.unlock_secret.clone());
        self.network = network;
        self.update_enabled = false;
        info!(lock = ?self.lock.state(), ?network, "controller rebooted");
    }

    /// Current lock state.
    pub fn lock_state(&self) -> LockState {
        self.lock.state()
    }

    /// Network identity decided at boot.
    pub fn network(&self) -> NetworkIdentity {
        self.network
    }

    /// Whether the firmware update channel should be serviced.
    pub fn update_enabled(&self) -> bool {
        self.update_enabled
    }

    /// In-memory copy of the stored slots.
    pub fn secrets(&self) -> &Secrets {
        &self.secrets
    }

    /// The backing store.
    pub fn store(&self) -> &SecretStore<E> {
        &self.store
    }

    /// Mutable access to the store, bypassing the cached slots.
    ///
    /// Only for fault injection; call [`Controller::reboot`] afterwards.
    pub fn store_mut(&mut self) -> &mut SecretStore<E> {
        &mut self.store
    }

    /// Tear down, returning the store for the next boot.
    pub fn into_store(self) -> SecretStore<E> {
        self.store
    }

    /// Handle one request.
    pub fn handle(&mut self, request: &Request) -> Vec<ControllerAction> {
        if self.network == NetworkIdentity::Standalone {
            debug!(target = ?request.target, "standalone, forcing reconfiguration");
            let reconfigure = Reconfigure::from_params(&request.params);
            return self.reconfigure(&reconfigure).unwrap_or_else(|err| self.reject(err));
        }

        if let Err(err) = self.authorize(request) {
            return self.reject(err);
        }

        let result = match request.target {
            // The provisioning form posts back to its own page.
            Target::Page(Page::Provisioning) => {
                self.reconfigure(&Reconfigure::from_params(&request.params))
            },
            Target::Page(page) => Ok(vec![ControllerAction::Respond(self.page(page))]),
            Target::Command => match command::parse(&request.params) {
                Some(command) => self.execute(command),
                None => Err(CommandError::NotFound),
            },
            Target::Unrouted => Err(CommandError::NotFound),
        };

        result.unwrap_or_else(|err| self.reject(err))
    }

    fn authorize(&self, request: &Request) -> Result<(), CommandError> {
        if !self.secrets.requires_auth() {
            return Ok(());
        }

        match &request.credentials {
            Some(c)
                if c.username == self.secrets.admin_user
                    && c.password == self.secrets.admin_password =>
            {
                Ok(())
            },
            Some(c) => {
                warn!(username = %c.username, "rejected administrative credentials");
                Err(CommandError::Authentication)
            },
            None => Err(CommandError::Authentication),
        }
    }

    fn execute(&mut self, command: Command) -> Result<Vec<ControllerAction>, CommandError> {
        debug!(?command, "dispatching");
        let respond = |message: &str| Ok(vec![ControllerAction::Respond(Response::text(message))]);

        match command {
            Command::Status => respond(self.lock.state().describe()),
            Command::Version => respond(&format!("Safelock firmware {VERSION}")),
            Command::Open { seconds } => {
                let sequence = self.lock.begin_open(seconds)?;
                self.after_lock_transition();
                let pin = self.secrets.actuator_pin().to_string();
                Ok(vec![ControllerAction::Open { pin, sequence }])
            },
            Command::Lock { secret, confirm } => {
                let actions = self.lock.set_lock(&secret, &confirm)?;
                self.after_lock_transition();
                self.apply(actions)?;
                respond("Safe locked")
            },
            Command::TestSecret { candidate } => {
                self.lock.verify(&candidate)?;
                respond("Password correct")
            },
            Command::Unlock { candidate, mode } => {
                let actions = self.lock.unlock(&candidate, mode)?;
                self.after_lock_transition();
                self.apply(actions)?;
                match mode {
                    UnlockMode::Once => respond("Safe unlocked for one time"),
                    UnlockMode::Permanent => respond("Safe unlocked"),
                }
            },
            Command::SetAuth { username, password } => {
                check_length("Username", &username)?;
                check_length("Password", &password)?;
                self.persist(Slot::AdminUser, &username, Durability::Defer)?;
                self.persist(Slot::AdminPassword, &password, Durability::Commit)?;
                info!(auth = !username.is_empty(), "administrative credentials replaced");
                respond("Authentication details updated")
            },
            Command::SetUpdateMode { enabled } => {
                if !self.lock.is_unlocked() {
                    return Err(CommandError::Policy(
                        "Update mode can only be changed while unlocked".to_string(),
                    ));
                }
                self.update_enabled = enabled;
                info!(enabled, "update mode changed");
                respond(if enabled { "Update mode enabled" } else { "Update mode disabled" })
            },
            Command::Reconfigure(reconfigure) => self.reconfigure(&reconfigure),
        }
    }

    fn reconfigure(&mut self, reconfigure: &Reconfigure) -> Result<Vec<ControllerAction>, CommandError> {
        if reconfigure.is_empty() {
            return Ok(vec![ControllerAction::Respond(self.page(Page::Provisioning))]);
        }

        if let Some(name) = &reconfigure.device_name {
            check_length("Safe name", name)?;
        }
        if let Some(pin) = &reconfigure.actuator_pin {
            check_length("Pin", pin)?;
        }
        if let Some(network) = &reconfigure.network {
            check_length("SSID", &network.name)?;
            check_length("WiFi password", &network.credential)?;
        }

        let mut actions = Vec::new();
        if let Some(name) = &reconfigure.device_name {
            self.persist(Slot::DeviceName, name, Durability::Commit)?;
            info!(device = %name, "device name changed");
            actions.push(ControllerAction::Advertise { name: name.clone() });
        }
        if let Some(pin) = &reconfigure.actuator_pin {
            self.persist(Slot::ActuatorPin, pin, Durability::Commit)?;
            info!(%pin, "actuator pin changed");
        }

        let Some(network) = &reconfigure.network else {
            actions.push(ControllerAction::Respond(Response::text("Settings saved")));
            return Ok(actions);
        };

        self.persist(Slot::NetworkName, &network.name, Durability::Defer)?;
        self.persist(Slot::NetworkCredential, &network.credential, Durability::Commit)?;
        self.update_enabled = false;

        let after = self.config.restart_delay;
        info!(network = %network.name, ?after, "network changed, restart scheduled");
        actions.push(ControllerAction::Respond(Response::text(format!(
            "WiFi settings saved, restarting in {} seconds",
            after.as_secs()
        ))));
        actions.push(ControllerAction::ScheduleRestart { after });
        Ok(actions)
    }

    /// Leaving `Unlocked` always turns update mode off.
    fn after_lock_transition(&mut self) {
        if !self.lock.is_unlocked() && self.update_enabled {
            self.update_enabled = false;
            info!(lock = ?self.lock.state(), "update mode disabled by locking");
        }
    }

    fn apply(&mut self, actions: Vec<LockAction>) -> Result<(), CommandError> {
        for action in actions {
            match action {
                LockAction::PersistSecret(secret) => {
                    self.persist(Slot::UnlockSecret, &secret, Durability::Commit)?;
                },
                LockAction::ClearSecret => self.persist(Slot::UnlockSecret, "", Durability::Commit)?,
            }
        }
        Ok(())
    }

    fn persist(&mut self, slot: Slot, value: &str, durability: Durability) -> Result<(), CommandError> {
        *self.secrets.slot_mut(slot) = value.to_string();
        self.store.write(slot, value, durability).map_err(|err| {
            error!(?slot, %err, "failed to persist slot");
            CommandError::from(err)
        })
    }

    fn page(&self, page: Page) -> Response {
        Response::Page { page, vars: vec![("device", self.secrets.device_name().to_string())] }
    }

    fn reject(&self, err: CommandError) -> Vec<ControllerAction> {
        let response = match err {
            CommandError::Authentication => {
                Response::Challenge { realm: self.config.realm.clone() }
            },
            CommandError::WrongSecret => {
                return vec![
                    ControllerAction::Delay(self.config.wrong_secret_delay),
                    ControllerAction::Respond(Response::text(err.to_string())),
                ];
            },
            CommandError::NotFound => Response::NotFound,
            CommandError::Validation(message) | CommandError::Policy(message) => {
                Response::Text(message)
            },
            CommandError::Storage(_) => Response::text(err.to_string()),
        };
        vec![ControllerAction::Respond(response)]
    }
}

fn check_length(field: &str, value: &str) -> Result<(), CommandError> {
    if value.len() > MAX_VALUE_LEN {
        return Err(CommandError::Validation(format!(
            "{field} longer than {MAX_VALUE_LEN} characters"
        )));
    }
    Ok(())
}
