//! Reference model for model-based testing.
//!
//! A deliberately naive restatement of the lock rules. Property tests run the
//! same [`Operation`]s against the model and the real runtime and compare
//! the response text and resulting state after every step.

use std::time::Duration;

use safelock_core::{LockState, Params, Request, store::MAX_VALUE_LEN};

/// Longest open accepted by the model.
const MAX_OPEN: u32 = 600;

/// One operation against the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Ask for the lock state
    Status,
    /// Lock with a secret given twice
    Lock {
        /// First copy
        secret: String,
        /// Second copy
        confirm: String,
    },
    /// Check a secret
    TestSecret {
        /// Candidate
        candidate: String,
    },
    /// Unlock for one open or permanently
    Unlock {
        /// Candidate
        candidate: String,
        /// Whether the unlock is one-time
        once: bool,
    },
    /// Open for `seconds`
    Open {
        /// Requested duration
        seconds: u32,
    },
    /// Toggle update mode
    Update {
        /// Requested state
        enabled: bool,
    },
    /// Lose power and boot again
    PowerLoss,
}

impl Operation {
    /// The request this operation sends, if any.
    pub fn request(&self) -> Option<Request> {
        let params = match self {
            Operation::Status => Params::new().with("status", ""),
            Operation::Lock { secret, confirm } => Params::new()
                .with("lock", "")
                .with("lock1", secret.as_str())
                .with("lock2", confirm.as_str()),
            Operation::TestSecret { candidate } => {
                Params::new().with("pwtest", "").with("unlock", candidate.as_str())
            },
            Operation::Unlock { candidate, once } => {
                let command = if *once { "unlock_1" } else { "unlock_all" };
                Params::new().with(command, "").with("unlock", candidate.as_str())
            },
            Operation::Open { seconds } => {
                Params::new().with("open", "").with("duration", seconds.to_string())
            },
            Operation::Update { enabled } => {
                Params::new().with("update", if *enabled { "on" } else { "off" })
            },
            Operation::PowerLoss => return None,
        };
        Some(Request::command(params))
    }
}

/// What the model predicts for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Response text, `None` for operations that send no request
    pub text: Option<String>,
    /// Virtual time the operation takes
    pub elapsed: Duration,
}

/// Reference model of a joined device without administrative credentials.
#[derive(Debug, Clone, Default)]
pub struct ModelDevice {
    secret: String,
    once: bool,
    update: bool,
}

impl ModelDevice {
    /// Fresh, unlocked device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock state the device should report.
    pub fn state(&self) -> LockState {
        match (self.secret.is_empty(), self.once) {
            (true, _) => LockState::Unlocked,
            (false, true) => LockState::UnlockedOnce,
            (false, false) => LockState::Locked,
        }
    }

    /// Whether update mode should be on.
    pub fn update_enabled(&self) -> bool {
        self.update
    }

    /// Apply an operation.
    pub fn apply(&mut self, op: &Operation) -> Outcome {
        let instant = |text: &str| Outcome { text: Some(text.to_string()), elapsed: Duration::ZERO };
        let wrong = Outcome { text: Some("Wrong password".to_string()), elapsed: Duration::from_secs(2) };

        match op {
            Operation::Status => instant(match self.state() {
                LockState::Unlocked => "Safe is unlocked",
                LockState::Locked => "Safe is locked",
                LockState::UnlockedOnce => "Safe is unlocked for one time",
            }),
            Operation::Lock { secret, confirm } => {
                if !self.secret.is_empty() {
                    instant("Safe is already locked")
                } else if secret != confirm {
                    instant("Passwords do not match")
                } else if secret.is_empty() {
                    instant("Password must not be empty")
                } else if secret.len() > MAX_VALUE_LEN {
                    instant(&format!("Password longer than {MAX_VALUE_LEN} characters"))
                } else {
                    self.secret.clone_from(secret);
                    self.update = false;
                    instant("Safe locked")
                }
            },
            Operation::TestSecret { candidate } => {
                if self.secret.is_empty() {
                    instant("Safe is not locked")
                } else if *candidate != self.secret {
                    wrong
                } else {
                    instant("Password correct")
                }
            },
            Operation::Unlock { candidate, once } => {
                if self.secret.is_empty() {
                    instant("Safe is not locked")
                } else if *candidate != self.secret {
                    wrong
                } else if *once {
                    self.once = true;
                    instant("Safe unlocked for one time")
                } else {
                    self.secret.clear();
                    self.once = false;
                    instant("Safe unlocked")
                }
            },
            Operation::Open { seconds } => {
                if *seconds > MAX_OPEN {
                    return instant(&format!("Open duration {seconds}s exceeds {MAX_OPEN}s"));
                }
                if self.state() == LockState::Locked {
                    return instant("Cannot open while locked");
                }
                self.once = false;

                let seconds = if *seconds == 0 { 5 } else { *seconds };
                let mut lines = vec![format!("Opening safe for {seconds} seconds")];
                lines.extend((1..=seconds).rev().map(|n| format!("{n} seconds remaining")));
                lines.push("Safe closed".to_string());
                Outcome { text: Some(lines.join("\n")), elapsed: Duration::from_secs(seconds.into()) }
            },
            Operation::Update { enabled } => {
                if self.state() != LockState::Unlocked {
                    return instant("Update mode can only be changed while unlocked");
                }
                self.update = *enabled;
                instant(if *enabled { "Update mode enabled" } else { "Update mode disabled" })
            },
            Operation::PowerLoss => {
                self.once = false;
                self.update = false;
                Outcome { text: None, elapsed: Duration::ZERO }
            },
        }
    }
}
