//! Lock state machine.
//!
//! # State Machine
//!
//! ```text
//! ┌──────────┐  set_lock(s, s)   ┌────────┐  unlock(s, Once)  ┌──────────────┐
//! │ Unlocked │ ────────────────> │ Locked │ ────────────────> │ UnlockedOnce │
//! └──────────┘                   └────────┘                   └──────────────┘
//!      ↑                          │    ↑        begin_open          │
//!      │  unlock(s, Permanent)    │    └────────────────────────────┘
//!      └──────────────────────────┘         (grant consumed)
//! ```
//!
//! The state is never persisted. At boot it is derived from the stored
//! unlock secret ([`LockState::derive`]): a device that had a secret comes
//! up `Locked`, even if it was in `UnlockedOnce` when it lost power.
//!
//! Methods return [`LockAction`]s describing what must be persisted; the
//! caller applies them to the store.

use tracing::{info, warn};

use crate::{
    error::LockError,
    open::{MAX_OPEN_SECS, OpenSequence},
    store::MAX_VALUE_LEN,
};

/// Lock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockState {
    /// No secret set, opens freely
    Unlocked,
    /// Secret set, opening refused
    Locked,
    /// Secret still set, exactly one open allowed
    UnlockedOnce,
}

impl LockState {
    /// Boot-time state for a stored unlock secret.
    pub fn derive(unlock_secret: &str) -> Self {
        if unlock_secret.is_empty() { LockState::Unlocked } else { LockState::Locked }
    }

    /// Human-readable status line.
    pub fn describe(self) -> &'static str {
        match self {
            LockState::Unlocked => "Safe is unlocked",
            LockState::Locked => "Safe is locked",
            LockState::UnlockedOnce => "Safe is unlocked for one time",
        }
    }
}

/// How long an unlock lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockMode {
    /// Allow a single open, then lock again
    Once,
    /// Clear the secret and stay unlocked
    Permanent,
}

/// Persistence required by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockAction {
    /// Store this value as the unlock secret
    PersistSecret(String),
    /// Store the empty unlock secret
    ClearSecret,
}

/// Lock state machine.
///
/// Holds the current state and an in-memory copy of the unlock secret.
#[derive(Debug, Clone)]
pub struct LockMachine {
    state: LockState,
    secret: String,
}

impl LockMachine {
    /// Machine in the state derived from `secret`.
    pub fn from_secret(secret: impl Into<String>) -> Self {
        let secret = secret.into();
        Self { state: LockState::derive(&secret), secret }
    }

    /// Current state.
    pub fn state(&self) -> LockState {
        self.state
    }

    /// Whether a secret is currently required.
    pub fn is_unlocked(&self) -> bool {
        self.state == LockState::Unlocked
    }

    /// Lock with a new secret, given twice.
    ///
    /// # Errors
    ///
    /// - `AlreadyLocked` unless `Unlocked`
    /// - `Mismatch`, `EmptySecret`, `TooLong` for a bad secret
    pub fn set_lock(&mut self, secret: &str, confirm: &str) -> Result<Vec<LockAction>, LockError> {
        if self.state != LockState::Unlocked {
            return Err(LockError::AlreadyLocked);
        }
        if secret != confirm {
            return Err(LockError::Mismatch);
        }
        if secret.is_empty() {
            return Err(LockError::EmptySecret);
        }
        if secret.len() > MAX_VALUE_LEN {
            return Err(LockError::TooLong { max: MAX_VALUE_LEN });
        }

        self.state = LockState::Locked;
        self.secret = secret.to_string();
        info!("safe locked");

        Ok(vec![LockAction::PersistSecret(self.secret.clone())])
    }

    /// Check a candidate secret without changing state.
    ///
    /// # Errors
    ///
    /// - `NotLocked` when there is no secret to check against
    /// - `WrongSecret` on mismatch
    pub fn verify(&self, candidate: &str) -> Result<(), LockError> {
        if self.state == LockState::Unlocked {
            return Err(LockError::NotLocked);
        }
        if candidate != self.secret {
            warn!(state = ?self.state, "wrong unlock secret");
            return Err(LockError::WrongSecret);
        }
        Ok(())
    }

    /// Unlock with the stored secret.
    ///
    /// `Once` leaves the secret in place and allows one open. `Permanent`
    /// clears the secret.
    pub fn unlock(
        &mut self,
        candidate: &str,
        mode: UnlockMode,
    ) -> Result<Vec<LockAction>, LockError> {
        self.verify(candidate)?;

        match mode {
            UnlockMode::Once => {
                self.state = LockState::UnlockedOnce;
                info!("safe unlocked for one open");
                Ok(vec![])
            },
            UnlockMode::Permanent => {
                self.state = LockState::Unlocked;
                self.secret.clear();
                info!("safe unlocked permanently");
                Ok(vec![LockAction::ClearSecret])
            },
        }
    }

    /// Start an open of `seconds` (zero means the default).
    ///
    /// From `UnlockedOnce` the grant is consumed here, before the actuator
    /// moves, so an interrupted open cannot be replayed.
    ///
    /// # Errors
    ///
    /// - `OpenWhileLocked` from `Locked`
    /// - `DurationTooLong` above [`MAX_OPEN_SECS`]
    pub fn begin_open(&mut self, seconds: u32) -> Result<OpenSequence, LockError> {
        if seconds > MAX_OPEN_SECS {
            return Err(LockError::DurationTooLong { requested: seconds, max: MAX_OPEN_SECS });
        }

        match self.state {
            LockState::Locked => Err(LockError::OpenWhileLocked),
            LockState::UnlockedOnce => {
                self.state = LockState::Locked;
                info!("one-time grant consumed");
                Ok(OpenSequence::new(seconds))
            },
            LockState::Unlocked => Ok(OpenSequence::new(seconds)),
        }
    }
}
