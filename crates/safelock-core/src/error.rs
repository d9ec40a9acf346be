//! Error types for the safelock core.
//!
//! This module provides strongly-typed errors for the different layers:
//! - Store errors (persistent medium faults, oversized values)
//! - Lock errors (guards that reject a lock state transition)
//! - Command errors (what the dispatch policy reports to a caller)
//!
//! None of these is fatal to the control loop. Every handler turns its error
//! into a response and the loop keeps serving.

use thiserror::Error;

use crate::store::Slot;

/// Errors from the slotted secret store and its underlying medium.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Value does not fit in a slot once marker and terminator are added
    #[error("value for {slot:?} is {len} bytes, slot holds at most {max}")]
    ValueTooLong {
        /// Slot being written
        slot: Slot,
        /// Length of the rejected value
        len: usize,
        /// Longest value the slot accepts
        max: usize,
    },

    /// Access outside the persistent region
    #[error("access at {offset}+{len} exceeds region of {size} bytes")]
    OutOfRange {
        /// Start of the access
        offset: usize,
        /// Number of bytes accessed
        len: usize,
        /// Size of the region
        size: usize,
    },

    /// Underlying medium failed
    #[error("persistent medium error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

/// Failure reported by a platform collaborator (actuator, radio, discovery,
/// update channel).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct PlatformError(pub String);

impl From<std::io::Error> for PlatformError {
    fn from(err: std::io::Error) -> Self {
        PlatformError(err.to_string())
    }
}

/// Errors returned by the lock state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// The two copies of a new secret differ
    #[error("Passwords do not match")]
    Mismatch,

    /// A new secret was empty
    #[error("Password must not be empty")]
    EmptySecret,

    /// A new secret does not fit in its slot
    #[error("Password longer than {max} characters")]
    TooLong {
        /// Longest accepted secret
        max: usize,
    },

    /// Candidate secret does not match the stored one
    #[error("Wrong password")]
    WrongSecret,

    /// Lock requested while already locked
    #[error("Safe is already locked")]
    AlreadyLocked,

    /// Unlock or secret check requested while unlocked
    #[error("Safe is not locked")]
    NotLocked,

    /// Open requested while locked
    #[error("Cannot open while locked")]
    OpenWhileLocked,

    /// Requested open duration exceeds the limit
    #[error("Open duration {requested}s exceeds {max}s")]
    DurationTooLong {
        /// Requested seconds
        requested: u32,
        /// Longest allowed open
        max: u32,
    },
}

/// Errors surfaced by the dispatch policy.
///
/// Each variant maps to one kind of response: a plain message, an
/// authentication challenge, a delayed failure or "not found".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Bad input (password mismatch, oversized value)
    #[error("{0}")]
    Validation(String),

    /// Administrative credentials missing or wrong
    #[error("authentication required")]
    Authentication,

    /// Unlock secret did not match
    #[error("Wrong password")]
    WrongSecret,

    /// Operation not allowed in the current state
    #[error("{0}")]
    Policy(String),

    /// No known command in the request
    #[error("not found")]
    NotFound,

    /// Persisting a change failed
    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl From<LockError> for CommandError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::WrongSecret => CommandError::WrongSecret,
            LockError::AlreadyLocked | LockError::NotLocked | LockError::OpenWhileLocked => {
                CommandError::Policy(err.to_string())
            },
            LockError::Mismatch
            | LockError::EmptySecret
            | LockError::TooLong { .. }
            | LockError::DurationTooLong { .. } => CommandError::Validation(err.to_string()),
        }
    }
}
