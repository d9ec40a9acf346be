//! Server error types.

use thiserror::Error;

/// Errors that stop the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration could not be assembled
    #[error("configuration error: {0}")]
    Config(String),

    /// Config file is not valid TOML for this server
    #[error("config file: {0}")]
    ConfigFile(#[from] toml::de::Error),

    /// Listener could not be created
    #[error("cannot listen on {addr}: {reason}")]
    Bind {
        /// Address requested
        addr: String,
        /// Underlying failure
        reason: String,
    },

    /// Filesystem or socket failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
