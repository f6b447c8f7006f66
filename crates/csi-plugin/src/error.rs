//! Plugin-side failures.
//!
//! [`PluginError`] is serializable so that a plugin can return it inside a
//! [`crate::PluginMessage::Error`] envelope and the client can rebuild the
//! same variant on its side of the wire.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum PluginError {
    /// The plugin rejected the request arguments.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("volume {0} not found")]
    NotFound(String),

    #[error("volume {0} already exists")]
    AlreadyExists(String),

    /// The plugin is reachable but cannot serve requests yet.
    #[error("plugin unavailable: {0}")]
    Unavailable(String),

    /// Connection, encoding or HTTP-level failure talking to the plugin.
    #[error("transport error: {0}")]
    Transport(String),

    /// The plugin answered with a message that does not match the request.
    #[error("unexpected plugin response: {0}")]
    UnexpectedResponse(String),

    #[error("internal plugin error: {0}")]
    Internal(String),
}

impl PluginError {
    pub fn transport<E: std::fmt::Display>(e: E) -> Self {
        Self::Transport(e.to_string())
    }

    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }
}

pub type PluginResult<T> = std::result::Result<T, PluginError>;
