//! Error types for the glance client layer
//!
//! Every failure surfaces to the immediate caller as a distinguishable kind;
//! nothing in this crate retries automatically. Restart policy belongs to the
//! caller, which knows whether re-spawning a dead engine is safe.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, GlanceError>;

/// Errors produced by the registry, codec, supervisor, and runner layers
#[derive(Debug, Error)]
pub enum GlanceError {
    /// Registry file exists but cannot be read or parsed as a valid table
    #[error("registry table at {path} is unreadable or corrupt: {detail}")]
    RegistryCorrupt { path: PathBuf, detail: String },

    /// Advisory lock on the registry could not be acquired in time
    #[error("timed out waiting for the registry lock at {path}")]
    LockTimeout { path: PathBuf },

    /// No registry entry for the given server identifier
    #[error("no registered server with id {0}")]
    ServerNotFound(String),

    /// Engine process exited or misbehaved before advertising its address
    #[error("engine server failed to start: {0}")]
    ServerStartupFailed(String),

    /// Registry entry exists but nothing answered at the recorded address
    #[error("server unreachable: {0}")]
    ServerUnreachable(String),

    /// Stream closed (or desynchronized) before a complete frame arrived
    #[error("stream closed before a complete frame was read")]
    IncompleteFrame,

    /// One-shot engine subprocess failed to run or exited non-zero
    #[error("engine invocation failed: {0}")]
    EngineInvocationFailed(String),

    /// Server replied, but the payload was not the UTF-8 JSON it promised
    #[error("malformed engine response: {0}")]
    MalformedResponse(String),

    /// I/O error outside the cases above
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
