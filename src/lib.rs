//! Client and server-lifecycle layer for the glance snippet-analysis engine
//!
//! The engine, the external tool that actually parses and type-checks
//! snippets, is a black box here. This crate is everything around it:
//!
//! - `registry`: crash-tolerant, cross-process table mapping server ids to
//!   network addresses, shared through one lock-protected file
//! - `protocol`: 4-byte big-endian length-prefixed frames on a stream socket
//! - `server`: spawn the engine detached, capture its address, register it,
//!   and later send the shutdown command
//! - `client`: one socket per query, resolved through the registry
//! - `bridge`: blocks a synchronous caller on a worker-thread join instead of
//!   raw socket I/O
//! - `standalone`: one-shot subprocess path used when no server id is given
//!
//! The two call paths, from [`analyze`]:
//!
//! ```text
//! no server id:   caller -> standalone runner -> engine process (one-shot)
//! server id:      caller -> bridge -> client -> registry -> socket -> engine server
//! ```

pub mod bridge;
pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod standalone;

pub use error::{GlanceError, Result};
pub use protocol::{read_frame, write_frame};
pub use registry::{Registry, ServerAddr, ServerId};
pub use server::{shutdown, start, ServerHandle, StartOptions};

use std::path::PathBuf;

/// Options for a single [`analyze`] call
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Use the persistent server registered under this id instead of a
    /// one-shot engine subprocess
    pub server_id: Option<ServerId>,
    /// Engine binary to run (standalone mode only); defaults to
    /// `glance-engine` resolved through PATH
    pub engine_binary: Option<PathBuf>,
}

/// Analyze one source snippet and return the engine's response document.
///
/// `extension` is a language hint and currently advisory only: the engine
/// decides what to do with the snippet. With `options.server_id` set, the
/// query goes to the long-lived server through the sync bridge; otherwise the
/// engine is spawned once for this call.
pub fn analyze(
    code: &str,
    _extension: &str,
    options: &AnalyzeOptions,
) -> Result<serde_json::Value> {
    if let Some(id) = options.server_id.clone() {
        let request = code.to_string();
        let response = bridge::call_sync(move || {
            let registry = Registry::from_env();
            client::query(&registry, &id, &request)
        })?;
        return serde_json::from_str(&response)
            .map_err(|e| GlanceError::MalformedResponse(e.to_string()));
    }

    let engine_binary = options
        .engine_binary
        .clone()
        .unwrap_or_else(|| PathBuf::from(config::DEFAULT_ENGINE_BINARY));
    let response = standalone::run_standalone(&engine_binary, code)?;
    serde_json::from_str(&response).map_err(|e| {
        GlanceError::EngineInvocationFailed(format!("engine printed an unparsable response: {e}"))
    })
}
