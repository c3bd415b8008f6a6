//! Query client: one fresh socket, one request, one response
//!
//! No session state survives the connection close, and no retries happen
//! here. A stale registry entry (server crashed without being shut down)
//! surfaces as `ServerUnreachable`, which the caller can treat as "restart or
//! give up". That decision does not belong to this layer.

use crate::error::{GlanceError, Result};
use crate::protocol;
use crate::registry::{Registry, ServerId};
use std::net::TcpStream;
use tracing::debug;

/// Send `request` to the server registered under `id` and return the raw
/// response text.
///
/// The response is returned undecoded beyond UTF-8; parsing the JSON document
/// inside is the caller's concern.
pub fn query(registry: &Registry, id: &ServerId, request: &str) -> Result<String> {
    let addr = registry.get(id)?;

    let mut stream = TcpStream::connect((addr.host.as_str(), addr.port)).map_err(|e| {
        GlanceError::ServerUnreachable(format!("server {id} at {addr}: {e}"))
    })?;
    debug!(id = %id, addr = %addr, "connected to engine server");

    protocol::write_frame(&mut stream, request.as_bytes())?;
    let payload = protocol::read_frame(&mut stream)?;

    // Socket closes when `stream` drops; one query per connection.
    String::from_utf8(payload)
        .map_err(|e| GlanceError::MalformedResponse(format!("response is not UTF-8: {e}")))
}
