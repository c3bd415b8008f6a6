//! Engine server supervision: spawn, capture address, register, shut down
//!
//! Startup contract with the engine binary ("print your address, then
//! serve"): the child is launched detached with the identifier in its
//! environment, writes one `host:port` line to stdout, and then listens on
//! that address. No fixed port and no service directory: the single stdout line
//! plus the registry is the whole discovery mechanism.
//!
//! ```text
//! | caller |                              | engine @ host:port |
//!
//!   spawn (GLANCE_SERVER_ID=<id>)  ----->
//!          <-----------------------------   "host:port\n" on stdout
//!   registry.put(id, addr)
//!
//!   ... later, per query, over a fresh socket ...
//!
//!   <request frame>  ------------------->
//!          <-----------------------------   <JSON response frame>
//!
//!   "Shutdown <id>"  ------------------->   server exits
//!   registry.delete(id)
//! ```

use crate::config;
use crate::error::{GlanceError, Result};
use crate::protocol;
use crate::registry::{Registry, ServerAddr, ServerId};
use std::io::{BufRead, BufReader};
use std::net::TcpStream;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Caller-supplied knobs forwarded to the engine's environment
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    /// Ask the engine to run its development build mode
    pub dev_engine: bool,
    /// Project-name hint for the engine's scratch workspace
    pub project_name: Option<String>,
    /// Extra environment variables, applied last
    pub extra_env: Vec<(String, String)>,
}

/// Handle to a running engine server
///
/// Carries only the identifier; the server deliberately outlives both this
/// handle and the process that started it. Dropping the handle does nothing.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    pub id: ServerId,
}

/// Spawn the engine as a detached server, register it, and return a handle.
///
/// Fails with `ServerStartupFailed` if the child exits (or closes stdout)
/// before printing its address line. On any failure after the spawn the
/// child is killed and reaped: it was never registered, so nothing could
/// ever reach it to shut it down.
pub fn start(
    registry: &Registry,
    engine_binary: &Path,
    options: &StartOptions,
) -> Result<ServerHandle> {
    let id = ServerId::mint();

    let mut command = Command::new(engine_binary);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .env(config::ENV_SERVER_ID, id.as_str())
        .env(config::ENV_DEV_ENGINE, if options.dev_engine { "1" } else { "0" });
    if let Some(name) = &options.project_name {
        command.env(config::ENV_PROJECT_NAME, name);
    }
    for (key, value) in &options.extra_env {
        command.env(key, value);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // New session: the server must survive the caller's exit and its
        // controlling terminal going away.
        unsafe {
            command.pre_exec(|| {
                if libc::setsid() == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
    }

    let mut child = command.spawn().map_err(|e| {
        GlanceError::ServerStartupFailed(format!(
            "cannot spawn {}: {e}",
            engine_binary.display()
        ))
    })?;

    let stdout = child.stdout.take().ok_or_else(|| {
        GlanceError::ServerStartupFailed("engine stdout was not captured".to_string())
    })?;

    // Read up to the first newline, then stop touching stdout entirely.
    let mut reader = BufReader::new(stdout);
    let mut line = String::new();
    let bytes_read = reader
        .read_line(&mut line)
        .map_err(|e| GlanceError::ServerStartupFailed(format!("reading engine stdout: {e}")))?;

    if bytes_read == 0 {
        let status = child
            .try_wait()
            .ok()
            .flatten()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "still running".to_string());
        reap(&mut child);
        return Err(GlanceError::ServerStartupFailed(format!(
            "engine closed stdout before advertising an address (status: {status})"
        )));
    }

    let addr = match ServerAddr::parse(&line) {
        Some(addr) => addr,
        None => {
            reap(&mut child);
            return Err(GlanceError::ServerStartupFailed(format!(
                "engine printed an unparsable address line: {:?}",
                line.trim_end()
            )));
        }
    };

    if let Err(e) = registry.put(&id, &addr) {
        reap(&mut child);
        return Err(e);
    }
    debug!(id = %id, addr = %addr, "engine server started");

    // Detach: no wait, no kill-on-drop. The child is reaped by init once the
    // caller exits; until then an exited server shows up as ServerUnreachable.
    drop(child);

    Ok(ServerHandle { id })
}

/// Kill and reap a child that failed startup and was never registered
fn reap(child: &mut std::process::Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Send the shutdown command and drop the registry entry.
///
/// Fire-and-forget: no acknowledgment is awaited and process exit is not
/// observed. The entry is removed even when the server is already gone, so a
/// crashed server can still be cleaned out of the table.
pub fn shutdown(registry: &Registry, id: &ServerId) -> Result<()> {
    let addr = registry.get(id)?;
    let payload = format!("Shutdown {id}");

    match TcpStream::connect((addr.host.as_str(), addr.port)) {
        Ok(mut stream) => {
            if let Err(e) = protocol::write_frame(&mut stream, payload.as_bytes()) {
                warn!(id = %id, error = %e, "failed to deliver shutdown command");
            }
        }
        Err(e) => {
            warn!(id = %id, addr = %addr, error = %e, "server unreachable during shutdown");
        }
    }

    registry.delete(id)?;
    debug!(id = %id, "server deregistered");
    Ok(())
}
