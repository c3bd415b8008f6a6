//! Standalone runner: one engine subprocess per call, stdin in, stdout out
//!
//! No socket, no registry, no identifier. The engine's whole lifetime is
//! scoped to the call, which makes this the fallback path when no persistent
//! server id is supplied: correct, but paying full engine startup cost every
//! time.

use crate::error::{GlanceError, Result};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Run the engine once: feed `request` on stdin, return its stdout as text.
///
/// A non-zero exit is `EngineInvocationFailed`; parsing stdout as a response
/// document happens in the caller.
pub fn run_standalone(engine_binary: &Path, request: &str) -> Result<String> {
    debug!(binary = %engine_binary.display(), "running engine standalone");

    let mut child = Command::new(engine_binary)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| {
            GlanceError::EngineInvocationFailed(format!(
                "cannot spawn {}: {e}",
                engine_binary.display()
            ))
        })?;

    {
        let mut stdin = child.stdin.take().ok_or_else(|| {
            GlanceError::EngineInvocationFailed("engine stdin was not captured".to_string())
        })?;
        stdin.write_all(request.as_bytes()).map_err(|e| {
            // Broken pipe here means the engine died before reading the input.
            GlanceError::EngineInvocationFailed(format!("writing request to engine: {e}"))
        })?;
        // Dropping stdin closes it; the engine reads to EOF before answering.
    }

    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(GlanceError::EngineInvocationFailed(format!(
            "engine exited with {}",
            output.status
        )));
    }

    String::from_utf8(output.stdout).map_err(|_| {
        GlanceError::EngineInvocationFailed("engine produced non-UTF-8 output".to_string())
    })
}
