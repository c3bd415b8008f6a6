//! Sync bridge: run blocking network I/O on an isolated worker and join
//!
//! Callers sit on a single synchronous call stack that must not suspend, so
//! the socket work is delegated to a dedicated worker thread and the caller
//! blocks on a plain join instead of raw I/O. One outstanding call per
//! invocation; no batching.
//!
//! The unbounded form can stall the caller forever if the peer never
//! completes a frame. That is tolerable for short CLI invocations, which is the
//! expected caller. Anything longer-lived should use the timeout form.

use crate::error::{GlanceError, Result};
use std::panic;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Run `op` on a worker thread and block until it finishes.
///
/// The worker's result or failure is handed back verbatim; a panic in the
/// worker is resumed on the calling thread rather than swallowed.
pub fn call_sync<T, F>(op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let worker = thread::Builder::new()
        .name("glance-bridge".to_string())
        .spawn(op)?;

    match worker.join() {
        Ok(result) => result,
        Err(payload) => panic::resume_unwind(payload),
    }
}

/// Like [`call_sync`], but gives up after `timeout`.
///
/// On timeout the worker is abandoned, not cancelled; its socket eventually
/// errors out on its own. The caller gets `ServerUnreachable`.
pub fn call_sync_with_timeout<T, F>(op: F, timeout: Duration) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let worker = thread::Builder::new()
        .name("glance-bridge".to_string())
        .spawn(move || {
            let _ = tx.send(op());
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            let _ = worker.join();
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => Err(GlanceError::ServerUnreachable(format!(
            "operation did not complete within {timeout:?}"
        ))),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            // Sender dropped without sending: the worker panicked.
            match worker.join() {
                Err(payload) => panic::resume_unwind(payload),
                Ok(()) => Err(GlanceError::ServerUnreachable(
                    "bridge worker exited without a result".to_string(),
                )),
            }
        }
    }
}
