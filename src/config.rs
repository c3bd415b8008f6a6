//! Well-known paths, engine environment contract, and lock tunables
//!
//! The engine side of the contract: spawned with the variables below set, it
//! must print one `host:port` line to stdout and then serve; in standalone
//! mode it reads a request on stdin and prints a JSON response.

use std::path::PathBuf;
use std::time::Duration;

/// Overrides the registry file location (used by tests and sandboxes)
pub const REGISTRY_PATH_ENV: &str = "GLANCE_REGISTRY_PATH";

/// Registry file name under the system temp directory
const REGISTRY_FILE_NAME: &str = "glance-servers.json";

/// Engine binary resolved through PATH when no explicit path is given
pub const DEFAULT_ENGINE_BINARY: &str = "glance-engine";

/// Carries the minted server identifier to the engine
pub const ENV_SERVER_ID: &str = "GLANCE_SERVER_ID";

/// "1" asks the engine to use its development build mode, "0" the default
pub const ENV_DEV_ENGINE: &str = "GLANCE_DEV_ENGINE";

/// Optional project-name hint forwarded to the engine
pub const ENV_PROJECT_NAME: &str = "GLANCE_PROJECT_NAME";

/// How long a registry operation waits for the advisory lock before failing
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval while waiting for a contended lock
pub const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Resolve the registry file path, honoring the env override
///
/// The path must be fixed and well-known: unrelated OS processes discover
/// each other's servers solely through this file.
pub fn default_registry_path() -> PathBuf {
    if let Ok(path) = std::env::var(REGISTRY_PATH_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    std::env::temp_dir().join(REGISTRY_FILE_NAME)
}
