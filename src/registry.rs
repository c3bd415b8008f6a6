//! File-backed registry mapping server identifiers to network addresses
//!
//! The registry is the only state shared between the unrelated OS processes
//! that start, query, and shut down engine servers. It is a JSON object
//! (`{ "<id>": "<host:port>", ... }`) in a single well-known file, with every
//! read-modify-write cycle serialized by an advisory lock.
//!
//! Two deliberate choices:
//! - Lookups take the lock too. Skipping it for reads reintroduces races with
//!   concurrent writers.
//! - Writes go to a temp path and are renamed into place, so a reader never
//!   observes a half-written table. The lock therefore lives in a sidecar
//!   `.lock` file whose inode survives the renames.

use crate::config;
use crate::error::{GlanceError, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

/// Opaque identifier naming one running engine server
///
/// Minted once when a server starts and immutable afterward; any process
/// holding the identifier can resolve the server through the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(String);

impl ServerId {
    /// Mint a fresh, globally unique identifier
    pub fn mint() -> Self {
        ServerId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ServerId {
    fn from(s: String) -> Self {
        ServerId(s)
    }
}

impl From<&str> for ServerId {
    fn from(s: &str) -> Self {
        ServerId(s.to_string())
    }
}

/// Listening address advertised by an engine server on startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddr {
    pub host: String,
    pub port: u16,
}

impl ServerAddr {
    /// Parse the `host:port` textual form the engine prints
    pub fn parse(s: &str) -> Option<Self> {
        // rsplit: the host part may itself contain colons (IPv6)
        let (host, port) = s.trim().rsplit_once(':')?;
        if host.is_empty() {
            return None;
        }
        let port = port.parse().ok()?;
        Some(ServerAddr {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for ServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for ServerAddr {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid server address: {s:?}"))
    }
}

/// The persisted table: plain strings both ways so it round-trips losslessly
type Table = HashMap<String, String>;

/// Handle to the shared registry file
///
/// Holds no open file descriptor and caches nothing: every operation re-reads
/// the file, because other processes mutate it between our calls.
#[derive(Debug, Clone)]
pub struct Registry {
    path: PathBuf,
    lock_timeout: Duration,
}

impl Registry {
    /// Registry backed by the file at `path`
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Registry {
            path: path.into(),
            lock_timeout: config::LOCK_TIMEOUT,
        }
    }

    /// Override the bound on lock acquisition (the default is
    /// [`config::LOCK_TIMEOUT`])
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Registry at the well-known location (honoring `GLANCE_REGISTRY_PATH`)
    pub fn from_env() -> Self {
        Self::at(config::default_registry_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the store file with an empty table if it does not exist.
    ///
    /// Two processes may race here and both write `{}`; that is benign, since
    /// real entries are only added under the lock afterward.
    pub fn ensure_table_exists(&self) -> Result<()> {
        if !self.path.exists() {
            self.write_table(&Table::new())?;
        }
        Ok(())
    }

    /// Run `op` while holding the exclusive advisory lock.
    ///
    /// All table reads and writes must happen inside this scope. The lock is
    /// released when the guard drops, on the error path included, and is never
    /// held across network I/O.
    pub fn with_exclusive_lock<T>(&self, op: impl FnOnce() -> Result<T>) -> Result<T> {
        self.ensure_table_exists()?;
        let _guard = LockGuard::acquire(&self.lock_path(), self.lock_timeout)?;
        op()
    }

    /// Register `id -> addr`, replacing any previous entry for `id`
    pub fn put(&self, id: &ServerId, addr: &ServerAddr) -> Result<()> {
        self.with_exclusive_lock(|| {
            let mut table = self.read_table()?;
            table.insert(id.to_string(), addr.to_string());
            self.write_table(&table)?;
            debug!(id = %id, addr = %addr, "registered server");
            Ok(())
        })
    }

    /// Remove the entry for `id`; removing an absent entry is not an error
    pub fn delete(&self, id: &ServerId) -> Result<()> {
        self.with_exclusive_lock(|| {
            let mut table = self.read_table()?;
            table.remove(id.as_str());
            self.write_table(&table)?;
            debug!(id = %id, "removed server registration");
            Ok(())
        })
    }

    /// Resolve `id` to the address its server advertised at startup
    pub fn get(&self, id: &ServerId) -> Result<ServerAddr> {
        self.with_exclusive_lock(|| {
            let table = self.read_table()?;
            let raw = table
                .get(id.as_str())
                .ok_or_else(|| GlanceError::ServerNotFound(id.to_string()))?;
            ServerAddr::parse(raw)
                .ok_or_else(|| self.corrupt(format!("entry for {id} is not host:port: {raw:?}")))
        })
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn read_table(&self) -> Result<Table> {
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| self.corrupt(format!("cannot read store file: {e}")))?;
        serde_json::from_str(&raw).map_err(|e| self.corrupt(format!("invalid table JSON: {e}")))
    }

    /// Serialize to a temp path, then rename into place. Readers either see
    /// the old table or the new one, never a partial write.
    fn write_table(&self, table: &Table) -> Result<()> {
        let json = serde_json::to_string(table)
            .map_err(|e| self.corrupt(format!("table failed to serialize: {e}")))?;

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(format!(".tmp.{}", std::process::id()));
        let tmp_path = self.path.with_file_name(tmp_name);

        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn corrupt(&self, detail: String) -> GlanceError {
        GlanceError::RegistryCorrupt {
            path: self.path.clone(),
            detail,
        }
    }
}

/// RAII advisory lock on the registry's sidecar lock file
struct LockGuard {
    file: File,
}

impl LockGuard {
    fn acquire(lock_path: &Path, timeout: Duration) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(lock_path)?;

        let started = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(LockGuard { file }),
                Err(ref e)
                    if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() =>
                {
                    if started.elapsed() >= timeout {
                        return Err(GlanceError::LockTimeout {
                            path: lock_path.to_path_buf(),
                        });
                    }
                    std::thread::sleep(config::LOCK_RETRY_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scratch_registry() -> (Registry, TempDir) {
        let dir = TempDir::new().unwrap();
        let registry = Registry::at(dir.path().join("servers.json"));
        (registry, dir)
    }

    #[test]
    fn test_server_id_mint_is_unique() {
        assert_ne!(ServerId::mint(), ServerId::mint());
    }

    #[test]
    fn test_addr_parse_round_trip() {
        let addr = ServerAddr::parse("127.0.0.1:9000").unwrap();
        assert_eq!(addr.host, "127.0.0.1");
        assert_eq!(addr.port, 9000);
        assert_eq!(addr.to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn test_addr_parse_rejects_garbage() {
        assert!(ServerAddr::parse("no-port-here").is_none());
        assert!(ServerAddr::parse(":9000").is_none());
        assert!(ServerAddr::parse("host:notaport").is_none());
        assert!(ServerAddr::parse("").is_none());
    }

    #[test]
    fn test_addr_parse_ipv6_host() {
        let addr = ServerAddr::parse("::1:4000").unwrap();
        assert_eq!(addr.host, "::1");
        assert_eq!(addr.port, 4000);
    }

    #[test]
    fn test_ensure_creates_empty_table() {
        let (registry, _dir) = scratch_registry();
        registry.ensure_table_exists().unwrap();

        let raw = fs::read_to_string(registry.path()).unwrap();
        assert_eq!(raw, "{}");
    }

    #[test]
    fn test_put_get_delete_scenario() {
        let (registry, _dir) = scratch_registry();
        let id = ServerId::from("abc");
        let addr = ServerAddr::parse("127.0.0.1:9000").unwrap();

        registry.put(&id, &addr).unwrap();
        let resolved = registry.get(&id).unwrap();
        assert_eq!(resolved.host, "127.0.0.1");
        assert_eq!(resolved.port, 9000);

        registry.delete(&id).unwrap();
        let err = registry.get(&id).unwrap_err();
        assert!(matches!(err, GlanceError::ServerNotFound(_)));
    }

    #[test]
    fn test_get_unknown_id_is_not_found() {
        let (registry, _dir) = scratch_registry();
        let err = registry.get(&ServerId::from("nope")).unwrap_err();
        assert!(matches!(err, GlanceError::ServerNotFound(_)));
    }

    #[test]
    fn test_put_replaces_existing_entry() {
        let (registry, _dir) = scratch_registry();
        let id = ServerId::from("abc");

        registry
            .put(&id, &ServerAddr::parse("127.0.0.1:9000").unwrap())
            .unwrap();
        registry
            .put(&id, &ServerAddr::parse("127.0.0.1:9001").unwrap())
            .unwrap();

        assert_eq!(registry.get(&id).unwrap().port, 9001);
    }

    #[test]
    fn test_delete_absent_entry_is_ok() {
        let (registry, _dir) = scratch_registry();
        registry.delete(&ServerId::from("ghost")).unwrap();
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let (registry, _dir) = scratch_registry();
        fs::write(registry.path(), "not json at all").unwrap();

        let err = registry.get(&ServerId::from("abc")).unwrap_err();
        assert!(matches!(err, GlanceError::RegistryCorrupt { .. }));
    }

    #[test]
    fn test_corrupt_address_is_reported() {
        let (registry, _dir) = scratch_registry();
        fs::write(registry.path(), r#"{"abc":"not-an-address"}"#).unwrap();

        let err = registry.get(&ServerId::from("abc")).unwrap_err();
        assert!(matches!(err, GlanceError::RegistryCorrupt { .. }));
    }

    #[test]
    fn test_entries_from_two_handles_share_the_file() {
        let (registry, dir) = scratch_registry();
        let other = Registry::at(dir.path().join("servers.json"));
        let id = ServerId::mint();

        registry
            .put(&id, &ServerAddr::parse("127.0.0.1:7777").unwrap())
            .unwrap();

        assert_eq!(other.get(&id).unwrap().port, 7777);
    }
}
