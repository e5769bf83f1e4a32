//! Usage record persistence.
//!
//! Records live under the `slimsnap_usage_tracking` namespace, one per
//! [`Scope`]. [`JsonFileStore`] keeps them in a single JSON file;
//! [`MemoryStore`] keeps them for the lifetime of the process.

use serde::{Deserialize, Serialize};
use slimsnap_core::{Error, ErrorCode, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Storage namespace for usage records.
pub const STORAGE_NAMESPACE: &str = "slimsnap_usage_tracking";

/// Persisted usage counters for one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    /// Compressions counted since the last daily reset
    pub images_processed: u32,
    /// When this record was first created, epoch ms
    pub session_start: i64,
    /// Next reset boundary, epoch ms
    pub daily_reset_time: i64,
}

impl UsageRecord {
    /// A fresh record starting at `now` with the given reset boundary.
    pub fn fresh(now: i64, daily_reset_time: i64) -> Self {
        Self {
            images_processed: 0,
            session_start: now,
            daily_reset_time,
        }
    }
}

/// Whose usage a record tracks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// A client without an account
    #[default]
    Anonymous,
    /// An authenticated user
    User(String),
}

impl Scope {
    /// Scope for an optional user id.
    pub fn for_user(user_id: Option<&str>) -> Self {
        match user_id {
            Some(id) if !id.is_empty() => Scope::User(id.to_string()),
            _ => Scope::Anonymous,
        }
    }

    /// Fully namespaced storage key.
    pub fn storage_key(&self) -> String {
        format!("{STORAGE_NAMESPACE}:{self}")
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Anonymous => f.write_str("anonymous"),
            Scope::User(id) => write!(f, "user:{id}"),
        }
    }
}

/// Key/value persistence for usage records.
pub trait UsageStore: Send + Sync {
    /// Load the record stored under `key`, if any.
    fn load(&self, key: &str) -> Result<Option<UsageRecord>>;

    /// Store `record` under `key`.
    fn save(&self, key: &str, record: &UsageRecord) -> Result<()>;
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<String, UsageRecord>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Whether nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UsageStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<UsageRecord>> {
        let guard = self
            .records
            .read()
            .map_err(|_| Error::new(ErrorCode::Internal, "Failed to acquire usage store read lock"))?;
        Ok(guard.get(key).copied())
    }

    fn save(&self, key: &str, record: &UsageRecord) -> Result<()> {
        let mut guard = self
            .records
            .write()
            .map_err(|_| Error::new(ErrorCode::Internal, "Failed to acquire usage store write lock"))?;
        guard.insert(key.to_string(), *record);
        Ok(())
    }
}

/// Store backed by a JSON file holding a map of key to record.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store at an explicit path. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `usage.json` under the platform data directory.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from(".slimsnap"))
            .join("slimsnap")
            .join("usage.json")
    }

    /// Store at [`JsonFileStore::default_path`].
    pub fn at_default_location() -> Self {
        Self::new(Self::default_path())
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw file contents; `None` when the file does not exist yet.
    fn read_bytes(&self) -> std::io::Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn parse(bytes: &[u8]) -> serde_json::Result<BTreeMap<String, UsageRecord>> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }
        serde_json::from_slice(bytes)
    }

    fn read_all(&self) -> Result<BTreeMap<String, UsageRecord>> {
        let Some(bytes) = self
            .read_bytes()
            .map_err(|e| Error::store_read(format!("{}: {e}", self.path.display())).with_source(e))?
        else {
            return Ok(BTreeMap::new());
        };
        Self::parse(&bytes)
            .map_err(|e| Error::store_read(format!("{}: {e}", self.path.display())).with_source(e))
    }
}

impl UsageStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<Option<UsageRecord>> {
        Ok(self.read_all()?.get(key).copied())
    }

    fn save(&self, key: &str, record: &UsageRecord) -> Result<()> {
        // Other scopes share the file: only corrupt JSON may be discarded.
        let existing = self
            .read_bytes()
            .map_err(|e| Error::store_write(format!("{}: {e}", self.path.display())).with_source(e))?;
        let mut records = match existing.as_deref().map(Self::parse) {
            Some(Ok(records)) => records,
            Some(Err(e)) => {
                tracing::warn!(path = %self.path.display(), error = %e, "replacing corrupt usage file");
                BTreeMap::new()
            }
            None => BTreeMap::new(),
        };
        records.insert(key.to_string(), *record);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::store_write(format!("{}: {e}", parent.display())).with_source(e))?;
        }

        let json = serde_json::to_string_pretty(&records)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .map_err(|e| Error::store_write(format!("{}: {e}", tmp.display())).with_source(e))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| Error::store_write(format!("{}: {e}", self.path.display())).with_source(e))?;
        Ok(())
    }
}
