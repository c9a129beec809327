use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use tracing::debug;

use super::backend::{Batch, KeyValueStore};
use super::seal::{self, SealKey};

/// Store file name in the data directory
pub const STORE_FILE: &str = "credentials.json";

/// Key/value store persisted as a single JSON object on disk.
///
/// Every read goes back to the file so that writes made by another process
/// are observed. Every batch rewrites the whole file through a temp file and
/// a rename, which makes the batch atomic for any reader.
pub struct FileStore {
    path: PathBuf,
    key: Option<SealKey>,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open a plaintext store at `path`. The file is created lazily.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            key: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Open a store whose file is sealed with `key`.
    pub fn sealed(path: impl Into<PathBuf>, key: SealKey) -> Self {
        Self {
            path: path.into(),
            key: Some(key),
            write_lock: Mutex::new(()),
        }
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let raw = std::fs::read(&self.path)
            .with_context(|| format!("Failed to read store file: {}", self.path.display()))?;
        if raw.is_empty() {
            return Ok(BTreeMap::new());
        }

        let contents = match self.key {
            Some(ref key) => seal::open(key, &raw).context("Failed to unseal store file")?,
            None => raw,
        };

        serde_json::from_slice(&contents)
            .with_context(|| format!("Failed to parse store file: {}", self.path.display()))
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_vec_pretty(map)?;
        let bytes = match self.key {
            Some(ref key) => seal::seal(key, &contents)?,
            None => contents,
        };

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)
            .with_context(|| format!("Failed to write store file: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace store file: {}", self.path.display()))?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_map()?.remove(key))
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.read_map()?.into_keys().collect())
    }

    fn apply(&self, batch: Batch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow!("file store lock poisoned"))?;

        let mut map = match self.read_map() {
            Ok(map) => map,
            // A batch that starts with Clear does not need the old contents,
            // which lets a version wipe recover from an unreadable file.
            Err(e) if matches!(batch.ops().first(), Some(super::Op::Clear)) => {
                debug!(error = %e, "Discarding unreadable store file before wipe");
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        batch.apply_to(&mut map);
        self.write_map(&map)
    }
}
