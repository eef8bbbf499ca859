//! Save-game key/value stores.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use ahash::AHashMap;
use buffstuff_common::StoreResult;
use tracing::debug;

/// Named-blob storage provided by the host's save game.
pub trait SaveStore {
    /// Reads the blob stored under `key`.
    fn get_named_blob(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Replaces the blob stored under `key`.
    fn set_named_blob(&mut self, key: &str, bytes: Vec<u8>) -> StoreResult<()>;
}

/// In-memory store, for tests and hosts that persist elsewhere.
#[derive(Debug, Clone, Default)]
pub struct MemorySaveStore {
    blobs: AHashMap<String, Vec<u8>>,
}

impl MemorySaveStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl SaveStore for MemorySaveStore {
    fn get_named_blob(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.blobs.get(key).cloned())
    }

    fn set_named_blob(&mut self, key: &str, bytes: Vec<u8>) -> StoreResult<()> {
        self.blobs.insert(key.to_string(), bytes);
        Ok(())
    }
}

/// Directory-backed store with one file per key.
#[derive(Debug, Clone)]
pub struct FileSaveStore {
    /// Directory for blob files
    dir: PathBuf,
}

impl FileSaveStore {
    /// Creates a store rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Gets the store directory path.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Gets the path for a blob file.
    fn blob_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.blob", file_stem(key)))
    }

    /// Gets the path for a temporary blob file.
    fn temp_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.blob.tmp", file_stem(key)))
    }
}

/// Maps a namespaced key to a portable file name.
fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl SaveStore for FileSaveStore {
    fn get_named_blob(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.blob_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let mut file = fs::File::open(&path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        debug!("Read {} bytes from {}", bytes.len(), path.display());
        Ok(Some(bytes))
    }

    /// Uses atomic write (write to temp, then rename).
    fn set_named_blob(&mut self, key: &str, bytes: Vec<u8>) -> StoreResult<()> {
        fs::create_dir_all(&self.dir)?;

        let temp_path = self.temp_path(key);
        let final_path = self.blob_path(key);

        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &final_path)?;
        debug!("Wrote {} bytes to {}", bytes.len(), final_path.display());
        Ok(())
    }
}
