//! Local filesystem backend.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/storage/storage.json
//! <root>/archive/archive.json
//! <root>/.temp/
//! ```
//!
//! Writes are staged in `.temp/` and renamed over the destination, so a
//! collection file is either the old or the new version, never partial.

use super::{decode_collection, encode_collection, filter_ids, Storage, StorageError};
use super::{StorageResult, StorageStatus};
use crate::item::Item;
use crate::migration;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Backend specific settings of a `local` storage module
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalConfig {
    /// Custom root directory; must already exist
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

/// Expand a leading `~` to the user's home directory
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// The on-disk files of one storage root
#[derive(Debug, Clone)]
pub struct FileLayout {
    pub root: PathBuf,
    pub storage_file: PathBuf,
    pub archive_file: PathBuf,
    pub temp_dir: PathBuf,
}

impl FileLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        FileLayout {
            storage_file: root.join("storage").join("storage.json"),
            archive_file: root.join("archive").join("archive.json"),
            temp_dir: root.join(".temp"),
            root,
        }
    }

    /// Create all directories and purge leftovers of interrupted writes.
    pub fn ensure(&self) -> StorageResult<()> {
        for dir in [
            self.root.join("storage"),
            self.root.join("archive"),
            self.temp_dir.clone(),
        ] {
            fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;
        }
        clear_dir(&self.temp_dir)
    }

    pub fn read(&self, path: &Path) -> StorageResult<Vec<Item>> {
        read_collection(path)
    }

    pub fn write(&self, path: &Path, items: &[Item]) -> StorageResult<()> {
        let collection = encode_collection(items)?;
        let bytes = serde_json::to_vec_pretty(&Value::Object(collection))?;
        write_atomic(&self.temp_dir, path, &bytes)
    }

    pub fn is_ready(&self) -> bool {
        self.root.join("storage").is_dir()
            && self.root.join("archive").is_dir()
            && self.temp_dir.is_dir()
    }
}

fn clear_dir(dir: &Path) -> StorageResult<()> {
    let entries = fs::read_dir(dir).map_err(|e| StorageError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| StorageError::io(dir, e))?;
        let path = entry.path();
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        result.map_err(|e| StorageError::io(&path, e))?;
        debug!("Removed stale temp entry {:?}", path);
    }
    Ok(())
}

/// Read a collection file; a missing file is an empty collection.
pub fn read_collection(path: &Path) -> StorageResult<Vec<Item>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path).map_err(|e| StorageError::io(path, e))?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let collection: Map<String, Value> = serde_json::from_str(&content)?;
    let (items, migrated) = decode_collection(collection)?;
    if migrated > 0 {
        migration::create_backup(path).map_err(|e| StorageError::io(path, e))?;
    }
    Ok(items)
}

/// Write `bytes` into a fresh temp file with a random hex suffix.
pub fn stage_write(temp_dir: &Path, dest: &Path, bytes: &[u8]) -> StorageResult<PathBuf> {
    let stem = dest
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("collection");
    let staged = temp_dir.join(format!("{}.{:016x}", stem, rand::random::<u64>()));

    let mut file = fs::File::create(&staged).map_err(|e| StorageError::io(&staged, e))?;
    file.write_all(bytes)
        .and_then(|_| file.sync_all())
        .map_err(|e| StorageError::io(&staged, e))?;
    Ok(staged)
}

/// Atomically move a staged file over its destination.
pub fn commit_write(staged: &Path, dest: &Path) -> StorageResult<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }
    fs::rename(staged, dest).map_err(|e| StorageError::io(dest, e))?;
    debug!("Wrote {:?}", dest);
    Ok(())
}

pub fn write_atomic(temp_dir: &Path, dest: &Path, bytes: &[u8]) -> StorageResult<()> {
    let staged = stage_write(temp_dir, dest, bytes)?;
    if let Err(e) = commit_write(&staged, dest) {
        let _ = fs::remove_file(&staged);
        return Err(e);
    }
    Ok(())
}

/// Storage backed by two JSON files on the local disk
pub struct LocalStorage {
    layout: FileLayout,
}

impl LocalStorage {
    /// Open local storage, using `default_root` unless the config names a
    /// custom directory.
    pub fn new(config: &LocalConfig, default_root: &Path) -> StorageResult<Self> {
        let root = match &config.directory {
            Some(dir) => {
                let dir = expand_home(dir);
                if !dir.is_dir() {
                    return Err(StorageError::MissingDirectory(dir));
                }
                dir
            }
            None => default_root.to_path_buf(),
        };

        let layout = FileLayout::new(root);
        layout.ensure()?;
        debug!("Local storage at {:?}", layout.root);
        Ok(LocalStorage { layout })
    }

    pub fn layout(&self) -> &FileLayout {
        &self.layout
    }
}

impl Storage for LocalStorage {
    fn get(&self, ids: Option<&[u64]>) -> StorageResult<Vec<Item>> {
        let items = self.layout.read(&self.layout.storage_file)?;
        Ok(filter_ids(items, ids))
    }

    fn get_archive(&self, ids: Option<&[u64]>) -> StorageResult<Vec<Item>> {
        let items = self.layout.read(&self.layout.archive_file)?;
        Ok(filter_ids(items, ids))
    }

    fn set(&mut self, data: &[Item]) -> StorageResult<()> {
        self.layout.write(&self.layout.storage_file, data)
    }

    fn set_archive(&mut self, data: &[Item]) -> StorageResult<()> {
        self.layout.write(&self.layout.archive_file, data)
    }

    fn status(&self) -> StorageStatus {
        if self.layout.is_ready() {
            StorageStatus::Online
        } else {
            StorageStatus::Offline(format!("{:?} is not accessible", self.layout.root))
        }
    }
}
