//! Storage backends for the item and archive collections.
//!
//! Every backend persists two independent collections, the active items
//! ("storage") and the soft-deleted items ("archive"). Writes always replace
//! the whole collection.

use crate::item::Item;
use crate::migration;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub mod firestore;
pub mod git;
pub mod local;
pub mod manager;

pub use manager::{StorageKind, StorageManager, StorageModuleConfig};

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Custom app directory does not exist: {0:?}")]
    MissingDirectory(PathBuf),

    #[error("Git error: {0}")]
    Git(String),

    /// The remote store could not be reached or refused the request
    #[error("Remote storage error: {0}")]
    Remote(String),

    #[error("Invalid configuration for storage module '{name}': {reason}")]
    InvalidConfig { name: String, reason: String },

    #[error("Unknown storage module: {0}")]
    UnknownStorage(String),

    /// Configured, but failed to initialize
    #[error("Storage module '{name}' is unavailable: {reason}")]
    Unavailable { name: String, reason: String },

    #[error("Duplicate storage module name: {0}")]
    DuplicateName(String),

    #[error("Cannot remove the active storage module: {0}")]
    RemoveActive(String),
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Health of a backend as shown by `tl storage`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageStatus {
    Online,
    Offline(String),
}

impl fmt::Display for StorageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageStatus::Online => f.write_str("Online"),
            StorageStatus::Offline(reason) => write!(f, "Offline ({})", reason),
        }
    }
}

/// Capabilities shared by all storage backends.
///
/// `ids` filters the returned collection to exactly those ids; unknown ids
/// are dropped silently. A missing collection reads as empty.
pub trait Storage {
    fn get(&self, ids: Option<&[u64]>) -> StorageResult<Vec<Item>>;
    fn get_archive(&self, ids: Option<&[u64]>) -> StorageResult<Vec<Item>>;
    fn set(&mut self, data: &[Item]) -> StorageResult<()>;
    fn set_archive(&mut self, data: &[Item]) -> StorageResult<()>;
    fn status(&self) -> StorageStatus;
}

/// Keep only the items whose id is in `ids`
pub fn filter_ids(items: Vec<Item>, ids: Option<&[u64]>) -> Vec<Item> {
    match ids {
        None => items,
        Some(ids) => {
            let wanted: HashSet<u64> = ids.iter().copied().collect();
            items
                .into_iter()
                .filter(|item| wanted.contains(&item.id()))
                .collect()
        }
    }
}

/// Decode a stored `{ "<id>": record }` object into items sorted by id.
///
/// Returns the number of legacy records that were migrated on the way.
pub fn decode_collection(collection: Map<String, Value>) -> StorageResult<(Vec<Item>, usize)> {
    let (collection, migrated) = migration::migrate_collection(collection);
    let mut items = collection
        .into_iter()
        .map(|(key, mut record)| {
            // The key is authoritative when the record lost its id
            if let (Value::Object(map), Ok(id)) = (&mut record, key.parse::<u64>()) {
                map.entry("id").or_insert(Value::from(id));
            }
            Item::from_value(record)
        })
        .collect::<Result<Vec<_>, _>>()?;
    items.sort_by_key(Item::id);
    Ok((items, migrated))
}

/// Encode items as a `{ "<id>": record }` object
pub fn encode_collection(items: &[Item]) -> StorageResult<Map<String, Value>> {
    let mut map = Map::new();
    for item in items {
        map.insert(item.id().to_string(), item.to_value()?);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Note, Task};
    use serde_json::json;

    #[test]
    fn test_filter_ids_is_exact_and_drops_unknown() {
        let items = vec![
            Item::Task(Task::new(1, "a")),
            Item::Task(Task::new(2, "b")),
            Item::Note(Note::new(3, "c")),
        ];
        let filtered = filter_ids(items.clone(), Some(&[3, 1, 42]));
        let ids: Vec<u64> = filtered.iter().map(Item::id).collect();
        assert_eq!(ids, vec![1, 3]);

        assert_eq!(filter_ids(items, None).len(), 3);
    }

    #[test]
    fn test_decode_collection_migrates_and_sorts() {
        let raw = json!({
            "10": {"id": 10, "isTask": true, "description": "ten"},
            "2": {"_id": 2, "_isTask": false, "description": "two"},
            "3": {"isTask": true, "description": "no id field"}
        });
        let Value::Object(map) = raw else { unreachable!() };

        let (items, migrated) = decode_collection(map).unwrap();
        assert_eq!(migrated, 1);
        let ids: Vec<u64> = items.iter().map(Item::id).collect();
        assert_eq!(ids, vec![2, 3, 10]);
        assert!(!items[0].is_task());
    }

    #[test]
    fn test_encode_collection_keys_by_id() {
        let map = encode_collection(&[Item::Note(Note::new(7, "n"))]).unwrap();
        assert_eq!(map["7"]["description"], json!("n"));
        assert_eq!(map["7"]["isTask"], json!(false));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(StorageStatus::Online.to_string(), "Online");
        assert_eq!(
            StorageStatus::Offline("no token".into()).to_string(),
            "Offline (no token)"
        );
    }
}
