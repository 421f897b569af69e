//! Migration of legacy item records to the current schema.
//!
//! Older stores wrote the private field names (`_id`, `_date`, `_timestamp`,
//! `_isTask`). Records are rewritten once when a collection is loaded, so the
//! steady-state deserializer in [`crate::item`] only ever sees current names.

use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

/// Legacy field name → current field name
const RENAMED_FIELDS: [(&str, &str); 4] = [
    ("_id", "id"),
    ("_date", "date"),
    ("_timestamp", "timestamp"),
    ("_isTask", "isTask"),
];

/// Check if a record still carries any legacy field name
pub fn needs_migration(record: &Value) -> bool {
    match record {
        Value::Object(map) => RENAMED_FIELDS.iter().any(|(old, _)| map.contains_key(*old)),
        _ => false,
    }
}

/// Rewrite a single record into the current schema.
///
/// A legacy key is dropped in favour of its current name when both exist.
pub fn migrate_record(record: Value) -> Value {
    let Value::Object(mut map) = record else {
        return record;
    };

    for (old, new) in RENAMED_FIELDS {
        if let Some(value) = map.remove(old) {
            if !map.contains_key(new) {
                map.insert(new.to_string(), value);
            }
        }
    }

    if !map.contains_key("isTask") {
        map.insert("isTask".to_string(), Value::Bool(true));
    }

    Value::Object(map)
}

/// Migrate every record of a stored collection, returning how many changed
pub fn migrate_collection(collection: Map<String, Value>) -> (Map<String, Value>, usize) {
    let mut migrated = 0;
    let collection = collection
        .into_iter()
        .map(|(key, record)| {
            if needs_migration(&record) {
                migrated += 1;
                (key, migrate_record(record))
            } else {
                (key, record)
            }
        })
        .collect();

    if migrated > 0 {
        info!("Migrated {} legacy record(s) to the current schema", migrated);
    }

    (collection, migrated)
}

/// Copy a collection file to `<file>.bak` before its first migrated write.
///
/// An existing backup is left untouched so the oldest legacy copy survives.
pub fn create_backup(path: &Path) -> io::Result<Option<PathBuf>> {
    let mut backup = path.as_os_str().to_owned();
    backup.push(".bak");
    let backup = PathBuf::from(backup);

    if !path.exists() || backup.exists() {
        return Ok(None);
    }

    fs::copy(path, &backup)?;
    info!("Created backup: {:?}", backup);
    Ok(Some(backup))
}
