// crates/qalam-sources/src/snapshot.rs
//
// Snapshot file: the end-of-run global variable store as one JSON
// object, keys sorted. Builtins and macros are function values with no
// JSON shape, so they are left out.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use qalam_engine::Value;

use crate::SourceError;

pub fn save(path: impl AsRef<Path>, globals: &HashMap<String, Value>) -> Result<(), SourceError> {
    let path = path.as_ref();
    let entries: BTreeMap<&str, serde_json::Value> = globals
        .iter()
        .filter(|(_, value)| !matches!(value, Value::Function(_)))
        .map(|(name, value)| (name.as_str(), value.to_json()))
        .collect();
    let mut text =
        serde_json::to_string_pretty(&entries).map_err(|source| SourceError::SnapshotFormat {
            path: path.to_path_buf(),
            source,
        })?;
    text.push('\n');
    fs::write(path, text).map_err(|source| SourceError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load(path: impl AsRef<Path>) -> Result<HashMap<String, Value>, SourceError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| SourceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: serde_json::Value =
        serde_json::from_str(&text).map_err(|source| SourceError::SnapshotFormat {
            path: path.to_path_buf(),
            source,
        })?;
    let serde_json::Value::Object(entries) = parsed else {
        return Err(SourceError::SnapshotShape {
            path: path.to_path_buf(),
        });
    };
    Ok(entries
        .iter()
        .map(|(name, value)| (name.clone(), Value::from_json(value)))
        .collect())
}
