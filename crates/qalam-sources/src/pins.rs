// crates/qalam-sources/src/pins.rs
//
// Pin file: a JSON array of [locator, version] pairs, where the version
// is the content digest seen when the include was fetched. Comparing a
// fresh run against the pinned pairs flags remote content that changed
// underneath a stable locator.

use std::fs;
use std::path::Path;

use qalam_engine::Execution;

use crate::SourceError;

pub type Pin = (String, String);

/// A pinned locator whose content digest moved since it was pinned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinChange {
    pub locator: String,
    pub pinned: String,
    pub current: String,
}

/// The pins of one run: every remote include, first fetch wins. Local
/// files are left out; they are expected to change.
pub fn collect(execution: &Execution) -> Vec<Pin> {
    let mut pins: Vec<Pin> = Vec::new();
    for record in &execution.includes {
        if !record.remote {
            continue;
        }
        if pins.iter().any(|(locator, _)| locator == &record.locator) {
            continue;
        }
        pins.push((record.locator.clone(), record.digest.clone()));
    }
    pins
}

pub fn load(path: impl AsRef<Path>) -> Result<Vec<Pin>, SourceError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| SourceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| SourceError::PinFormat {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save(path: impl AsRef<Path>, pins: &[Pin]) -> Result<(), SourceError> {
    let path = path.as_ref();
    let mut text = serde_json::to_string_pretty(pins).map_err(|source| SourceError::PinFormat {
        path: path.to_path_buf(),
        source,
    })?;
    text.push('\n');
    fs::write(path, text).map_err(|source| SourceError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Pins whose locator is present in both lists with different versions.
/// Locators added or dropped since the pin file was written are not
/// changes.
pub fn changed(pinned: &[Pin], current: &[Pin]) -> Vec<PinChange> {
    let mut changes = Vec::new();
    for (locator, version) in pinned {
        let drifted = current
            .iter()
            .find(|(other, _)| other == locator)
            .filter(|(_, now)| now != version);
        if let Some((_, now)) = drifted {
            changes.push(PinChange {
                locator: locator.clone(),
                pinned: version.clone(),
                current: now.clone(),
            });
        }
    }
    changes
}
