// crates/qalam-sources/src/file.rs

use std::fs;
use std::path::{Component, Path, PathBuf};

use qalam_engine::{file_label, PathInfo, ReadError, Reader};

use crate::SourceError;

/// Local filesystem source. Answers `supports` for every locator, so it
/// must be registered after all scheme readers.
#[derive(Debug, Clone)]
pub struct FileReader {
    base_dir: PathBuf,
}

impl FileReader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl Default for FileReader {
    fn default() -> Self {
        Self::new(".")
    }
}

impl Reader for FileReader {
    fn supports(&self, _locator: &str) -> bool {
        true
    }

    fn parse_path(&self, locator: &str) -> Result<PathInfo, ReadError> {
        let joined = if Path::new(locator).is_absolute() {
            PathBuf::from(locator)
        } else {
            self.base_dir.join(locator)
        };
        let path = lexical_clean(&joined).to_string_lossy().into_owned();
        Ok(PathInfo {
            file: file_label(locator),
            path,
            remote: false,
            repo: None,
        })
    }

    fn read(&self, info: &PathInfo) -> Result<String, ReadError> {
        fs::read_to_string(&info.path).map_err(|source| {
            SourceError::Read {
                path: PathBuf::from(&info.path),
                source,
            }
            .into()
        })
    }
}

/// Collapses `.` and `..` segments without touching the filesystem, so
/// the same file is tracked under one canonical path.
fn lexical_clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for part in path.components() {
        match part {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}
