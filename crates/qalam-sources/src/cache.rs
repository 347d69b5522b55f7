// crates/qalam-sources/src/cache.rs

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use qalam_engine::{content_digest, ContentCache, ReadError};

use crate::SourceError;

const CONTENT: TableDefinition<&str, &[u8]> = TableDefinition::new("content");

/// One cached fetch. The digest is recomputed on load; an entry that no
/// longer matches it is treated as a miss.
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    content: String,
    fetched_at: i64,
    version: String,
}

/// Durable content cache backed by a redb database. Lookup failures are
/// logged and reported as misses so a damaged cache never fails a run.
pub struct RedbCache {
    db: Database,
}

impl RedbCache {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| SourceError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        let db = Database::create(path).map_err(|e| SourceError::Cache {
            path: PathBuf::from(path),
            message: e.to_string(),
        })?;
        Ok(Self { db })
    }

    fn lookup(&self, locator: &str) -> Result<Option<String>, ReadError> {
        let read_txn = self.db.begin_read()?;
        let table = match read_txn.open_table(CONTENT) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let Some(raw) = table.get(locator)? else {
            return Ok(None);
        };
        let entry: CacheEntry = postcard::from_bytes(raw.value())?;
        if content_digest(&entry.content) != entry.version {
            log::warn!("cache entry for {locator:?} failed its digest check");
            return Ok(None);
        }
        Ok(Some(entry.content))
    }

    fn store(&self, locator: &str, content: &str) -> Result<(), ReadError> {
        let entry = CacheEntry {
            content: content.to_string(),
            fetched_at: Utc::now().timestamp(),
            version: content_digest(content),
        };
        let encoded = postcard::to_allocvec(&entry)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CONTENT)?;
            table.insert(locator, encoded.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

impl ContentCache for RedbCache {
    fn get(&self, locator: &str) -> Option<String> {
        match self.lookup(locator) {
            Ok(found) => found,
            Err(e) => {
                log::warn!("cache read for {locator:?} failed: {e}");
                None
            }
        }
    }

    fn put(&self, locator: &str, content: &str) {
        if let Err(e) = self.store(locator, content) {
            log::warn!("cache write for {locator:?} failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_round_trips_content() {
        let dir = TempDir::new().unwrap();
        let cache = RedbCache::open(dir.path().join("cache.redb")).unwrap();

        assert_eq!(cache.get("github:o/r/lib.txt"), None);
        cache.put("github:o/r/lib.txt", "content\n");
        assert_eq!(cache.get("github:o/r/lib.txt"), Some("content\n".to_string()));
        assert_eq!(cache.get("github:o/r/other.txt"), None);
    }

    #[test]
    fn test_later_puts_overwrite() {
        let dir = TempDir::new().unwrap();
        let cache = RedbCache::open(dir.path().join("cache.redb")).unwrap();

        cache.put("lib", "one\n");
        cache.put("lib", "two\n");
        assert_eq!(cache.get("lib"), Some("two\n".to_string()));
    }

    #[test]
    fn test_survives_a_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.redb");
        {
            let cache = RedbCache::open(&path).unwrap();
            cache.put("lib", "kept\n");
        }
        let cache = RedbCache::open(&path).unwrap();
        assert_eq!(cache.get("lib"), Some("kept\n".to_string()));
    }

    #[test]
    fn test_creates_missing_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/dir/cache.redb");
        let cache = RedbCache::open(&path).unwrap();
        cache.put("lib", "deep\n");
        assert_eq!(cache.get("lib"), Some("deep\n".to_string()));
    }

    #[test]
    fn test_undecodable_entries_read_as_misses() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.redb");
        {
            let db = Database::create(&path).unwrap();
            let write_txn = db.begin_write().unwrap();
            {
                let mut table = write_txn.open_table(CONTENT).unwrap();
                table.insert("lib", [0xffu8, 0xff].as_slice()).unwrap();
            }
            write_txn.commit().unwrap();
        }
        let cache = RedbCache::open(&path).unwrap();
        assert_eq!(cache.get("lib"), None);
    }
}
