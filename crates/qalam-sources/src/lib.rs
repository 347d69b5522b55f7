// crates/qalam-sources/src/lib.rs
//
// Reader implementations, the on-disk content cache, and the pin and
// snapshot file formats. A single SourceError covers all of them.

pub mod azure;
pub mod bitbucket;
pub mod cache;
pub mod file;
pub mod git;
pub mod github;
pub mod http;
pub mod pins;
pub mod snapshot;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use azure::AzureReader;
pub use bitbucket::BitbucketReader;
pub use cache::RedbCache;
pub use file::FileReader;
pub use git::GitLocalReader;
pub use github::GithubReader;
pub use http::HttpReader;
pub use pins::{Pin, PinChange};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Cannot read {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Cannot write {path:?}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("Cannot build the HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("Request for \"{url}\" failed: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Server returned {status} for \"{url}\"")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("Locator \"{locator}\" does not match {expected}")]
    Locator {
        locator: String,
        expected: &'static str,
    },

    #[error("git failed for {repo:?}: {message}")]
    Git { repo: String, message: String },

    #[error("Cannot open the content cache at {path:?}: {message}")]
    Cache { path: PathBuf, message: String },

    #[error("Malformed pin file {path:?}: {source}")]
    PinFormat {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Malformed snapshot file {path:?}: {source}")]
    SnapshotFormat {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Snapshot file {path:?} must hold a JSON object")]
    SnapshotShape { path: PathBuf },
}

/// Splits a trailing `@ref` off a repository locator. The reference runs
/// from the last `@` to the end of the string and must not contain `/`,
/// so path segments with an `@` in them are left alone.
pub(crate) fn split_reference(rest: &str) -> (&str, Option<&str>) {
    match rest.rsplit_once('@') {
        Some((base, reference))
            if !reference.is_empty() && !reference.contains('/') && !base.is_empty() =>
        {
            (base, Some(reference))
        }
        _ => (rest, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_split_off_the_tail() {
        assert_eq!(split_reference("o/r/lib.txt@v1"), ("o/r/lib.txt", Some("v1")));
        assert_eq!(split_reference("o/r/lib.txt"), ("o/r/lib.txt", None));
    }

    #[test]
    fn test_reference_never_spans_segments() {
        assert_eq!(split_reference("o/r/@scope/pkg/index.js"), ("o/r/@scope/pkg/index.js", None));
        assert_eq!(split_reference("o/r/lib.txt@"), ("o/r/lib.txt@", None));
    }
}
