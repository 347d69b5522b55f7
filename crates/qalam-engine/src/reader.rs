// crates/qalam-engine/src/reader.rs

use std::fmt::Write as _;

use sha2::{Digest, Sha256};

/// Reader failures are opaque to the engine; it wraps them with the
/// inclusion site before reporting.
pub type ReadError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Repository coordinates carried by remote sources. Relative locators
/// found inside such a source can be resolved against them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    /// Locator prefix a relative path is joined to.
    pub prefix: String,
    /// Branch, tag or commit the content came from. Empty when the
    /// locator itself fixes the version.
    pub reference: String,
}

/// What a reader knows about a locator before fetching it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathInfo {
    /// Short name used in diagnostics, extension stripped.
    pub file: String,
    /// Canonical locator; cache and inclusion tracking key off this.
    pub path: String,
    /// Remote content is cacheable and pinnable.
    pub remote: bool,
    pub repo: Option<RepoInfo>,
}

/// A source of includable content. The engine consults registered readers
/// in order and the first whose `supports` answers true handles the
/// locator.
pub trait Reader {
    /// Cheap test on the locator alone, no IO.
    fn supports(&self, locator: &str) -> bool;

    /// Canonicalize the locator. Never performs IO.
    fn parse_path(&self, locator: &str) -> Result<PathInfo, ReadError>;

    /// Fetch the content.
    fn read(&self, info: &PathInfo) -> Result<String, ReadError>;
}

/// Cache for remote content, keyed by canonical locator. Implementations
/// use interior mutability; the engine only holds a shared reference.
pub trait ContentCache {
    fn get(&self, locator: &str) -> Option<String>;
    fn put(&self, locator: &str, content: &str);
}

/// Cache that remembers nothing.
#[derive(Debug, Default)]
pub struct NoCache;

impl ContentCache for NoCache {
    fn get(&self, _locator: &str) -> Option<String> {
        None
    }

    fn put(&self, _locator: &str, _content: &str) {}
}

/// Diagnostic name for a locator: the last path segment with its
/// extension stripped.
pub fn file_label(path: &str) -> String {
    let base = path.rsplit('/').next().unwrap_or(path);
    match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => base.to_string(),
    }
}

/// Hex digest identifying a piece of content across locators.
pub fn content_digest(content: &str) -> String {
    let hash = Sha256::digest(content.as_bytes());
    let mut hex = String::with_capacity(hash.len() * 2);
    for byte in hash {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}
