// crates/qalam-sources/src/git.rs

use std::process::Command;

use qalam_engine::{file_label, PathInfo, ReadError, Reader, RepoInfo};

use crate::{split_reference, SourceError};

const SHAPE: &str = "git:<repo>//<path>[@ref]";

/// Local git repository source: `git:~/proj//tpl/base.txt@v2` reads
/// `tpl/base.txt` from the `v2` tree of the repository at `~/proj`,
/// without touching the working copy. The double slash splits the
/// repository from the in-tree path.
#[derive(Debug, Default)]
pub struct GitLocalReader;

struct GitPath<'a> {
    repo: &'a str,
    path: &'a str,
    reference: Option<&'a str>,
}

impl GitLocalReader {
    pub fn new() -> Self {
        Self
    }

    fn parse(locator: &str) -> Result<GitPath<'_>, SourceError> {
        let malformed = || SourceError::Locator {
            locator: locator.to_string(),
            expected: SHAPE,
        };
        let rest = locator.strip_prefix("git:").ok_or_else(malformed)?;
        let (rest, reference) = split_reference(rest);
        let (repo, path) = rest.split_once("//").ok_or_else(malformed)?;
        let mut path = path;
        while let Some(stripped) = path.strip_prefix("./") {
            path = stripped;
        }
        if repo.is_empty() || path.is_empty() {
            return Err(malformed());
        }
        Ok(GitPath {
            repo,
            path,
            reference,
        })
    }
}

impl Reader for GitLocalReader {
    fn supports(&self, locator: &str) -> bool {
        locator.starts_with("git:")
    }

    fn parse_path(&self, locator: &str) -> Result<PathInfo, ReadError> {
        let parsed = Self::parse(locator)?;
        let mut canonical = format!("git:{}//{}", parsed.repo, parsed.path);
        if let Some(reference) = parsed.reference {
            canonical.push('@');
            canonical.push_str(reference);
        }
        // "." keeps the double slash intact when a relative include is
        // later joined onto the prefix.
        let prefix = match parsed.path.rsplit_once('/') {
            Some((dir, _)) => format!("git:{}//{}", parsed.repo, dir),
            None => format!("git:{}//.", parsed.repo),
        };
        Ok(PathInfo {
            file: file_label(parsed.path),
            path: canonical,
            remote: false,
            repo: Some(RepoInfo {
                prefix,
                reference: parsed.reference.unwrap_or_default().to_string(),
            }),
        })
    }

    fn read(&self, info: &PathInfo) -> Result<String, ReadError> {
        let parsed = Self::parse(&info.path)?;
        let object = format!("{}:{}", parsed.reference.unwrap_or("HEAD"), parsed.path);
        let output = Command::new("git")
            .arg("-C")
            .arg(parsed.repo)
            .arg("show")
            .arg(&object)
            .output()
            .map_err(|e| SourceError::Git {
                repo: parsed.repo.to_string(),
                message: format!("cannot run git: {e}"),
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::Git {
                repo: parsed.repo.to_string(),
                message: stderr.trim().to_string(),
            }
            .into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
