// crates/qalam-sources/src/github.rs

use std::time::Duration;

use reqwest::blocking::Client;

use qalam_engine::{file_label, PathInfo, ReadError, Reader, RepoInfo};

use crate::http::{build_client, fetch_url};
use crate::{split_reference, SourceError};

const SHAPE: &str = "github:owner/repo/path[@ref]";

/// GitHub source, fetched over the raw content host. A locator without a
/// reference reads whatever `HEAD` points at.
pub struct GithubReader {
    client: Client,
}

struct GithubPath<'a> {
    owner: &'a str,
    repo: &'a str,
    path: &'a str,
    reference: Option<&'a str>,
}

impl GithubReader {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }

    fn parse(locator: &str) -> Result<GithubPath<'_>, SourceError> {
        let malformed = || SourceError::Locator {
            locator: locator.to_string(),
            expected: SHAPE,
        };
        let rest = locator.strip_prefix("github:").ok_or_else(malformed)?;
        let (rest, reference) = split_reference(rest);
        let mut parts = rest.splitn(3, '/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(repo), Some(path))
                if !owner.is_empty() && !repo.is_empty() && !path.is_empty() =>
            {
                Ok(GithubPath {
                    owner,
                    repo,
                    path,
                    reference,
                })
            }
            _ => Err(malformed()),
        }
    }
}

impl Reader for GithubReader {
    fn supports(&self, locator: &str) -> bool {
        locator.starts_with("github:")
    }

    fn parse_path(&self, locator: &str) -> Result<PathInfo, ReadError> {
        let parsed = Self::parse(locator)?;
        Ok(repo_path_info("github", parsed.owner, parsed.repo, parsed.path, parsed.reference))
    }

    fn read(&self, info: &PathInfo) -> Result<String, ReadError> {
        let parsed = Self::parse(&info.path)?;
        let url = raw_content_url(&parsed);
        Ok(fetch_url(&self.client, &url)?)
    }
}

fn raw_content_url(parsed: &GithubPath<'_>) -> String {
    format!(
        "https://raw.githubusercontent.com/{}/{}/{}/{}",
        parsed.owner,
        parsed.repo,
        parsed.reference.unwrap_or("HEAD"),
        parsed.path
    )
}

/// PathInfo shared by the repository-host readers: the canonical locator
/// is rebuilt from its parts, and the repo prefix points at the
/// directory holding the file so sibling includes resolve next to it.
pub(crate) fn repo_path_info(
    scheme: &str,
    group: &str,
    repo: &str,
    path: &str,
    reference: Option<&str>,
) -> PathInfo {
    let mut canonical = format!("{scheme}:{group}/{repo}/{path}");
    if let Some(reference) = reference {
        canonical.push('@');
        canonical.push_str(reference);
    }
    let prefix = match path.rsplit_once('/') {
        Some((dir, _)) => format!("{scheme}:{group}/{repo}/{dir}"),
        None => format!("{scheme}:{group}/{repo}"),
    };
    PathInfo {
        file: file_label(path),
        path: canonical,
        remote: true,
        repo: Some(RepoInfo {
            prefix,
            reference: reference.unwrap_or_default().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn reader() -> GithubReader {
        GithubReader::new(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_claims_only_its_scheme() {
        let reader = reader();
        assert!(reader.supports("github:o/r/lib.txt"));
        assert!(!reader.supports("https://github.com/o/r"));
        assert!(!reader.supports("lib.txt"));
    }

    #[test]
    fn test_locators_parse_into_repo_coordinates() {
        let info = reader().parse_path("github:acme/site/tpl/head.html@v2").unwrap();
        assert_eq!(info.path, "github:acme/site/tpl/head.html@v2");
        assert_eq!(info.file, "head");
        assert!(info.remote);
        let repo = info.repo.unwrap();
        assert_eq!(repo.prefix, "github:acme/site/tpl");
        assert_eq!(repo.reference, "v2");
    }

    #[test]
    fn test_top_level_files_use_the_repo_as_prefix() {
        let info = reader().parse_path("github:acme/site/README.md").unwrap();
        let repo = info.repo.unwrap();
        assert_eq!(repo.prefix, "github:acme/site");
        assert_eq!(repo.reference, "");
    }

    #[test]
    fn test_raw_url_defaults_to_head() {
        let parsed = GithubReader::parse("github:acme/site/tpl/head.html").unwrap();
        assert_eq!(
            raw_content_url(&parsed),
            "https://raw.githubusercontent.com/acme/site/HEAD/tpl/head.html"
        );
        let parsed = GithubReader::parse("github:acme/site/tpl/head.html@v2").unwrap();
        assert_eq!(
            raw_content_url(&parsed),
            "https://raw.githubusercontent.com/acme/site/v2/tpl/head.html"
        );
    }

    #[test]
    fn test_incomplete_locators_are_rejected() {
        for bad in ["github:acme", "github:acme/site", "github:acme//lib.txt", "github:"] {
            let err = reader().parse_path(bad).unwrap_err();
            assert!(err.to_string().contains(SHAPE), "{err}");
        }
    }
}
