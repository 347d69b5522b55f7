// crates/qalam-sources/src/bitbucket.rs

use std::time::Duration;

use reqwest::blocking::Client;

use qalam_engine::{PathInfo, ReadError, Reader};

use crate::github::repo_path_info;
use crate::http::{build_client, fetch_url};
use crate::{split_reference, SourceError};

const SHAPE: &str = "bitbucket:project/repo/path[@ref]";

/// Bitbucket Server source, read through the raw endpoint of a
/// configured server.
pub struct BitbucketReader {
    base_url: String,
    client: Client,
}

struct BitbucketPath<'a> {
    project: &'a str,
    repo: &'a str,
    path: &'a str,
    reference: Option<&'a str>,
}

impl BitbucketReader {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self {
            base_url,
            client: build_client(timeout)?,
        })
    }

    fn parse(locator: &str) -> Result<BitbucketPath<'_>, SourceError> {
        let malformed = || SourceError::Locator {
            locator: locator.to_string(),
            expected: SHAPE,
        };
        let rest = locator.strip_prefix("bitbucket:").ok_or_else(malformed)?;
        let (rest, reference) = split_reference(rest);
        let mut parts = rest.splitn(3, '/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(project), Some(repo), Some(path))
                if !project.is_empty() && !repo.is_empty() && !path.is_empty() =>
            {
                Ok(BitbucketPath {
                    project,
                    repo,
                    path,
                    reference,
                })
            }
            _ => Err(malformed()),
        }
    }

    fn raw_url(&self, parsed: &BitbucketPath<'_>) -> String {
        let mut url = format!(
            "{}/projects/{}/repos/{}/raw/{}",
            self.base_url, parsed.project, parsed.repo, parsed.path
        );
        if let Some(reference) = parsed.reference {
            url.push_str("?at=");
            url.push_str(reference);
        }
        url
    }
}

impl Reader for BitbucketReader {
    fn supports(&self, locator: &str) -> bool {
        locator.starts_with("bitbucket:")
    }

    fn parse_path(&self, locator: &str) -> Result<PathInfo, ReadError> {
        let parsed = Self::parse(locator)?;
        Ok(repo_path_info(
            "bitbucket",
            parsed.project,
            parsed.repo,
            parsed.path,
            parsed.reference,
        ))
    }

    fn read(&self, info: &PathInfo) -> Result<String, ReadError> {
        let parsed = Self::parse(&info.path)?;
        let url = self.raw_url(&parsed);
        Ok(fetch_url(&self.client, &url)?)
    }
}
