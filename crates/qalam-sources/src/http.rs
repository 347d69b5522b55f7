// crates/qalam-sources/src/http.rs

use std::time::Duration;

use reqwest::blocking::Client;

use qalam_engine::{file_label, PathInfo, ReadError, Reader, RepoInfo};

use crate::SourceError;

/// Plain `http://` and `https://` source. The URL itself is the
/// canonical locator; its directory becomes the repo prefix so
/// remote-relative includes resolve against the same tree.
pub struct HttpReader {
    client: Client,
}

impl HttpReader {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }
}

impl Reader for HttpReader {
    fn supports(&self, locator: &str) -> bool {
        locator.starts_with("http://") || locator.starts_with("https://")
    }

    fn parse_path(&self, locator: &str) -> Result<PathInfo, ReadError> {
        Ok(PathInfo {
            file: file_label(locator),
            path: locator.to_string(),
            remote: true,
            repo: Some(RepoInfo {
                prefix: directory_of(locator).to_string(),
                reference: String::new(),
            }),
        })
    }

    fn read(&self, info: &PathInfo) -> Result<String, ReadError> {
        Ok(fetch_url(&self.client, &info.path)?)
    }
}

pub(crate) fn build_client(timeout: Duration) -> Result<Client, SourceError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("qalam/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(SourceError::Client)
}

pub(crate) fn fetch_url(client: &Client, url: &str) -> Result<String, SourceError> {
    let response = client.get(url).send().map_err(|source| SourceError::Http {
        url: url.to_string(),
        source,
    })?;
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status {
            status,
            url: url.to_string(),
        });
    }
    response.text().map_err(|source| SourceError::Http {
        url: url.to_string(),
        source,
    })
}

/// The URL with its last path segment dropped. The scheme and host are
/// never truncated.
fn directory_of(url: &str) -> &str {
    let host_start = url.find("://").map(|at| at + 3).unwrap_or(0);
    match url[host_start..].rfind('/') {
        Some(slash) => &url[..host_start + slash],
        None => url,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn reader() -> HttpReader {
        HttpReader::new(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_claims_only_http_schemes() {
        let reader = reader();
        assert!(reader.supports("https://example.com/lib.txt"));
        assert!(reader.supports("http://example.com/lib.txt"));
        assert!(!reader.supports("github:o/r/lib.txt"));
        assert!(!reader.supports("lib.txt"));
    }

    #[test]
    fn test_urls_pass_through_with_their_directory_as_prefix() {
        let info = reader()
            .parse_path("https://example.com/snippets/head.html")
            .unwrap();
        assert_eq!(info.path, "https://example.com/snippets/head.html");
        assert_eq!(info.file, "head");
        assert!(info.remote);
        let repo = info.repo.unwrap();
        assert_eq!(repo.prefix, "https://example.com/snippets");
        assert_eq!(repo.reference, "");
    }

    #[test]
    fn test_host_only_urls_keep_their_host() {
        assert_eq!(directory_of("https://example.com"), "https://example.com");
        assert_eq!(directory_of("https://example.com/a"), "https://example.com");
    }
}
