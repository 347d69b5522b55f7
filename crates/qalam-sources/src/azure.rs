// crates/qalam-sources/src/azure.rs

use std::time::Duration;

use reqwest::blocking::Client;

use qalam_engine::{PathInfo, ReadError, Reader};

use crate::github::repo_path_info;
use crate::http::{build_client, fetch_url};
use crate::{split_reference, SourceError};

const SHAPE: &str = "azure:organization/project/repo/path[@ref]";
const API_VERSION: &str = "7.1";

/// Azure Repos source, read through the items API of a configured
/// server (dev.azure.com unless overridden).
pub struct AzureReader {
    base_url: String,
    client: Client,
}

struct AzurePath<'a> {
    organization: &'a str,
    project: &'a str,
    repo: &'a str,
    path: &'a str,
    reference: Option<&'a str>,
}

impl AzureReader {
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

    fn parse(locator: &str) -> Result<AzurePath<'_>, SourceError> {
        let malformed = || SourceError::Locator {
            locator: locator.to_string(),
            expected: SHAPE,
        };
        let rest = locator.strip_prefix("azure:").ok_or_else(malformed)?;
        let (rest, reference) = split_reference(rest);
        let mut parts = rest.splitn(4, '/');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(organization), Some(project), Some(repo), Some(path))
                if !organization.is_empty()
                    && !project.is_empty()
                    && !repo.is_empty()
                    && !path.is_empty() =>
            {
                Ok(AzurePath {
                    organization,
                    project,
                    repo,
                    path,
                    reference,
                })
            }
            _ => Err(malformed()),
        }
    }

    fn items_url(&self, parsed: &AzurePath<'_>) -> String {
        let mut url = format!(
            "{}/{}/{}/_apis/git/repositories/{}/items?path=/{}&includeContent=true&$format=text",
            self.base_url, parsed.organization, parsed.project, parsed.repo, parsed.path
        );
        if let Some(reference) = parsed.reference {
            url.push_str("&versionDescriptor.version=");
            url.push_str(reference);
        }
        url.push_str("&api-version=");
        url.push_str(API_VERSION);
        url
    }
}

impl Reader for AzureReader {
    fn supports(&self, locator: &str) -> bool {
        locator.starts_with("azure:")
    }

    fn parse_path(&self, locator: &str) -> Result<PathInfo, ReadError> {
        let parsed = Self::parse(locator)?;
        let group = format!("{}/{}", parsed.organization, parsed.project);
        Ok(repo_path_info(
            "azure",
            &group,
            parsed.repo,
            parsed.path,
            parsed.reference,
        ))
    }

    fn read(&self, info: &PathInfo) -> Result<String, ReadError> {
        let parsed = Self::parse(&info.path)?;
        let url = self.items_url(&parsed);
        Ok(fetch_url(&self.client, &url)?)
    }
}
