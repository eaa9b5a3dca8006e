//! Retrieval of compose metadata from an HTTP-accessible compose.

use bucko_common::error::{BuckoError, Result};

use crate::info::ComposeInfo;

/// Location of the metadata document, relative to the compose URL.
pub const COMPOSEINFO_PATH: &str = "compose/metadata/composeinfo.json";

/// Reads compose metadata for a compose URL.
pub trait ComposeReader {
    /// Fetches and parses the compose's metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be fetched or parsed.
    fn read(&self, compose_url: &str) -> Result<ComposeInfo>;
}

/// Reads `composeinfo.json` over HTTP(S).
#[derive(Debug, Clone, Default)]
pub struct HttpComposeReader {
    client: reqwest::blocking::Client,
}

impl HttpComposeReader {
    /// Creates a reader with a default HTTP client.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Returns the metadata URL for a compose.
pub fn composeinfo_url(compose_url: &str) -> String {
    format!("{}/{COMPOSEINFO_PATH}", compose_url.trim_end_matches('/'))
}

impl ComposeReader for HttpComposeReader {
    fn read(&self, compose_url: &str) -> Result<ComposeInfo> {
        let url = composeinfo_url(compose_url);
        tracing::debug!(url = %url, "fetching compose metadata");

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| BuckoError::remote("compose", format!("failed to fetch {url}: {e}")))?;
        if !response.status().is_success() {
            return Err(BuckoError::remote(
                "compose",
                format!("HTTP {} fetching {url}", response.status()),
            ));
        }
        let body = response.text().map_err(|e| {
            BuckoError::remote("compose", format!("failed to read body of {url}: {e}"))
        })?;

        ComposeInfo::from_json(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composeinfo_url_joins_without_double_slash() {
        assert_eq!(
            composeinfo_url("http://x/RHCEPH-3.0/"),
            "http://x/RHCEPH-3.0/compose/metadata/composeinfo.json"
        );
        assert_eq!(
            composeinfo_url("http://x/RHCEPH-3.0"),
            "http://x/RHCEPH-3.0/compose/metadata/composeinfo.json"
        );
    }
}
