//! # bucko-registry
//!
//! Resolves a parent image reference (`[host/]name[:tag][@digest]`) into
//! the build NVR the build system needs, by reading the image's labels from
//! a registry that speaks the Docker Registry HTTP API v2.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

use std::collections::BTreeMap;
use std::fmt;

use bucko_common::config::Config;
use bucko_common::error::{BuckoError, Result};
use serde::Deserialize;

/// Configuration section holding the registry URL.
pub const REGISTRY_SECTION: &str = "registry";

/// Manifest media type requested from the registry.
pub const MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// Label holding the build component name.
pub const COMPONENT_LABEL: &str = "com.redhat.component";

/// Resolves parent image references to build references.
pub trait ParentResolver {
    /// Returns the build reference (NVR) for `image`.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be found or lacks build labels.
    fn resolve(&self, image: &str) -> Result<String>;
}

/// A parsed `[host/]name[:tag][@digest]` image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Registry host the reference was qualified with, if any.
    pub host: Option<String>,
    /// Repository path within the registry (`rhel7/rhel`).
    pub name: String,
    /// Manifest reference: the digest when one is given, else the tag
    /// (`latest` when omitted).
    pub reference: String,
}

impl ImageRef {
    /// Parses an image reference.
    ///
    /// A leading path component containing `.` or `:`, or equal to
    /// `localhost`, is a registry host and is not part of the repository
    /// path. A digest takes precedence over any tag.
    ///
    /// # Errors
    ///
    /// Returns [`BuckoError::Config`] for an empty name, tag, or digest.
    pub fn parse(image: &str) -> Result<Self> {
        let invalid = || BuckoError::Config {
            message: format!("invalid parent image reference {image:?}"),
        };

        let (path, digest) = match image.split_once('@') {
            Some((path, digest)) => match digest.split_once(':') {
                Some((algorithm, hex)) if !algorithm.is_empty() && !hex.is_empty() => {
                    (path, Some(digest))
                }
                _ => return Err(invalid()),
            },
            None => (image, None),
        };

        let (host, repository) = match path.split_once('/') {
            Some((first, rest)) if is_registry_host(first) => (Some(first), rest),
            _ => (None, path),
        };

        let last_segment = repository.rfind('/').map_or(0, |i| i + 1);
        let (name, tag) = match repository[last_segment..].rfind(':') {
            Some(i) => {
                let split = last_segment + i;
                (&repository[..split], Some(&repository[split + 1..]))
            }
            None => (repository, None),
        };
        if name.is_empty() || tag.is_some_and(str::is_empty) {
            return Err(invalid());
        }

        Ok(Self {
            host: host.map(str::to_string),
            name: name.to_string(),
            reference: digest.or(tag).unwrap_or("latest").to_string(),
        })
    }

    /// Returns `true` when the manifest is pinned by digest.
    pub fn is_digest(&self) -> bool {
        self.reference.contains(':')
    }
}

fn is_registry_host(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(host) = &self.host {
            write!(f, "{host}/")?;
        }
        let separator = if self.is_digest() { '@' } else { ':' };
        write!(f, "{}{separator}{}", self.name, self.reference)
    }
}

#[derive(Deserialize)]
struct Manifest {
    config: Descriptor,
}

#[derive(Deserialize)]
struct Descriptor {
    digest: String,
}

#[derive(Deserialize)]
struct ImageConfig {
    #[serde(default)]
    config: ContainerConfig,
}

#[derive(Deserialize, Default)]
struct ContainerConfig {
    #[serde(rename = "Labels", default)]
    labels: Option<BTreeMap<String, String>>,
}

/// Builds `<component>-<version>-<release>` from image labels.
///
/// # Errors
///
/// Returns [`BuckoError::Remote`] naming the first missing label.
pub fn nvr_from_labels(labels: &BTreeMap<String, String>) -> Result<String> {
    let label = |key: &str| {
        labels
            .get(key)
            .ok_or_else(|| BuckoError::remote("registry", format!("image lacks label {key:?}")))
    };
    Ok(format!(
        "{}-{}-{}",
        label(COMPONENT_LABEL)?,
        label("version")?,
        label("release")?
    ))
}

/// [`ParentResolver`] that queries a v2 registry over HTTP(S).
#[derive(Debug, Clone)]
pub struct Registry {
    url: String,
    client: reqwest::blocking::Client,
}

impl Registry {
    /// Creates a client for the registry at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Creates a client from the `[registry]` section (`url`).
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the section or key is absent.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.lookup(REGISTRY_SECTION, "url")?))
    }

    /// Returns the registry base URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str, accept: &str) -> Result<T> {
        tracing::debug!(url = %url, "querying registry");
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, accept)
            .send()
            .map_err(|e| BuckoError::remote("registry", format!("failed to fetch {url}: {e}")))?;
        if !response.status().is_success() {
            return Err(BuckoError::remote(
                "registry",
                format!("HTTP {} fetching {url}", response.status()),
            ));
        }
        response.json().map_err(|e| {
            BuckoError::remote("registry", format!("invalid response from {url}: {e}"))
        })
    }

    /// Reads the labels of an image.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest or image configuration cannot be
    /// fetched or parsed.
    pub fn labels(&self, image: &ImageRef) -> Result<BTreeMap<String, String>> {
        let manifest: Manifest = self.get_json(
            &format!("{}/v2/{}/manifests/{}", self.url, image.name, image.reference),
            MANIFEST_V2,
        )?;
        let config: ImageConfig = self.get_json(
            &format!("{}/v2/{}/blobs/{}", self.url, image.name, manifest.config.digest),
            "application/json",
        )?;
        Ok(config.config.labels.unwrap_or_default())
    }
}

impl ParentResolver for Registry {
    fn resolve(&self, image: &str) -> Result<String> {
        let image = ImageRef::parse(image)?;
        let nvr = nvr_from_labels(&self.labels(&image)?)?;
        tracing::debug!(image = %image, nvr = %nvr, "resolved parent image");
        Ok(nvr)
    }
}
