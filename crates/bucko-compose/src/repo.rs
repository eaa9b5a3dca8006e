//! Compose object and yum `.repo` descriptor generation.

use std::fmt::Write as _;
use std::path::PathBuf;

use bucko_common::config::{Config, Section};
use bucko_common::constants::{APP_NAME, BASE_SECTION_SUFFIX};
use bucko_common::error::{BuckoError, Result};

use crate::info::ComposeInfo;

/// Architecture whose repositories are written to the descriptor.
pub const REPO_ARCH: &str = "x86_64";

/// Base product the container is layered on, from the `<branch>-base` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseProduct {
    /// Package repository URL of the base product.
    pub url: String,
    /// GPG key URL for the base product packages.
    pub gpgkey: Option<String>,
    /// Additional repository URL (extras channel).
    pub extras: Option<String>,
    /// Parent image reference, resolved through the registry before building.
    pub parent_image: Option<String>,
}

impl BaseProduct {
    /// Reads the `<branch>-base` section.
    ///
    /// Only `url` is required; `gpgkey`, `extras`, and `parent_image` are
    /// optional.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the section or the `url` key.
    pub fn from_config(config: &Config, branch: &str) -> Result<Self> {
        let section = format!("{branch}{BASE_SECTION_SUFFIX}");
        let optional = |key: &str| config.get(&section, key).map(str::to_string);
        Ok(Self {
            url: config.lookup(&section, "url")?.to_string(),
            gpgkey: optional("gpgkey"),
            extras: optional("extras"),
            parent_image: optional("parent_image"),
        })
    }
}

/// A compose located at a URL together with its signing keys.
#[derive(Debug, Clone)]
pub struct Compose {
    url: String,
    info: ComposeInfo,
    keys: Section,
    base_product: Option<BaseProduct>,
}

impl Compose {
    /// Pairs compose metadata with the `keys` configuration section.
    pub fn new(url: impl Into<String>, info: ComposeInfo, keys: Section) -> Self {
        Self {
            url: url.into(),
            info,
            keys,
            base_product: None,
        }
    }

    /// Returns the compose metadata.
    pub const fn info(&self) -> &ComposeInfo {
        &self.info
    }

    /// Attaches base product settings.
    pub fn set_base_product(&mut self, base_product: BaseProduct) {
        self.base_product = Some(base_product);
    }

    /// Returns the configured parent image reference, if any.
    pub fn parent_image(&self) -> Option<&str> {
        self.base_product
            .as_ref()
            .and_then(|bp| bp.parent_image.as_deref())
    }

    /// Returns the signing key for this compose's release family.
    ///
    /// Keys in the `keys` section are matched on the lowercased release
    /// short name.
    pub fn signing_key(&self) -> Option<&str> {
        self.keys
            .get(&self.info.release_short.to_lowercase())
            .map(String::as_str)
    }

    /// Renders the `.repo` descriptor text.
    pub fn repo_file_contents(&self) -> String {
        let root = format!("{}/compose", self.url.trim_end_matches('/'));
        let mut out = String::new();

        for variant in &self.info.variants {
            let Some(path) = variant.repositories.get(REPO_ARCH) else {
                continue;
            };
            write_section(
                &mut out,
                &format!("{}-{}", self.info.compose_id, variant.uid),
                &format!("{} {}", self.info.compose_id, variant.uid),
                &format!("{root}/{path}"),
                self.signing_key(),
            );
        }

        if let Some(bp) = &self.base_product {
            write_section(
                &mut out,
                "base-product",
                &format!("base product for {}", self.info.compose_id),
                &bp.url,
                bp.gpgkey.as_deref(),
            );
            if let Some(extras) = &bp.extras {
                write_section(
                    &mut out,
                    "base-product-extras",
                    &format!("base product extras for {}", self.info.compose_id),
                    extras,
                    bp.gpgkey.as_deref(),
                );
            }
        }

        out
    }

    /// Writes the `.repo` descriptor into a fresh temporary directory.
    ///
    /// The directory is kept after return so the file can be published.
    ///
    /// # Errors
    ///
    /// Returns [`BuckoError::Io`] if the directory or file cannot be written.
    pub fn write_repo_file(&self) -> Result<PathBuf> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("{APP_NAME}-"))
            .suffix(".repo")
            .tempdir()
            .map_err(|e| BuckoError::io(std::env::temp_dir(), e))?
            .keep();
        let path = dir.join(format!("{}.repo", self.info.compose_id));
        std::fs::write(&path, self.repo_file_contents()).map_err(|e| BuckoError::io(&path, e))?;
        tracing::debug!(path = %path.display(), "wrote repo descriptor");
        Ok(path)
    }
}

fn write_section(out: &mut String, id: &str, name: &str, baseurl: &str, gpgkey: Option<&str>) {
    if !out.is_empty() {
        out.push('\n');
    }
    let _ = writeln!(out, "[{id}]");
    let _ = writeln!(out, "name={name}");
    let _ = writeln!(out, "baseurl={baseurl}");
    let _ = writeln!(out, "enabled=1");
    match gpgkey {
        Some(key) => {
            let _ = writeln!(out, "gpgcheck=1");
            let _ = writeln!(out, "gpgkey={key}");
        }
        None => {
            let _ = writeln!(out, "gpgcheck=0");
        }
    }
}
