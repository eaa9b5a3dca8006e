//! # bucko-publish
//!
//! Pushes generated files (repo descriptors, build metadata) to a location
//! served over HTTP and returns the URL they can be retrieved from.
//!
//! Every publication lands in its own freshly generated directory, so
//! publishing the same file twice yields two distinct URLs.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

use std::path::{Path, PathBuf};
use std::process::Command;

use bucko_common::config::Config;
use bucko_common::error::{BuckoError, Result};

/// Configuration section holding the publish endpoints.
pub const PUBLISH_SECTION: &str = "publish";

/// Publishes local files and reports their public URLs.
pub trait Publisher {
    /// Pushes `path` and returns the URL it is served from.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be pushed.
    fn publish(&self, path: &Path) -> Result<String>;

    /// Returns a human-readable description of the push destination.
    fn push_url(&self) -> &str;
}

/// Where files are pushed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// A directory on this host (plain path or `file://` URL).
    Local(PathBuf),
    /// An rsync target such as `user@host:/var/www/html/bucko`.
    Rsync(String),
}

impl Destination {
    /// Classifies a push URL.
    pub fn parse(push_url: &str) -> Self {
        if let Some(path) = push_url.strip_prefix("file://") {
            return Self::Local(PathBuf::from(path));
        }
        match push_url.split_once(':') {
            Some((host, _)) if !host.is_empty() && !host.contains('/') => {
                Self::Rsync(push_url.to_string())
            }
            _ => Self::Local(PathBuf::from(push_url)),
        }
    }
}

/// Publishes by pushing into `push` and serving from `http`.
#[derive(Debug, Clone)]
pub struct PushPublisher {
    push_url: String,
    http_url: String,
    destination: Destination,
}

impl PushPublisher {
    /// Creates a publisher for the given push destination and HTTP base URL.
    pub fn new(push_url: impl Into<String>, http_url: impl Into<String>) -> Self {
        let push_url = push_url.into();
        Self {
            destination: Destination::parse(&push_url),
            push_url,
            http_url: http_url.into(),
        }
    }

    /// Creates a publisher from the `[publish]` section (`push`, `http`).
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the missing key.
    pub fn from_config(config: &Config) -> Result<Self> {
        let push = config.lookup(PUBLISH_SECTION, "push")?;
        let http = config.lookup(PUBLISH_SECTION, "http")?;
        Ok(Self::new(push, http))
    }

    fn public_url(&self, subdir: &str, file_name: &str) -> String {
        format!("{}/{subdir}/{file_name}", self.http_url.trim_end_matches('/'))
    }
}

impl Publisher for PushPublisher {
    fn publish(&self, path: &Path) -> Result<String> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| BuckoError::Config {
                message: format!("cannot publish {}: no file name", path.display()),
            })?;
        let subdir = uuid::Uuid::new_v4().to_string();

        match &self.destination {
            Destination::Local(root) => copy_into(path, &root.join(&subdir), file_name)?,
            Destination::Rsync(target) => rsync_into(path, target, &subdir, file_name)?,
        }

        let url = self.public_url(&subdir, file_name);
        tracing::debug!(file = %path.display(), url = %url, "published");
        Ok(url)
    }

    fn push_url(&self) -> &str {
        &self.push_url
    }
}

fn copy_into(source: &Path, dir: &Path, file_name: &str) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| BuckoError::io(dir, e))?;
    let dest = dir.join(file_name);
    let _ = std::fs::copy(source, &dest).map_err(|e| BuckoError::io(&dest, e))?;
    Ok(())
}

/// Stages `<subdir>/<file_name>` locally and rsyncs the tree to `target`.
fn rsync_into(source: &Path, target: &str, subdir: &str, file_name: &str) -> Result<()> {
    let rsync = which::which("rsync")
        .map_err(|_| BuckoError::remote("publish", "rsync not found in PATH"))?;

    let stage = tempfile::tempdir().map_err(|e| BuckoError::io(std::env::temp_dir(), e))?;
    copy_into(source, &stage.path().join(subdir), file_name)?;

    let output = Command::new(&rsync)
        .arg("--recursive")
        .arg("--times")
        .arg("--chmod=Du=rwx,Dgo=rx,Fu=rw,Fgo=r")
        .arg(format!("{}/", stage.path().display()))
        .arg(format!("{}/", target.trim_end_matches('/')))
        .output()
        .map_err(|e| BuckoError::io(&rsync, e))?;

    if !output.status.success() {
        return Err(BuckoError::remote(
            "publish",
            format!(
                "rsync to {target} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }
    Ok(())
}
