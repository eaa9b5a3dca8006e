//! Unified error types for the bucko workspace.
//!
//! Collaborator crates return these variants directly; the orchestrator in
//! `bucko-core` wraps them with the pipeline stage that produced them.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum BuckoError {
    /// No usable compose URL could be derived from the available inputs.
    #[error("cannot resolve compose URL: {message}")]
    Resolution {
        /// Description of why resolution failed.
        message: String,
    },

    /// A required configuration section is absent.
    #[error("missing configuration section [{section}]")]
    MissingSection {
        /// Name of the missing section.
        section: String,
    },

    /// A required configuration key is absent from its section.
    #[error("missing configuration key \"{key}\" in section [{section}]")]
    MissingKey {
        /// Section that was searched.
        section: String,
        /// Key that was not found.
        key: String,
    },

    /// The configuration source is unreadable or malformed.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A placeholder template could not be expanded.
    #[error("template {template:?}: {message}")]
    Template {
        /// Template that failed to expand.
        template: String,
        /// Description of the expansion failure.
        message: String,
    },

    /// An external service (HTTP endpoint, build system, push target) failed.
    #[error("{service}: {message}")]
    Remote {
        /// Name of the external service.
        service: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl BuckoError {
    /// Builds an [`BuckoError::Io`] from a path and the error raised on it.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Builds a [`BuckoError::Remote`] for the named service.
    pub fn remote(service: &'static str, message: impl Into<String>) -> Self {
        Self::Remote {
            service,
            message: message.into(),
        }
    }

    /// Returns `true` for errors caused by absent or malformed configuration.
    pub const fn is_config(&self) -> bool {
        matches!(
            self,
            Self::MissingSection { .. } | Self::MissingKey { .. } | Self::Config { .. }
        )
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, BuckoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_names_section_and_key() {
        let err = BuckoError::MissingKey {
            section: "publish".into(),
            key: "push".into(),
        };
        assert_eq!(
            err.to_string(),
            "missing configuration key \"push\" in section [publish]"
        );
        assert!(err.is_config());
    }

    #[test]
    fn remote_is_not_a_config_error() {
        let err = BuckoError::remote("koji", "task failed");
        assert_eq!(err.to_string(), "koji: task failed");
        assert!(!err.is_config());
    }
}
