//! Build request, result, and metadata types shared across the workspace.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{
    COMPOSE_ID_KEY, COMPOSE_URL_KEY, REPOSITORIES_KEY, REPOSITORY_KEY, TASK_KEY,
};
use crate::error::Result;

/// Which compose to build from and, when known up front, for which branch.
///
/// Immutable once orchestration starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    compose_url: String,
    branch: Option<String>,
}

impl BuildRequest {
    /// Creates a request for the given compose URL.
    pub fn new(compose_url: impl Into<String>) -> Self {
        Self {
            compose_url: compose_url.into(),
            branch: None,
        }
    }

    /// Pins the target branch instead of deriving it from the compose.
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Returns the compose URL.
    pub fn compose_url(&self) -> &str {
        &self.compose_url
    }

    /// Returns the pinned branch, if any.
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }
}

/// Identifier of a task on the remote build system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(u64);

impl TaskId {
    /// Wraps a raw task number.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw task number.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Repositories produced by a container build.
///
/// A single repository is reported under the singular key; zero or several
/// keep the full list in build-system order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repositories {
    /// Exactly one repository was produced.
    Single(String),
    /// Zero or more than one repository was produced.
    Many(Vec<String>),
}

impl Repositories {
    /// Applies the cardinality collapse to a raw list.
    pub fn collapse(mut repositories: Vec<String>) -> Self {
        if repositories.len() == 1 {
            Self::Single(repositories.remove(0))
        } else {
            Self::Many(repositories)
        }
    }
}

/// Outcome of a completed container build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    /// Remote task that performed the build.
    pub task_id: TaskId,
    /// Produced repositories after the cardinality collapse.
    pub repositories: Repositories,
}

impl BuildResult {
    /// Creates a result, collapsing a single repository to the singular form.
    pub fn new(task_id: TaskId, repositories: Vec<String>) -> Self {
        Self {
            task_id,
            repositories: Repositories::collapse(repositories),
        }
    }

    /// Returns the single repository, if exactly one was produced.
    pub fn repository(&self) -> Option<&str> {
        match &self.repositories {
            Repositories::Single(r) => Some(r),
            Repositories::Many(_) => None,
        }
    }
}

/// A scalar metadata value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// Integer value (task identifiers).
    Integer(u64),
    /// Text value.
    Text(String),
    /// Ordered list of text values.
    List(Vec<String>),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Text(s) => f.write_str(s),
            Self::List(items) => f.write_str(&items.join(",")),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Flat key/value record describing one build, sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildMetadata(BTreeMap<String, MetadataValue>);

impl BuildMetadata {
    /// Starts a record for a compose; both compose keys are always present.
    pub fn for_compose(compose_url: &str, compose_id: &str) -> Self {
        let mut metadata = Self::default();
        metadata.insert(COMPOSE_URL_KEY, compose_url);
        metadata.insert(COMPOSE_ID_KEY, compose_id);
        metadata
    }

    /// Merges the fields of a completed build.
    pub fn record_build(&mut self, result: &BuildResult) {
        self.insert(TASK_KEY, MetadataValue::Integer(result.task_id.get()));
        match &result.repositories {
            Repositories::Single(repo) => self.insert(REPOSITORY_KEY, repo.as_str()),
            Repositories::Many(repos) => {
                self.insert(REPOSITORIES_KEY, MetadataValue::List(repos.clone()));
            }
        }
    }

    /// Inserts or replaces a value.
    pub fn insert(&mut self, key: &str, value: impl Into<MetadataValue>) {
        let _ = self.0.insert(key.to_string(), value.into());
    }

    /// Returns a value by its exact key.
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.0.get(key)
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Serializes to compact JSON with keys sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Renders `KEY=value` lines with uppercased keys, one per entry.
    pub fn to_properties(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{}={v}\n", k.to_uppercase()))
            .collect()
    }
}
