//! The scratch-build pipeline.
//!
//! One invocation runs a single linear sequence of stages:
//!
//! ```text
//! Start → RequestResolved → Configured → ComposeLoaded → BranchResolved
//!       → RepoFileGenerated → RepoPublished → (ParentResolved | ParentSkipped)
//!       → BuildSubmitted → ResultCollected → MetadataPublished → Done
//! ```
//!
//! The first failing stage ends the run with a [`PipelineError`] naming it.
//! Side effects of earlier stages (published files, submitted builds) are
//! left as they are.

use std::fmt;
use std::path::PathBuf;

use bucko_common::config::{Config, ConfigLoader};
use bucko_common::error::{BuckoError, Result};
use bucko_common::types::{BuildMetadata, BuildRequest, BuildResult};
use bucko_compose::{BaseProduct, Compose};
use bucko_koji::{KojiSettings, ScratchBuild};
use thiserror::Error;

use crate::branch::BranchResolver;
use crate::collaborators::Collaborators;
use crate::output;
use crate::resolve::resolve_request;

/// Configuration section mapping release families to signing keys.
pub const KEYS_SECTION: &str = "keys";

/// States of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Nothing has happened yet.
    Start,
    /// A compose URL has been determined.
    RequestResolved,
    /// Configuration has been loaded.
    Configured,
    /// Compose metadata has been read.
    ComposeLoaded,
    /// The dist-git branch and its base product are known.
    BranchResolved,
    /// The `.repo` descriptor has been written locally.
    RepoFileGenerated,
    /// The `.repo` descriptor has been published.
    RepoPublished,
    /// The parent image has been resolved to a build reference.
    ParentResolved,
    /// No parent image is configured.
    ParentSkipped,
    /// The build task has been submitted and has finished.
    BuildSubmitted,
    /// The produced repositories are known.
    ResultCollected,
    /// Build metadata has been published.
    MetadataPublished,
    /// The run completed.
    Done,
}

impl Stage {
    /// Short name of the work that leads into this state.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::RequestResolved => "resolve-request",
            Self::Configured => "load-config",
            Self::ComposeLoaded => "load-compose",
            Self::BranchResolved => "resolve-branch",
            Self::RepoFileGenerated => "generate-repo-file",
            Self::RepoPublished => "publish-repo-file",
            Self::ParentResolved => "resolve-parent-image",
            Self::ParentSkipped => "skip-parent-image",
            Self::BuildSubmitted => "build-container",
            Self::ResultCollected => "collect-result",
            Self::MetadataPublished => "publish-metadata",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classification of a pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No usable compose URL could be derived.
    Resolution,
    /// Required configuration is absent or malformed.
    Configuration,
    /// An external system failed.
    Collaborator,
}

/// A fatal failure, tagged with the stage that could not be reached.
///
/// The cause is rendered inline and is not reported as an error source.
#[derive(Debug, Error)]
#[error("stage {stage} failed: {cause}")]
pub struct PipelineError {
    /// Stage whose work failed.
    pub stage: Stage,
    /// Underlying cause.
    pub cause: BuckoError,
}

impl PipelineError {
    /// Classifies the failure.
    pub const fn kind(&self) -> ErrorKind {
        match &self.cause {
            BuckoError::Resolution { .. } => ErrorKind::Resolution,
            BuckoError::Template { .. } => ErrorKind::Configuration,
            cause if cause.is_config() => ErrorKind::Configuration,
            _ => ErrorKind::Collaborator,
        }
    }
}

/// Process-level inputs, captured once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CiEnvironment {
    /// Compose URL given explicitly; skips resolution entirely.
    pub compose: Option<String>,
    /// Raw CI event payload.
    pub ci_message: Option<String>,
    /// Fallback compose URL, possibly a `%(name)s` template.
    pub compose_url_template: Option<String>,
    /// CI workspace receiving the props file.
    pub workspace: Option<PathBuf>,
}

impl CiEnvironment {
    /// Determines the build request from these inputs.
    ///
    /// # Errors
    ///
    /// Returns [`BuckoError::Resolution`] if no compose URL can be derived.
    pub fn build_request(&self) -> Result<BuildRequest> {
        match self.compose.as_deref() {
            Some(url) if !url.is_empty() => Ok(BuildRequest::new(url)),
            _ => resolve_request(
                self.ci_message.as_deref(),
                self.compose_url_template.as_deref(),
            ),
        }
    }
}

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// The resolved request.
    pub request: BuildRequest,
    /// Branch the container was built from.
    pub branch: String,
    /// Public URL of the `.repo` descriptor.
    pub repo_url: String,
    /// Parent build reference, when a parent image was configured.
    pub parent_build: Option<String>,
    /// Build outcome.
    pub result: BuildResult,
    /// Metadata as published.
    pub metadata: BuildMetadata,
    /// Local path of the JSON metadata file.
    pub metadata_file: PathBuf,
    /// Public URL of the JSON metadata file.
    pub metadata_url: String,
    /// Props file, when one was written.
    pub props_file: Option<PathBuf>,
    /// States visited, in order, from `Start` to `Done`.
    pub transitions: Vec<Stage>,
}

/// Records state transitions and tags failures with their stage.
#[derive(Debug)]
struct Progress {
    transitions: Vec<Stage>,
}

impl Progress {
    fn new() -> Self {
        Self {
            transitions: vec![Stage::Start],
        }
    }

    fn step<T>(
        &mut self,
        stage: Stage,
        work: impl FnOnce() -> Result<T>,
    ) -> std::result::Result<T, PipelineError> {
        match work() {
            Ok(value) => {
                self.enter(stage);
                Ok(value)
            }
            Err(cause) => {
                tracing::error!(stage = %stage, error = %cause, "stage failed");
                Err(PipelineError { stage, cause })
            }
        }
    }

    fn enter(&mut self, stage: Stage) {
        tracing::debug!(stage = %stage, "stage complete");
        self.transitions.push(stage);
    }
}

/// Runs scratch builds against a set of collaborators.
#[derive(Debug)]
pub struct Orchestrator<C> {
    collaborators: C,
}

impl<C: Collaborators> Orchestrator<C> {
    /// Creates an orchestrator using the given collaborators.
    pub const fn new(collaborators: C) -> Self {
        Self { collaborators }
    }

    /// Runs one build end to end.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineError`] naming the first stage that failed.
    pub fn run(
        &self,
        env: &CiEnvironment,
        loader: &dyn ConfigLoader,
    ) -> std::result::Result<RunReport, PipelineError> {
        let mut progress = Progress::new();

        let request = progress.step(Stage::RequestResolved, || env.build_request())?;
        tracing::info!(compose = %request.compose_url(), "building from compose");

        let config = progress.step(Stage::Configured, || loader.load())?;

        let mut compose = progress.step(Stage::ComposeLoaded, || {
            self.load_compose(&config, request.compose_url())
        })?;

        let (branch, base_product) = progress.step(Stage::BranchResolved, || {
            resolve_branch(&config, &compose, request.branch())
        })?;
        compose.set_base_product(base_product);

        tracing::info!(release = %compose.info().release_short, "generating .repo file");
        let repo_file = progress.step(Stage::RepoFileGenerated, || compose.write_repo_file())?;

        let (publisher, repo_url) = progress.step(Stage::RepoPublished, || {
            let publisher = self.collaborators.publisher(&config)?;
            tracing::info!(push = %publisher.push_url(), "publishing .repo file");
            let url = publisher.publish(&repo_file)?;
            Ok((publisher, url))
        })?;
        tracing::info!(url = %repo_url, "published .repo file");

        let parent_build = match compose.parent_image() {
            Some(image) => Some(progress.step(Stage::ParentResolved, || {
                tracing::info!(image = %image, "resolving parent image");
                self.collaborators.parent_resolver(&config)?.resolve(image)
            })?),
            None => {
                progress.enter(Stage::ParentSkipped);
                None
            }
        };

        let (builder, task) = progress.step(Stage::BuildSubmitted, || {
            let settings = KojiSettings::from_config(&config, &branch)?;
            let builder = self.collaborators.container_builder(&settings)?;
            tracing::info!(hub = %settings.hub, branch = %branch, "building container");
            let task = builder.build_container(&ScratchBuild {
                scm: settings.scm.clone(),
                target: settings.target.clone(),
                branch: branch.clone(),
                repo_urls: vec![repo_url.clone()],
                parent_build: parent_build.clone(),
            })?;
            builder.watch_task(task)?;
            Ok((builder, task))
        })?;

        let result = progress.step(Stage::ResultCollected, || {
            Ok(BuildResult::new(task, builder.repositories(task)?))
        })?;

        let compose_id = compose.info().compose_id.clone();
        let (metadata, metadata_file, metadata_url) =
            progress.step(Stage::MetadataPublished, || {
                let mut metadata = BuildMetadata::for_compose(request.compose_url(), &compose_id);
                metadata.record_build(&result);
                let file = output::write_metadata_file(&compose_id, &metadata)?;
                let url = publisher.publish(&file)?;
                Ok((metadata, file, url))
            })?;
        tracing::info!(url = %metadata_url, "OSBS JSON data published");

        let props_file = output::emit_props_file(env.workspace.as_deref(), &metadata);
        progress.enter(Stage::Done);

        Ok(RunReport {
            request,
            branch,
            repo_url,
            parent_build,
            result,
            metadata,
            metadata_file,
            metadata_url,
            props_file,
            transitions: progress.transitions,
        })
    }

    fn load_compose(&self, config: &Config, compose_url: &str) -> Result<Compose> {
        let keys = config.section(KEYS_SECTION)?.clone();
        let info = self.collaborators.compose_reader().read(compose_url)?;
        tracing::info!(compose_id = %info.compose_id, "loaded compose");
        Ok(Compose::new(compose_url, info, keys))
    }
}

fn resolve_branch(
    config: &Config,
    compose: &Compose,
    requested: Option<&str>,
) -> Result<(String, BaseProduct)> {
    let info = compose.info();
    let branch =
        BranchResolver::from_config(config).resolve(&info.release_short, &info.release_version);
    if let Some(requested) = requested.filter(|r| *r != branch) {
        tracing::warn!(
            requested = %requested,
            branch = %branch,
            "CI message branch differs from compose branch; building the compose branch"
        );
    }
    let base_product = BaseProduct::from_config(config, &branch)?;
    tracing::info!(branch = %branch, base = %base_product.url, "resolved branch");
    Ok((branch, base_product))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_compose_skips_resolution() {
        let env = CiEnvironment {
            compose: Some("http://c/explicit".into()),
            ci_message: Some(r#"{"branch": "malformed"}"#.into()),
            ..CiEnvironment::default()
        };
        assert_eq!(env.build_request().expect("request").compose_url(), "http://c/explicit");
    }

    #[test]
    fn empty_explicit_compose_falls_back_to_resolution() {
        let env = CiEnvironment {
            compose: Some(String::new()),
            compose_url_template: Some("http://c/manual".into()),
            ..CiEnvironment::default()
        };
        assert_eq!(env.build_request().expect("request").compose_url(), "http://c/manual");
    }

    #[test]
    fn error_kind_classifies_causes() {
        let err = PipelineError {
            stage: Stage::RequestResolved,
            cause: BuckoError::Resolution {
                message: "none".into(),
            },
        };
        assert_eq!(err.kind(), ErrorKind::Resolution);

        let err = PipelineError {
            stage: Stage::RepoPublished,
            cause: BuckoError::MissingKey {
                section: "publish".into(),
                key: "push".into(),
            },
        };
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(
            err.to_string(),
            "stage publish-repo-file failed: missing configuration key \"push\" in section [publish]"
        );

        let err = PipelineError {
            stage: Stage::BuildSubmitted,
            cause: BuckoError::remote("koji", "task failed"),
        };
        assert_eq!(err.kind(), ErrorKind::Collaborator);
    }

    #[test]
    fn error_message_names_cause_once() {
        let err = PipelineError {
            stage: Stage::RequestResolved,
            cause: BuckoError::Resolution {
                message: "Please set the CI_MESSAGE env var or use --compose arg".into(),
            },
        };
        assert!(std::error::Error::source(&err).is_none());
        assert_eq!(err.to_string().matches("CI_MESSAGE").count(), 1);
        assert!(err.to_string().starts_with("stage resolve-request failed: "));
    }
}
