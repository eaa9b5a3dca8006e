//! Command-line definition and dispatch.

use std::path::PathBuf;

use bucko_common::config::{Config, ConfigFile, ConfigLoader};
use bucko_common::constants::{CI_MESSAGE_ENV, COMPOSE_URL_ENV, CONFIG_ENV, WORKSPACE_ENV};
use bucko_common::error::Result;
use bucko_core::{CiEnvironment, Orchestrator, SystemCollaborators};
use clap::Parser;

/// bucko: scratch container builds from composes.
#[derive(Parser, Debug)]
#[command(name = "bucko", version, about, long_about = None)]
pub struct Cli {
    /// Compose URL to build from. Overrides the CI message.
    #[arg(long, value_name = "URL")]
    pub compose: Option<String>,

    /// Configuration file (defaults to ~/.bucko.toml, then /etc/bucko.toml).
    #[arg(long, env = CONFIG_ENV, value_name = "PATH")]
    pub config: Option<String>,

    /// CI event payload.
    #[arg(long, env = CI_MESSAGE_ENV, hide = true, hide_env_values = true)]
    pub ci_message: Option<String>,

    /// Fallback compose URL, may contain %(branch)s, %(major)s, %(distro)s.
    #[arg(long, env = COMPOSE_URL_ENV, hide = true)]
    pub compose_url_template: Option<String>,

    /// CI workspace receiving osbs.props.
    #[arg(long, env = WORKSPACE_ENV, hide = true)]
    pub workspace: Option<String>,
}

impl Cli {
    /// Captures the run inputs. Empty values count as unset.
    pub fn environment(&self) -> CiEnvironment {
        CiEnvironment {
            compose: non_empty(self.compose.as_deref()),
            ci_message: non_empty(self.ci_message.as_deref()),
            compose_url_template: non_empty(self.compose_url_template.as_deref()),
            workspace: non_empty(self.workspace.as_deref()).map(PathBuf::from),
        }
    }

    /// Returns the explicit configuration path, if a non-empty one was given.
    pub fn config_path(&self) -> Option<PathBuf> {
        non_empty(self.config.as_deref()).map(PathBuf::from)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Locates the configuration file only when the pipeline asks for it, so a
/// missing file is reported as a failed `load-config` stage.
#[derive(Debug)]
struct DiscoveredConfig {
    explicit: Option<PathBuf>,
}

impl ConfigLoader for DiscoveredConfig {
    fn load(&self) -> Result<Config> {
        let file = ConfigFile::discover(self.explicit.as_deref())?;
        tracing::info!(path = %file.path().display(), "loading configuration");
        file.load()
    }
}

/// Runs one scratch build.
///
/// # Errors
///
/// Returns the failing pipeline stage and its cause.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let env = cli.environment();
    let loader = DiscoveredConfig {
        explicit: cli.config_path(),
    };
    let report = Orchestrator::new(SystemCollaborators).run(&env, &loader)?;
    tracing::info!(
        task = %report.result.task_id,
        metadata = %report.metadata_url,
        "scratch build complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_flag_is_parsed() {
        let cli = Cli::try_parse_from(["bucko", "--compose", "http://c/RHCEPH-3.0"])
            .expect("should parse");
        assert_eq!(cli.environment().compose.as_deref(), Some("http://c/RHCEPH-3.0"));
    }

    #[test]
    fn hidden_options_can_be_given_as_flags() {
        let cli = Cli::try_parse_from([
            "bucko",
            "--ci-message",
            r#"{"branch": "ceph-3.0-rhel-7"}"#,
            "--compose-url-template",
            "http://c/%(branch)s",
            "--workspace",
            "/tmp/ws",
        ])
        .expect("should parse");
        let env = cli.environment();
        assert_eq!(env.ci_message.as_deref(), Some(r#"{"branch": "ceph-3.0-rhel-7"}"#));
        assert_eq!(env.compose_url_template.as_deref(), Some("http://c/%(branch)s"));
        assert_eq!(env.workspace, Some(PathBuf::from("/tmp/ws")));
    }

    #[test]
    fn empty_values_count_as_unset() {
        let cli = Cli::try_parse_from([
            "bucko",
            "--compose",
            "",
            "--compose-url-template",
            "",
            "--workspace",
            "",
        ])
        .expect("should parse");
        let env = cli.environment();
        assert_eq!(env.compose, None);
        assert_eq!(env.compose_url_template, None);
        assert_eq!(env.workspace, None);
    }

    #[test]
    fn empty_config_path_falls_back_to_discovery() {
        let cli = Cli::try_parse_from(["bucko", "--config", ""]).expect("should parse");
        assert_eq!(cli.config_path(), None);

        let cli = Cli::try_parse_from(["bucko", "--config", "/etc/bucko/ceph.toml"])
            .expect("should parse");
        assert_eq!(cli.config_path(), Some(PathBuf::from("/etc/bucko/ceph.toml")));
    }

    #[test]
    fn missing_explicit_config_fails_on_load() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let loader = DiscoveredConfig {
            explicit: Some(dir.path().join("absent.toml")),
        };
        assert!(loader.load().is_err());
    }

    #[test]
    fn explicit_config_is_loaded() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let path = dir.path().join("bucko.toml");
        std::fs::write(&path, "[keys]\nrhceph = \"k\"\n").expect("write failed");
        let loader = DiscoveredConfig {
            explicit: Some(path),
        };
        let config = loader.load().expect("should load");
        assert_eq!(config.get("keys", "rhceph"), Some("k"));
    }
}
