//! Scratch container builds driven through the `koji` command-line client.

use std::path::PathBuf;
use std::process::{Command, Output};

use bucko_common::error::{BuckoError, Result};
use bucko_common::types::TaskId;
use serde::Deserialize;

use crate::settings::KojiSettings;

/// A scratch container build to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchBuild {
    /// Source repository of the container recipe.
    pub scm: String,
    /// Build target.
    pub target: String,
    /// Branch of `scm` to build from.
    pub branch: String,
    /// Package repository descriptors made available to the build.
    pub repo_urls: Vec<String>,
    /// Build NVR of the parent image, when one is pinned.
    pub parent_build: Option<String>,
}

/// Submits container builds to a remote build system.
pub trait ContainerBuilder {
    /// Submits a scratch build and returns its task identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the build cannot be submitted.
    fn build_container(&self, build: &ScratchBuild) -> Result<TaskId>;

    /// Blocks until the task reaches a terminal state.
    ///
    /// # Errors
    ///
    /// Returns an error if the task fails or cannot be watched.
    fn watch_task(&self, task: TaskId) -> Result<()>;

    /// Returns the repositories produced by a finished task, in build order.
    ///
    /// # Errors
    ///
    /// Returns an error if the task result cannot be retrieved.
    fn repositories(&self, task: TaskId) -> Result<Vec<String>>;
}

/// [`ContainerBuilder`] backed by the `koji` CLI.
#[derive(Debug, Clone)]
pub struct KojiCli {
    binary: PathBuf,
    hub: String,
    web: String,
    krbservice: String,
}

impl KojiCli {
    /// Locates the `koji` binary and binds it to a hub.
    ///
    /// # Errors
    ///
    /// Returns an error if `koji` is not found in `PATH`.
    pub fn new(settings: &KojiSettings) -> Result<Self> {
        let binary = which::which("koji")
            .map_err(|_| BuckoError::remote("koji", "koji client not found in PATH"))?;
        Ok(Self::with_binary(binary, settings))
    }

    /// Binds an explicit `koji` binary to a hub.
    pub fn with_binary(binary: impl Into<PathBuf>, settings: &KojiSettings) -> Self {
        Self {
            binary: binary.into(),
            hub: settings.hub.clone(),
            web: settings.web.clone(),
            krbservice: settings.krbservice.clone(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        let _ = cmd
            .args(["--server", self.hub.as_str()])
            .args(["--weburl", self.web.as_str()])
            .args(["--authtype", "kerberos"])
            .args(["--krbservice", self.krbservice.as_str()]);
        cmd
    }

    fn run(&self, args: &[String]) -> Result<Output> {
        tracing::debug!(binary = %self.binary.display(), args = ?args, "running koji");
        let output = self
            .command()
            .args(args)
            .output()
            .map_err(|e| BuckoError::io(&self.binary, e))?;
        if !output.status.success() {
            return Err(BuckoError::remote(
                "koji",
                format!(
                    "`koji {}` exited with {}: {}",
                    args.first().map_or("", String::as_str),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        Ok(output)
    }
}

/// Builds the `container-build` argument list for a scratch build.
pub fn container_build_args(build: &ScratchBuild) -> Vec<String> {
    let mut args = vec![
        "container-build".to_string(),
        build.target.clone(),
        build.scm.clone(),
        "--scratch".to_string(),
        "--nowait".to_string(),
        "--git-branch".to_string(),
        build.branch.clone(),
    ];
    for url in &build.repo_urls {
        args.push("--repo-url".to_string());
        args.push(url.clone());
    }
    if let Some(parent) = &build.parent_build {
        args.push("--koji-parent-build".to_string());
        args.push(parent.clone());
    }
    args
}

/// Extracts the task number from `container-build --nowait` output.
///
/// # Errors
///
/// Returns an error if no `Created task:` line is present.
pub fn parse_task_id(stdout: &str) -> Result<TaskId> {
    stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix("Created task:"))
        .and_then(|id| id.trim().parse::<u64>().ok())
        .map(TaskId::new)
        .ok_or_else(|| {
            BuckoError::remote("koji", format!("no task id in output: {}", stdout.trim()))
        })
}

#[derive(Deserialize)]
struct TaskResult {
    #[serde(default)]
    repositories: Vec<String>,
}

/// Extracts the repository list from a `getTaskResult` JSON document.
///
/// # Errors
///
/// Returns a serialization error if the document is not a task result.
pub fn parse_repositories(json: &str) -> Result<Vec<String>> {
    let result: TaskResult = serde_json::from_str(json)?;
    Ok(result.repositories)
}

impl ContainerBuilder for KojiCli {
    fn build_container(&self, build: &ScratchBuild) -> Result<TaskId> {
        let output = self.run(&container_build_args(build))?;
        let task = parse_task_id(&String::from_utf8_lossy(&output.stdout))?;
        let task_url = format!("{}/taskinfo?taskID={task}", self.web.trim_end_matches('/'));
        tracing::info!(task = %task, url = %task_url, "created build task");
        Ok(task)
    }

    fn watch_task(&self, task: TaskId) -> Result<()> {
        let status = self
            .command()
            .args(["watch-task".to_string(), task.to_string()])
            .status()
            .map_err(|e| BuckoError::io(&self.binary, e))?;
        if status.success() {
            Ok(())
        } else {
            Err(BuckoError::remote(
                "koji",
                format!("task {task} did not complete successfully ({status})"),
            ))
        }
    }

    fn repositories(&self, task: TaskId) -> Result<Vec<String>> {
        let args = [
            "call".to_string(),
            "--json-output".to_string(),
            "getTaskResult".to_string(),
            task.to_string(),
        ];
        let output = self.run(&args)?;
        parse_repositories(&String::from_utf8_lossy(&output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(parent: Option<&str>) -> ScratchBuild {
        ScratchBuild {
            scm: "git://pkgs.example.com/containers/rhceph#origin/ceph-3.0-rhel-7".into(),
            target: "ceph-3.0-rhel-7-containers-candidate".into(),
            branch: "ceph-3.0-rhel-7".into(),
            repo_urls: vec!["http://w/b/1/c.repo".into()],
            parent_build: parent.map(str::to_string),
        }
    }

    #[test]
    fn container_build_args_are_scratch_and_nowait() {
        let args = container_build_args(&build(None));
        assert_eq!(
            args,
            vec![
                "container-build",
                "ceph-3.0-rhel-7-containers-candidate",
                "git://pkgs.example.com/containers/rhceph#origin/ceph-3.0-rhel-7",
                "--scratch",
                "--nowait",
                "--git-branch",
                "ceph-3.0-rhel-7",
                "--repo-url",
                "http://w/b/1/c.repo",
            ]
        );
    }

    #[test]
    fn container_build_args_include_parent_build() {
        let args = container_build_args(&build(Some("rhel-server-container-7.5-245")));
        assert_eq!(
            &args[args.len() - 2..],
            ["--koji-parent-build", "rhel-server-container-7.5-245"]
        );
    }

    #[test]
    fn parse_task_id_from_nowait_output() {
        let stdout = "Created task: 15566913\nTask info: https://koji.example.com/koji/taskinfo?taskID=15566913\n";
        assert_eq!(parse_task_id(stdout).expect("task id"), TaskId::new(15_566_913));
    }

    #[test]
    fn parse_task_id_missing_returns_error() {
        assert!(parse_task_id("GenericError: target not found\n").is_err());
    }

    #[test]
    fn parse_repositories_preserves_order() {
        let json = r#"{"koji_builds": [], "repositories": ["reg:8888/rhceph:b", "reg:8888/rhceph:a"]}"#;
        assert_eq!(
            parse_repositories(json).expect("repositories"),
            vec!["reg:8888/rhceph:b", "reg:8888/rhceph:a"]
        );
    }

    #[test]
    fn parse_repositories_absent_is_empty() {
        assert!(parse_repositories("{}").expect("repositories").is_empty());
    }
}
