//! System-wide constants and default paths.

use std::path::PathBuf;

/// Application name used in log output and temporary file prefixes.
pub const APP_NAME: &str = "bucko";

/// Environment variable holding an explicit configuration file path.
pub const CONFIG_ENV: &str = "BUCKO_CONFIG";
/// Environment variable holding the CI event payload (JSON).
pub const CI_MESSAGE_ENV: &str = "CI_MESSAGE";
/// Environment variable holding the fallback compose URL template.
pub const COMPOSE_URL_ENV: &str = "COMPOSE_URL";
/// Environment variable naming the CI workspace directory.
pub const WORKSPACE_ENV: &str = "WORKSPACE";

/// Per-user configuration file name, relative to `$HOME`.
pub const USER_CONFIG_FILE: &str = ".bucko.toml";
/// System-wide configuration file.
pub const SYSTEM_CONFIG_FILE: &str = "/etc/bucko.toml";

/// Returns the default configuration locations in search order.
pub fn config_search_path() -> Vec<PathBuf> {
    let mut paths = Vec::with_capacity(2);
    if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
        paths.push(PathBuf::from(home).join(USER_CONFIG_FILE));
    }
    paths.push(PathBuf::from(SYSTEM_CONFIG_FILE));
    paths
}

/// Suffix of the per-branch base-product section, e.g. `ceph-2-rhel-7-base`.
pub const BASE_SECTION_SUFFIX: &str = "-base";

/// Platform suffix appended to branch names when none is configured.
pub const DEFAULT_PLATFORM: &str = "rhel-7";

/// Metadata key holding the build task identifier.
pub const TASK_KEY: &str = "koji_task";
/// Metadata key holding the single produced repository.
pub const REPOSITORY_KEY: &str = "repository";
/// Metadata key holding the list of produced repositories.
pub const REPOSITORIES_KEY: &str = "repositories";
/// Metadata key holding the compose URL.
pub const COMPOSE_URL_KEY: &str = "compose_url";
/// Metadata key holding the compose identifier.
pub const COMPOSE_ID_KEY: &str = "compose_id";

/// Suffix of the published JSON metadata file, after the compose id.
pub const METADATA_FILE_SUFFIX: &str = "-osbs.json";
/// Properties file written into the CI workspace.
pub const PROPS_FILE_NAME: &str = "osbs.props";
