//! Mapping of compose release metadata to a dist-git branch name.

use bucko_common::config::Config;
use bucko_common::constants::DEFAULT_PLATFORM;

/// Optional configuration section overriding branch naming.
pub const BRANCH_SECTION: &str = "branch";

/// Derives `<family>-<version>-<platform>` branch names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchResolver {
    platform: String,
}

impl Default for BranchResolver {
    fn default() -> Self {
        Self::new(DEFAULT_PLATFORM)
    }
}

impl BranchResolver {
    /// Creates a resolver appending the given platform suffix.
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
        }
    }

    /// Reads `[branch] platform`, defaulting to `rhel-7`.
    pub fn from_config(config: &Config) -> Self {
        config
            .get(BRANCH_SECTION, "platform")
            .map_or_else(Self::default, Self::new)
    }

    /// Returns the platform suffix.
    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Returns the branch for a release family and version.
    ///
    /// `RHCEPH` is known as `ceph` in dist-git, and every ceph 2.y release
    /// builds from the single `ceph-2` branch.
    pub fn resolve(&self, release_family: &str, release_version: &str) -> String {
        let mut family = release_family.to_lowercase();
        if family == "rhceph" {
            family = "ceph".to_string();
        }
        let version = if family == "ceph" && release_version.starts_with('2') {
            "2"
        } else {
            release_version
        };
        format!("{family}-{version}-{}", self.platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rhceph_2_collapses_version() {
        assert_eq!(BranchResolver::default().resolve("rhceph", "2.5"), "ceph-2-rhel-7");
        assert_eq!(BranchResolver::default().resolve("RHCEPH", "2"), "ceph-2-rhel-7");
    }

    #[test]
    fn rhceph_later_versions_are_kept() {
        assert_eq!(BranchResolver::default().resolve("rhceph", "4.0"), "ceph-4.0-rhel-7");
        assert_eq!(BranchResolver::default().resolve("RHCEPH", "3.0"), "ceph-3.0-rhel-7");
    }

    #[test]
    fn other_families_are_lowercased_and_kept() {
        assert_eq!(
            BranchResolver::default().resolve("RHOSP", "2.1"),
            "rhosp-2.1-rhel-7"
        );
    }

    #[test]
    fn platform_comes_from_config() {
        let mut config = Config::default();
        assert_eq!(BranchResolver::from_config(&config).platform(), "rhel-7");
        config.set(BRANCH_SECTION, "platform", "rhel-8");
        assert_eq!(
            BranchResolver::from_config(&config).resolve("rhceph", "5.0"),
            "ceph-5.0-rhel-8"
        );
    }
}
