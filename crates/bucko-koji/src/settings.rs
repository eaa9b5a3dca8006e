//! Build-system settings from the `[koji]` configuration section.

use std::collections::BTreeMap;

use bucko_common::config::{Config, Section};
use bucko_common::error::{BuckoError, Result};

/// Configuration section holding the build-system settings.
pub const KOJI_SECTION: &str = "koji";

/// Connection and build coordinates for one branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KojiSettings {
    /// XML-RPC hub URL.
    pub hub: String,
    /// Web UI URL.
    pub web: String,
    /// Kerberos service principal name.
    pub krbservice: String,
    /// Source repository of the container recipe.
    pub scm: String,
    /// Build target.
    pub target: String,
}

impl KojiSettings {
    /// Reads the `[koji]` section with `%(branch)s` expanded to `branch`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming a missing section or key, or a
    /// template error for an unknown placeholder.
    pub fn from_config(config: &Config, branch: &str) -> Result<Self> {
        let vars = BTreeMap::from([("branch", branch.to_string())]);
        let section = config.interpolated_section(KOJI_SECTION, &vars)?;
        Ok(Self {
            hub: required(&section, "hub")?,
            web: required(&section, "web")?,
            krbservice: required(&section, "krbservice")?,
            scm: required(&section, "scm")?,
            target: required(&section, "target")?,
        })
    }
}

fn required(section: &Section, key: &str) -> Result<String> {
    section
        .get(key)
        .cloned()
        .ok_or_else(|| BuckoError::MissingKey {
            section: KOJI_SECTION.to_string(),
            key: key.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::from_toml_str(
            r#"
[koji]
hub = "https://koji.example.com/kojihub"
web = "https://koji.example.com/koji"
krbservice = "brewhub"
scm = "git://pkgs.example.com/containers/rhceph#origin/%(branch)s"
target = "%(branch)s-containers-candidate"
"#,
        )
        .expect("should parse")
    }

    #[test]
    fn settings_expand_branch() {
        let settings = KojiSettings::from_config(&config(), "ceph-2-rhel-7").expect("settings");
        assert_eq!(settings.target, "ceph-2-rhel-7-containers-candidate");
        assert_eq!(
            settings.scm,
            "git://pkgs.example.com/containers/rhceph#origin/ceph-2-rhel-7"
        );
        assert_eq!(settings.krbservice, "brewhub");
    }

    #[test]
    fn settings_missing_key_is_named() {
        let mut partial = Config::default();
        partial.set(KOJI_SECTION, "hub", "https://koji.example.com/kojihub");
        let err = KojiSettings::from_config(&partial, "ceph-2-rhel-7").unwrap_err();
        assert!(matches!(err, BuckoError::MissingKey { ref key, .. } if key == "web"));
    }

    #[test]
    fn settings_missing_section_is_error() {
        let err = KojiSettings::from_config(&Config::default(), "b").unwrap_err();
        assert!(matches!(err, BuckoError::MissingSection { .. }));
    }
}
