//! Sectioned key/value configuration.
//!
//! The configuration file is TOML whose top-level tables are sections and
//! whose scalar entries are keys:
//!
//! ```toml
//! [publish]
//! push = "builder@web.example.com:/var/www/html/bucko"
//! http = "http://web.example.com/bucko"
//!
//! [koji]
//! target = "%(branch)s-containers-candidate"
//! ```
//!
//! Every value is kept as a string. Values may reference other keys of the
//! same section, or caller-supplied variables, through `%(name)s`
//! placeholders expanded by [`Config::interpolated_section`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::constants;
use crate::error::{BuckoError, Result};
use crate::template;

/// Keys of a single configuration section.
pub type Section = BTreeMap<String, String>;

/// Parsed configuration: section name to key/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    sections: BTreeMap<String, Section>,
}

impl Config {
    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`BuckoError::Config`] if the text is not TOML, if a top-level
    /// entry is not a table, or if a section holds a nested array or table.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(text).map_err(|e| BuckoError::Config {
            message: e.to_string(),
        })?;

        let mut sections = BTreeMap::new();
        for (name, value) in table {
            let toml::Value::Table(entries) = value else {
                return Err(BuckoError::Config {
                    message: format!("top-level key \"{name}\" is not a section"),
                });
            };
            let mut section = Section::new();
            for (key, value) in entries {
                let rendered = scalar_to_string(&value).ok_or_else(|| BuckoError::Config {
                    message: format!("[{name}] {key} must be a scalar value"),
                })?;
                let _ = section.insert(key, rendered);
            }
            let _ = sections.insert(name, section);
        }

        Ok(Self { sections })
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`BuckoError::Io`] if the file cannot be read and
    /// [`BuckoError::Config`] if it cannot be parsed.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "loading configuration");
        let text = std::fs::read_to_string(path).map_err(|e| BuckoError::io(path, e))?;
        Self::from_toml_str(&text).map_err(|e| match e {
            BuckoError::Config { message } => BuckoError::Config {
                message: format!("{}: {message}", path.display()),
            },
            other => other,
        })
    }

    /// Returns a required section.
    ///
    /// # Errors
    ///
    /// Returns [`BuckoError::MissingSection`] if the section is absent.
    pub fn section(&self, name: &str) -> Result<&Section> {
        self.sections
            .get(name)
            .ok_or_else(|| BuckoError::MissingSection {
                section: name.to_string(),
            })
    }

    /// Looks up a required key.
    ///
    /// # Errors
    ///
    /// Returns [`BuckoError::MissingSection`] or [`BuckoError::MissingKey`]
    /// naming what was absent.
    pub fn lookup(&self, section: &str, key: &str) -> Result<&str> {
        self.section(section)?
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| BuckoError::MissingKey {
                section: section.to_string(),
                key: key.to_string(),
            })
    }

    /// Looks up an optional key; an absent section or key yields `None`.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|s| s.get(key))
            .map(String::as_str)
    }

    /// Returns a required section with every `%(name)s` placeholder expanded.
    ///
    /// Placeholders resolve against the section's own raw values and `vars`;
    /// `vars` take precedence on a name clash. Expansion is a single pass.
    ///
    /// # Errors
    ///
    /// Returns [`BuckoError::MissingSection`] if the section is absent and
    /// [`BuckoError::Template`] if a value names an unknown placeholder.
    pub fn interpolated_section(
        &self,
        name: &str,
        vars: &BTreeMap<&str, String>,
    ) -> Result<Section> {
        let raw = self.section(name)?;
        let mut fields: BTreeMap<&str, String> = raw
            .iter()
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();
        for (k, v) in vars {
            let _ = fields.insert(*k, v.clone());
        }

        raw.iter()
            .map(|(key, value)| -> Result<(String, String)> {
                Ok((key.clone(), template::expand(value, &fields)?))
            })
            .collect()
    }

    /// Inserts or replaces a value, creating the section as needed.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        let _ = self
            .sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }
}

fn scalar_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Datetime(d) => Some(d.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => None,
    }
}

/// Source of a [`Config`], invoked once per build.
pub trait ConfigLoader {
    /// Produces the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be obtained.
    fn load(&self) -> Result<Config>;
}

impl ConfigLoader for Config {
    fn load(&self) -> Result<Config> {
        Ok(self.clone())
    }
}

/// Configuration read from a file on disk.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    /// Uses an explicit configuration path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Finds the configuration file.
    ///
    /// An explicit path always wins. Otherwise the per-user file under
    /// `$HOME` is preferred over the system-wide file.
    ///
    /// # Errors
    ///
    /// Returns [`BuckoError::Config`] if no explicit path is given and none
    /// of the default locations exist.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self::new(path));
        }
        let candidates = constants::config_search_path();
        candidates
            .iter()
            .find(|p| p.is_file())
            .map(Self::new)
            .ok_or_else(|| BuckoError::Config {
                message: format!(
                    "no configuration file found (searched {})",
                    candidates
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            })
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigLoader for ConfigFile {
    fn load(&self) -> Result<Config> {
        Config::load(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[keys]
rhceph = "http://keys.example.com/RPM-GPG-KEY-redhat-release"

["ceph-3.0-rhel-7-base"]
url = "http://pulp.example.com/rhel-7-server-rpms"
gpgkey = "file:///etc/pki/rpm-gpg/RPM-GPG-KEY-redhat-release"

[koji]
hub = "https://koji.example.com/kojihub"
target = "%(branch)s-containers-candidate"
scm = "git://pkgs.example.com/containers/rhceph"
timeout = 3600
"#;

    #[test]
    fn parse_sections_and_keys() {
        let config = Config::from_toml_str(SAMPLE).expect("should parse");
        assert_eq!(
            config.lookup("ceph-3.0-rhel-7-base", "url").expect("url"),
            "http://pulp.example.com/rhel-7-server-rpms"
        );
        assert!(config.section("keys").is_ok());
    }

    #[test]
    fn parse_renders_scalars_as_strings() {
        let config = Config::from_toml_str(SAMPLE).expect("should parse");
        assert_eq!(config.get("koji", "timeout"), Some("3600"));
    }

    #[test]
    fn parse_rejects_top_level_scalar() {
        let err = Config::from_toml_str("url = \"http://x\"").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn parse_rejects_nested_array() {
        assert!(Config::from_toml_str("[keys]\nlist = [1, 2]").is_err());
    }

    #[test]
    fn lookup_missing_section_names_section() {
        let config = Config::from_toml_str(SAMPLE).expect("should parse");
        let err = config.lookup("registry", "url").unwrap_err();
        assert!(matches!(err, BuckoError::MissingSection { ref section } if section == "registry"));
    }

    #[test]
    fn lookup_missing_key_names_key() {
        let config = Config::from_toml_str(SAMPLE).expect("should parse");
        let err = config.lookup("koji", "web").unwrap_err();
        assert!(
            matches!(err, BuckoError::MissingKey { ref section, ref key } if section == "koji" && key == "web")
        );
    }

    #[test]
    fn get_optional_key_tolerates_absence() {
        let config = Config::from_toml_str(SAMPLE).expect("should parse");
        assert_eq!(config.get("ceph-3.0-rhel-7-base", "extras"), None);
        assert_eq!(config.get("nope", "extras"), None);
    }

    #[test]
    fn interpolated_section_expands_vars() {
        let config = Config::from_toml_str(SAMPLE).expect("should parse");
        let vars = BTreeMap::from([("branch", "ceph-3.0-rhel-7".to_string())]);
        let koji = config.interpolated_section("koji", &vars).expect("interpolate");
        assert_eq!(koji["target"], "ceph-3.0-rhel-7-containers-candidate");
        assert_eq!(koji["hub"], "https://koji.example.com/kojihub");
    }

    #[test]
    fn interpolated_section_references_sibling_keys() {
        let mut config = Config::default();
        config.set("koji", "hub", "https://koji.example.com/kojihub");
        config.set("koji", "web", "%(hub)s/../koji");
        let koji = config
            .interpolated_section("koji", &BTreeMap::new())
            .expect("interpolate");
        assert_eq!(koji["web"], "https://koji.example.com/kojihub/../koji");
    }

    #[test]
    fn interpolated_section_unknown_placeholder_is_error() {
        let config = Config::from_toml_str(SAMPLE).expect("should parse");
        assert!(config.interpolated_section("koji", &BTreeMap::new()).is_err());
    }

    #[test]
    fn config_file_loads_from_disk() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let path = dir.path().join("bucko.toml");
        std::fs::write(&path, SAMPLE).expect("failed to write");
        let config = ConfigFile::discover(Some(&path))
            .expect("discover")
            .load()
            .expect("load");
        assert_eq!(config.get("koji", "hub"), Some("https://koji.example.com/kojihub"));
    }

    #[test]
    fn config_file_missing_path_is_io_error() {
        let err = ConfigFile::new("/nonexistent/bucko.toml").load().unwrap_err();
        assert!(matches!(err, BuckoError::Io { .. }));
    }
}
