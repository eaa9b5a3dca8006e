//! Read-only view over a compose's `composeinfo.json` metadata.

use std::collections::BTreeMap;

use bucko_common::error::Result;
use serde::Deserialize;

/// Release, identity, and repository layout of one compose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeInfo {
    /// Compose identifier, e.g. `RHCEPH-3.0-RHEL-7-20180101.0`.
    pub compose_id: String,
    /// Release family short name, e.g. `RHCEPH`.
    pub release_short: String,
    /// Release version, e.g. `3.0`.
    pub release_version: String,
    /// Variants, sorted by their `composeinfo.json` key.
    pub variants: Vec<Variant>,
}

/// One compose variant and its per-architecture repository paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    /// Variant UID, e.g. `MON`.
    pub uid: String,
    /// Architecture to repository path relative to the compose root.
    pub repositories: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct Document {
    payload: Payload,
}

#[derive(Deserialize)]
struct Payload {
    compose: ComposeSection,
    release: ReleaseSection,
    #[serde(default)]
    variants: BTreeMap<String, VariantSection>,
}

#[derive(Deserialize)]
struct ComposeSection {
    id: String,
}

#[derive(Deserialize)]
struct ReleaseSection {
    short: String,
    version: String,
}

#[derive(Deserialize)]
struct VariantSection {
    uid: String,
    #[serde(default)]
    paths: PathsSection,
}

#[derive(Deserialize, Default)]
struct PathsSection {
    #[serde(default)]
    repository: BTreeMap<String, String>,
}

impl ComposeInfo {
    /// Parses a productmd `composeinfo.json` document.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if required fields are missing.
    pub fn from_json(text: &str) -> Result<Self> {
        let doc: Document = serde_json::from_str(text)?;
        let payload = doc.payload;
        Ok(Self {
            compose_id: payload.compose.id,
            release_short: payload.release.short,
            release_version: payload.release.version,
            variants: payload
                .variants
                .into_values()
                .map(|v| Variant {
                    uid: v.uid,
                    repositories: v.paths.repository,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
pub(crate) const SAMPLE_COMPOSEINFO: &str = r#"{
  "header": {"type": "productmd.composeinfo", "version": "1.2"},
  "payload": {
    "compose": {"id": "RHCEPH-3.0-RHEL-7-20180101.0", "type": "production", "date": "20180101", "respin": 0},
    "release": {"name": "Red Hat Ceph Storage", "short": "RHCEPH", "version": "3.0", "type": "ga"},
    "variants": {
      "Tools": {"id": "Tools", "uid": "Tools", "type": "variant", "arches": ["x86_64"],
                "paths": {"repository": {"x86_64": "Tools/x86_64/os"}}},
      "MON": {"id": "MON", "uid": "MON", "type": "variant", "arches": ["x86_64", "ppc64le"],
              "paths": {"repository": {"x86_64": "MON/x86_64/os", "ppc64le": "MON/ppc64le/os"}}},
      "Docs": {"id": "Docs", "uid": "Docs", "type": "variant", "arches": ["src"]}
    }
  }
}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_release_and_compose_id() {
        let info = ComposeInfo::from_json(SAMPLE_COMPOSEINFO).expect("should parse");
        assert_eq!(info.compose_id, "RHCEPH-3.0-RHEL-7-20180101.0");
        assert_eq!(info.release_short, "RHCEPH");
        assert_eq!(info.release_version, "3.0");
    }

    #[test]
    fn parse_variant_repositories() {
        let info = ComposeInfo::from_json(SAMPLE_COMPOSEINFO).expect("should parse");
        assert_eq!(info.variants.len(), 3);
        let mon = info.variants.iter().find(|v| v.uid == "MON").expect("MON");
        assert_eq!(mon.repositories["ppc64le"], "MON/ppc64le/os");
        let docs = info.variants.iter().find(|v| v.uid == "Docs").expect("Docs");
        assert!(docs.repositories.is_empty());
    }

    #[test]
    fn parse_missing_release_returns_error() {
        let text = r#"{"payload": {"compose": {"id": "X-1"}}}"#;
        assert!(ComposeInfo::from_json(text).is_err());
    }
}
