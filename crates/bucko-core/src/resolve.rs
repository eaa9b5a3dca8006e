//! Compose URL resolution from CI event metadata.
//!
//! Two inputs may name the compose to build: the CI event payload and a
//! fallback URL template. They are consulted through an ordered list of
//! rules, first match wins:
//!
//! 1. the payload's `compose_url`, verbatim (product-build-done messages);
//! 2. the payload's `branch` (`<name>-<version>-<distro>`), interpolated into
//!    the template's `%(branch)s`, `%(major)s`, and `%(distro)s` fields
//!    (dist-git messages);
//! 3. the template itself, unchanged (manual runs).
//!
//! An empty result is normalized to `None`.

use std::collections::BTreeMap;

use bucko_common::error::{BuckoError, Result};
use bucko_common::template::Template;
use bucko_common::types::BuildRequest;
use serde_json::{Map, Value};

/// A parsed CI event payload.
pub type Message = Map<String, Value>;

/// Payload key of product-build-done messages.
pub const COMPOSE_URL_FIELD: &str = "compose_url";
/// Payload key of dist-git messages.
pub const BRANCH_FIELD: &str = "branch";

/// Fields a fallback template may reference.
pub const TEMPLATE_FIELDS: [&str; 3] = ["branch", "major", "distro"];

/// Parses a raw CI event payload.
///
/// Anything that is not a JSON object yields `None`, which sends resolution
/// to the fallback template.
pub fn parse_message(raw: &str) -> Option<Message> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Some(map),
        Ok(other) => {
            tracing::info!(message = %other, "CI message is not a JSON object");
            None
        }
        Err(e) => {
            tracing::info!(error = %e, "CI message is not valid JSON");
            None
        }
    }
}

/// 2^63: truncated versions must lie in `[-2^63, 2^63)` to fit an `i64`.
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// Fields extracted from a dist-git branch name such as `ceph-3.0-rhel-7`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchFields {
    /// The branch name, unchanged.
    pub branch: String,
    /// Integer part of the version segment.
    pub major: i64,
    /// Distro segment, uppercased.
    pub distro: String,
}

impl BranchFields {
    /// Splits `<name>-<version>-<distro>` on the first two dashes.
    ///
    /// # Errors
    ///
    /// Returns [`BuckoError::Resolution`] if there are fewer than three
    /// segments or the version is not a finite number.
    pub fn parse(branch: &str) -> Result<Self> {
        let mut parts = branch.splitn(3, '-');
        let (Some(_name), Some(version), Some(distro)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(resolution(format!(
                "branch {branch:?} is not of the form <name>-<version>-<distro>"
            )));
        };
        let value: f64 = version
            .parse()
            .ok()
            .filter(|v: &f64| v.is_finite())
            .ok_or_else(|| {
                resolution(format!("branch {branch:?} has non-numeric version {version:?}"))
            })?;
        let truncated = value.trunc();
        if !(-I64_LIMIT..I64_LIMIT).contains(&truncated) {
            return Err(resolution(format!(
                "branch {branch:?} has out-of-range version {version:?}"
            )));
        }
        #[allow(clippy::cast_possible_truncation)]
        let major = truncated as i64;

        Ok(Self {
            branch: branch.to_string(),
            major,
            distro: distro.to_uppercase(),
        })
    }

    fn values(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("branch", self.branch.clone()),
            ("major", self.major.to_string()),
            ("distro", self.distro.clone()),
        ])
    }
}

/// Interpolates branch fields into a fallback template.
///
/// The template must reference at least one of [`TEMPLATE_FIELDS`] and no
/// other placeholder.
///
/// # Errors
///
/// Returns [`BuckoError::Resolution`] for a malformed template, one without
/// placeholders, or one naming an unknown placeholder.
pub fn interpolate(template: &str, fields: &BranchFields) -> Result<String> {
    let parsed = Template::parse(template).map_err(|e| resolution(e.to_string()))?;
    if parsed.fields().is_empty() {
        return Err(resolution(format!(
            "compose URL template {template:?} has no %(branch)s, %(major)s or %(distro)s placeholder"
        )));
    }
    parsed
        .render(&fields.values())
        .map_err(|e| resolution(e.to_string()))
}

/// Outcome of a single resolution rule.
#[derive(Debug)]
enum Outcome {
    /// The rule matched and produced this (possibly empty) result.
    Resolved(Option<String>),
    /// The rule does not apply; try the next one.
    Declined,
}

/// Inputs shared by all rules.
#[derive(Debug, Clone, Copy)]
struct Inputs<'a> {
    message: Option<&'a Message>,
    template: Option<&'a str>,
}

type Rule = fn(Inputs<'_>) -> Result<Outcome>;

/// Rules in precedence order.
const RULES: [(&str, Rule); 3] = [
    (COMPOSE_URL_FIELD, from_compose_url),
    (BRANCH_FIELD, from_branch),
    ("fallback", from_template),
];

fn string_field<'a>(message: &'a Message, key: &str) -> Result<Option<&'a str>> {
    match message.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(resolution(format!(
            "CI message field {key:?} must be a string, got {other}"
        ))),
    }
}

fn from_compose_url(inputs: Inputs<'_>) -> Result<Outcome> {
    let Some(message) = inputs.message else {
        return Ok(Outcome::Declined);
    };
    Ok(string_field(message, COMPOSE_URL_FIELD)?
        .map_or(Outcome::Declined, |url| Outcome::Resolved(Some(url.to_string()))))
}

fn from_branch(inputs: Inputs<'_>) -> Result<Outcome> {
    let Some(branch) = inputs
        .message
        .map(|m| string_field(m, BRANCH_FIELD))
        .transpose()?
        .flatten()
    else {
        return Ok(Outcome::Declined);
    };
    let template = inputs.template.ok_or_else(|| {
        resolution(format!(
            "CI message names branch {branch:?} but no compose URL template is set"
        ))
    })?;
    let result = interpolate(template, &BranchFields::parse(branch)?)?;
    tracing::info!(template = %template, result = %result, "interpolated compose URL template");
    Ok(Outcome::Resolved(Some(result)))
}

#[allow(clippy::unnecessary_wraps)]
fn from_template(inputs: Inputs<'_>) -> Result<Outcome> {
    Ok(Outcome::Resolved(inputs.template.map(str::to_string)))
}

/// Resolves a compose URL from an optional payload and fallback template.
///
/// Returns `Ok(None)` when nothing yields a non-empty URL.
///
/// # Errors
///
/// Returns [`BuckoError::Resolution`] when the payload names a branch that
/// cannot be turned into a URL (no template, malformed branch, or a template
/// without valid placeholders), or when a payload field has the wrong type.
pub fn resolve(message: Option<&Message>, template: Option<&str>) -> Result<Option<String>> {
    let inputs = Inputs {
        message,
        template: template.filter(|t| !t.is_empty()),
    };
    for (name, rule) in RULES {
        match rule(inputs)? {
            Outcome::Resolved(url) => {
                tracing::debug!(rule = name, url = ?url, "compose URL rule matched");
                return Ok(url.filter(|u| !u.is_empty()));
            }
            Outcome::Declined if inputs.message.is_some() => {
                tracing::info!(rule = name, "CI message lacks key, falling through");
            }
            Outcome::Declined => {}
        }
    }
    Ok(None)
}

/// Resolves a [`BuildRequest`] from raw CI inputs.
///
/// The branch of a dist-git payload is carried on the request; the build
/// branch itself is always derived from the compose.
///
/// # Errors
///
/// Returns [`BuckoError::Resolution`] if resolution fails or yields no URL.
pub fn resolve_request(raw_message: Option<&str>, template: Option<&str>) -> Result<BuildRequest> {
    let message = raw_message.and_then(|raw| {
        tracing::info!(message = %raw, "parsing CI message");
        parse_message(raw)
    });
    let url = resolve(message.as_ref(), template)?.ok_or_else(|| {
        resolution("Please set the CI_MESSAGE env var or use --compose arg".to_string())
    })?;

    let request = BuildRequest::new(url);
    let branch = message
        .as_ref()
        .filter(|m| !m.contains_key(COMPOSE_URL_FIELD))
        .and_then(|m| m.get(BRANCH_FIELD))
        .and_then(Value::as_str);
    Ok(match branch {
        Some(branch) => request.with_branch(branch),
        None => request,
    })
}

fn resolution(message: String) -> BuckoError {
    BuckoError::Resolution { message }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tracing_test::traced_test;

    use super::*;

    const TEMPLATE: &str = "http://x/%(branch)s/%(major)s/%(distro)s";

    fn message(value: &Value) -> Message {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn compose_url_wins_over_branch_and_template() {
        let msg = message(&json!({"compose_url": "http://c/1", "branch": "ceph-3.0-rhel-7"}));
        let url = resolve(Some(&msg), Some(TEMPLATE)).expect("resolve");
        assert_eq!(url.as_deref(), Some("http://c/1"));
    }

    #[test]
    fn compose_url_wins_even_without_template() {
        let msg = message(&json!({"compose_url": "http://c/1"}));
        assert_eq!(resolve(Some(&msg), None).expect("resolve").as_deref(), Some("http://c/1"));
    }

    #[test]
    fn branch_interpolates_all_fields() {
        let msg = message(&json!({"branch": "ceph-3.0-rhel-7"}));
        let url = resolve(Some(&msg), Some(TEMPLATE)).expect("resolve");
        assert_eq!(url.as_deref(), Some("http://x/ceph-3.0-rhel-7/3/RHEL-7"));
    }

    #[test]
    fn branch_major_truncates_version() {
        let msg = message(&json!({"branch": "ceph-2-rhel-7"}));
        let url = resolve(Some(&msg), Some("http://x/latest-RHCEPH-%(major)s")).expect("resolve");
        assert_eq!(url.as_deref(), Some("http://x/latest-RHCEPH-2"));

        let fields = BranchFields::parse("ceph-3.9-rhel-7").expect("parse");
        assert_eq!(fields.major, 3);
    }

    #[test]
    fn branch_distro_keeps_remaining_dashes() {
        let fields = BranchFields::parse("ceph-4.1-rhel-8-beta").expect("parse");
        assert_eq!(fields.distro, "RHEL-8-BETA");
        assert_eq!(fields.branch, "ceph-4.1-rhel-8-beta");
    }

    #[test]
    fn branch_with_too_few_segments_is_error() {
        let msg = message(&json!({"branch": "ceph-3.0"}));
        let err = resolve(Some(&msg), Some(TEMPLATE)).unwrap_err();
        assert!(matches!(err, BuckoError::Resolution { .. }));
    }

    #[test]
    fn branch_with_non_numeric_version_is_error() {
        assert!(BranchFields::parse("ceph-latest-rhel-7").is_err());
        assert!(BranchFields::parse("ceph-inf-rhel-7").is_err());
    }

    #[test]
    fn branch_without_template_is_error() {
        let msg = message(&json!({"branch": "ceph-3.0-rhel-7"}));
        assert!(resolve(Some(&msg), None).is_err());
        assert!(resolve(Some(&msg), Some("")).is_err());
    }

    #[test]
    fn branch_with_placeholder_free_template_is_error() {
        let msg = message(&json!({"branch": "ceph-3.0-rhel-7"}));
        assert!(resolve(Some(&msg), Some("http://x/static")).is_err());
    }

    #[test]
    fn branch_with_unknown_placeholder_is_error() {
        let msg = message(&json!({"branch": "ceph-3.0-rhel-7"}));
        let err = resolve(Some(&msg), Some("http://x/%(release)s")).unwrap_err();
        assert!(err.to_string().contains("%(release)s"));
    }

    #[test]
    fn non_string_field_is_error() {
        let msg = message(&json!({"compose_url": 42}));
        assert!(resolve(Some(&msg), Some(TEMPLATE)).is_err());
    }

    #[test]
    fn message_without_keys_falls_back_to_template() {
        let msg = message(&json!({"topic": "x"}));
        let url = resolve(Some(&msg), Some(TEMPLATE)).expect("resolve");
        assert_eq!(url.as_deref(), Some(TEMPLATE));
    }

    #[test]
    fn branch_with_out_of_range_version_is_error() {
        let err = BranchFields::parse("ceph-1e30-rhel-7").unwrap_err();
        assert!(err.to_string().contains("out-of-range"));
        let fields = BranchFields::parse("ceph-9.2e18-rhel-7").expect("parse");
        assert_eq!(fields.major, 9_200_000_000_000_000_000);
    }

    #[traced_test]
    #[test]
    fn absent_message_does_not_log_fall_through() {
        let url = resolve(None, Some("http://c/manual")).expect("resolve");
        assert_eq!(url.as_deref(), Some("http://c/manual"));
        assert!(!logs_contain("falling through"));
    }

    #[traced_test]
    #[test]
    fn message_without_keys_logs_fall_through() {
        let msg = message(&json!({"topic": "x"}));
        let _url = resolve(Some(&msg), Some(TEMPLATE)).expect("resolve");
        assert!(logs_contain("falling through"));
    }

    #[test]
    fn absent_message_returns_template_verbatim() {
        assert_eq!(
            resolve(None, Some("http://c/manual")).expect("resolve").as_deref(),
            Some("http://c/manual")
        );
    }

    #[test]
    fn empty_or_absent_template_is_none() {
        assert_eq!(resolve(None, None).expect("resolve"), None);
        assert_eq!(resolve(None, Some("")).expect("resolve"), None);
    }

    #[test]
    fn empty_compose_url_is_normalized_to_none() {
        let msg = message(&json!({"compose_url": ""}));
        assert_eq!(resolve(Some(&msg), Some(TEMPLATE)).expect("resolve"), None);
    }

    #[test]
    fn parse_message_rejects_invalid_and_non_objects() {
        assert!(parse_message("not json").is_none());
        assert!(parse_message("").is_none());
        assert!(parse_message("[1, 2]").is_none());
        assert!(parse_message(r#"{"branch": "b"}"#).is_some());
    }

    #[test]
    fn resolve_request_unparseable_message_uses_template() {
        let request = resolve_request(Some("{not json"), Some("http://c/manual")).expect("request");
        assert_eq!(request.compose_url(), "http://c/manual");
        assert_eq!(request.branch(), None);
    }

    #[test]
    fn resolve_request_carries_message_branch() {
        let request =
            resolve_request(Some(r#"{"branch": "ceph-3.0-rhel-7"}"#), Some(TEMPLATE)).expect("request");
        assert_eq!(request.compose_url(), "http://x/ceph-3.0-rhel-7/3/RHEL-7");
        assert_eq!(request.branch(), Some("ceph-3.0-rhel-7"));
    }

    #[test]
    fn resolve_request_without_any_source_is_error() {
        let err = resolve_request(None, None).unwrap_err();
        assert!(err.to_string().contains("Please set the CI_MESSAGE env var or use --compose arg"));
    }
}
