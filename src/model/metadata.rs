//! Metadata, labels and label selectors shared by every document.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::API_VERSION;
use crate::selector::{self, Selector, SelectorError};
use crate::validation::{assert_equal, assert_not_blank, FieldPath, Findings, Validate};

pub const NAME_PATTERN: &str = "[a-z0-9]([-a-z0-9]*[a-z0-9])?";
pub const MAX_NAME_LENGTH: usize = 63;

static QUALIFIED_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{NAME_PATTERN}$")).expect("static regex"));

pub type Labels = BTreeMap<String, String>;

/// Child labels win on key collision.
pub fn merge_labels(parent: &Labels, child: &Labels) -> Labels {
    let mut merged = parent.clone();
    merged.extend(child.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

pub fn is_qualified_name(name: &str) -> bool {
    name.len() <= MAX_NAME_LENGTH && QUALIFIED_NAME.is_match(name)
}

// ============================================================================
// METADATA
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
}

impl Validate for Metadata {
    fn validate(&self, path: &FieldPath, findings: &mut Findings) {
        let name_path = path.field("name");
        assert_not_blank(findings, &name_path, &self.name);
        if self.name.len() > MAX_NAME_LENGTH {
            findings.error(
                &name_path,
                format!(
                    "is {} characters long, must be <= {}",
                    self.name.len(),
                    MAX_NAME_LENGTH
                ),
            );
        }
        if !QUALIFIED_NAME.is_match(&self.name) {
            findings.error(&name_path, format!("must match {NAME_PATTERN}"));
        }

        validate_labels(&self.labels, &path.field("labels"), findings);
    }
}

pub fn validate_labels(labels: &Labels, path: &FieldPath, findings: &mut Findings) {
    for (key, value) in labels {
        let entry = path.key(key);
        if let Err(reason) = selector::check_label_key(key) {
            findings.error(&entry, format!("invalid key: {reason}"));
        }
        if let Err(reason) = selector::check_label_value(value) {
            findings.error(&entry, format!("invalid value: {reason}"));
        }
    }
}

/// Checks the `apiVersion`/`kind`/`metadata` header every document carries.
pub fn validate_header(
    api_version: &str,
    kind: &str,
    expected_kind: &str,
    metadata: &Metadata,
    path: &FieldPath,
    findings: &mut Findings,
) {
    assert_equal(findings, &path.field("apiVersion"), API_VERSION, api_version);
    let kind_path = path.field("kind");
    assert_not_blank(findings, &kind_path, kind);
    assert_equal(findings, &kind_path, expected_kind, kind);
    metadata.validate(&path.field("metadata"), findings);
}

// ============================================================================
// LABEL SELECTOR
// ============================================================================

/// A label selector as written in a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSelector(pub String);

impl LabelSelector {
    pub fn parse(&self) -> Result<Selector, SelectorError> {
        Selector::parse(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LabelSelector {
    fn from(s: &str) -> Self {
        LabelSelector(s.to_string())
    }
}

impl Validate for LabelSelector {
    fn validate(&self, path: &FieldPath, findings: &mut Findings) {
        if let Err(e) = self.parse() {
            findings.error(path, format!("invalid label selector: {e}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn merge_prefers_child() {
        let parent = labels(&[("suite", "core"), ("tier", "1")]);
        let child = labels(&[("tier", "2"), ("extra", "yes")]);
        let merged = merge_labels(&parent, &child);
        assert_eq!(
            merged,
            labels(&[("suite", "core"), ("tier", "2"), ("extra", "yes")])
        );
    }

    #[test]
    fn qualified_names() {
        assert!(is_qualified_name("r7rs-small"));
        assert!(!is_qualified_name("Upper"));
        assert!(!is_qualified_name("-leading"));
        assert!(!is_qualified_name(&"a".repeat(64)));
    }

    #[test]
    fn metadata_validation_reports_name_problems() {
        let metadata = Metadata {
            name: "Bad_Name".into(),
            labels: labels(&[("ok", "-bad")]),
            ..Default::default()
        };
        let mut findings = Findings::new();
        metadata.validate(&FieldPath::root(), &mut findings);
        let rendered: Vec<String> = findings.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                format!("ERROR: .name: must match {NAME_PATTERN}"),
                "ERROR: .labels[ok]: invalid value: must consist of alphanumerics, '-', '_' or '.', and start and end with an alphanumeric".to_string(),
            ]
        );
    }

    #[test]
    fn header_checks_version_and_kind() {
        let mut findings = Findings::new();
        let metadata = Metadata {
            name: "ok".into(),
            ..Default::default()
        };
        validate_header("v0", "Test", "Specification", &metadata, &FieldPath::root(), &mut findings);
        let fields: Vec<_> = findings.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, vec![".apiVersion", ".kind"]);
    }
}
