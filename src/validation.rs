//! Structural validation of suite documents.
//!
//! Validation never stops at the first problem: every rule appends a
//! [`Finding`] at a [`FieldPath`] such as `.spec.assertionConfig.definitions[1].name`,
//! and the caller decides what to do with the collected [`Findings`].

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

// ============================================================================
// LEVELS AND FINDINGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Error => "ERROR",
            Level::Warning => "WARNING",
            Level::Info => "INFO",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub level: Level,
    pub field: String,
    pub message: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.level, self.field, self.message)
    }
}

/// A position inside a document. Paths are immutable; descending returns a
/// new path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn field(&self, name: &str) -> Self {
        FieldPath(format!("{}.{}", self.0, name))
    }

    pub fn index(&self, index: usize) -> Self {
        FieldPath(format!("{}[{}]", self.0, index))
    }

    pub fn key(&self, key: &str) -> Self {
        FieldPath(format!("{}[{}]", self.0, key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn finding(&self, level: Level, message: impl Into<String>) -> Finding {
        Finding {
            level,
            field: self.0.clone(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Findings(Vec<Finding>);

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, path: &FieldPath, message: impl Into<String>) {
        self.0.push(path.finding(Level::Error, message));
    }

    pub fn warning(&mut self, path: &FieldPath, message: impl Into<String>) {
        self.0.push(path.finding(Level::Warning, message));
    }

    pub fn info(&mut self, path: &FieldPath, message: impl Into<String>) {
        self.0.push(path.finding(Level::Info, message));
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|f| f.level == Level::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.0.iter().filter(|f| f.level == Level::Error)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Finding> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Extend<Finding> for Findings {
    fn extend<I: IntoIterator<Item = Finding>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Findings {
    type Item = Finding;
    type IntoIter = std::vec::IntoIter<Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Findings {
    type Item = &'a Finding;
    type IntoIter = std::slice::Iter<'a, Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Anything that can check its own structure.
pub trait Validate {
    fn validate(&self, path: &FieldPath, findings: &mut Findings);
}

// ============================================================================
// SUMMARY
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}

impl ValidationSummary {
    pub fn update(&mut self, findings: &Findings) {
        for finding in findings {
            match finding.level {
                Level::Error => self.errors += 1,
                Level::Warning => self.warnings += 1,
                Level::Info => self.infos += 1,
            }
        }
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

impl fmt::Display for ValidationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Results: {} Errors, {} Warnings, {} Infos",
            self.errors, self.warnings, self.infos
        )
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub fn assert_not_blank(findings: &mut Findings, path: &FieldPath, value: &str) {
    if value.trim().is_empty() {
        findings.error(path, "must not be blank");
    }
}

pub fn assert_equal(findings: &mut Findings, path: &FieldPath, want: &str, got: &str) {
    if want != got {
        findings.error(path, format!("expected field to be {:?} got {:?}", want, got));
    }
}

/// Reports every entry whose key collides with an earlier entry.
pub fn assert_distinct<T, K, F>(
    findings: &mut Findings,
    path: &FieldPath,
    items: &[T],
    key: F,
    sub_fields: &[&str],
) where
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut seen: BTreeMap<K, Vec<usize>> = BTreeMap::new();
    for (idx, item) in items.iter().enumerate() {
        let entry = seen.entry(key(item)).or_default();
        if !entry.is_empty() {
            findings.error(
                &path.index(idx),
                format!(
                    "conflicts with entries: {:?}, entries must have distinct sub-fields: {:?}",
                    entry, sub_fields
                ),
            );
        }
        entry.push(idx);
    }
}

/// Checks that exactly one of a set of mutually exclusive fields is present.
#[derive(Default)]
pub struct OneOf<'a> {
    entries: Vec<(&'a str, bool)>,
}

impl<'a> OneOf<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: &'a str, defined: bool) -> Self {
        self.entries.push((key, defined));
        self
    }

    pub fn validate(self, findings: &mut Findings, path: &FieldPath) {
        let mut all = Vec::new();
        let mut defined = Vec::new();
        for (key, is_defined) in self.entries {
            all.push(key);
            if is_defined {
                defined.push(key);
            }
        }
        all.sort_unstable();
        defined.sort_unstable();

        match defined.len() {
            0 => findings.error(
                path,
                format!("requires one of the following child fields {:?}", all),
            ),
            1 => {}
            _ => findings.error(path, format!("only one of {:?} may be set", defined)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_compose() {
        let path = FieldPath::root().field("spec").field("definitions").index(2).key("x");
        assert_eq!(path.as_str(), ".spec.definitions[2][x]");
    }

    #[test]
    fn finding_display() {
        let mut findings = Findings::new();
        findings.warning(&FieldPath::root().field("skip"), "test is skipped");
        let rendered: Vec<String> = findings.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["WARNING: .skip: test is skipped"]);
        assert!(!findings.has_errors());
    }

    #[test]
    fn distinct_reports_later_duplicates() {
        let mut findings = Findings::new();
        let names = ["a", "b", "a", "a"];
        assert_distinct(&mut findings, &FieldPath::root(), &names, |n| *n, &["name"]);
        let fields: Vec<_> = findings.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, vec!["[2]", "[3]"]);
        assert!(findings.iter().last().unwrap().message.contains("[0, 2]"));
    }

    #[test]
    fn one_of_requires_exactly_one() {
        let root = FieldPath::root();

        let mut findings = Findings::new();
        OneOf::new().field("case", false).field("context", false).validate(&mut findings, &root);
        assert_eq!(
            findings.iter().next().unwrap().message,
            r#"requires one of the following child fields ["case", "context"]"#
        );

        let mut findings = Findings::new();
        OneOf::new().field("case", true).field("context", true).validate(&mut findings, &root);
        assert!(findings.iter().next().unwrap().message.starts_with("only one of"));
    }

    #[test]
    fn summary_counts_levels() {
        let mut findings = Findings::new();
        let root = FieldPath::root();
        findings.error(&root, "e");
        findings.warning(&root, "w");
        findings.warning(&root, "w");
        let mut summary = ValidationSummary::default();
        summary.update(&findings);
        assert_eq!(summary.to_string(), "Results: 1 Errors, 2 Warnings, 0 Infos");
    }
}
