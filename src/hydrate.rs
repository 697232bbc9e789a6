//! Template hydration.
//!
//! A `Test` document is a tree: every context carries a template that is
//! merged into everything below it. Hydration walks the tree once, top-down,
//! and produces one fully resolved [`HydratedTestCase`] per leaf.
//!
//! Merge rules, child over parent:
//!
//! - labels: child keys overwrite parent keys
//! - expectation: the child's, if present and non-empty, else the parent's
//! - display name and description: [`StringMutator::compose`]

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::model::metadata::{merge_labels, Labels};
use crate::model::test::{Expectation, Test, TestCase, TestCaseTemplate, TestEntry, TestExpectation};

// ============================================================================
// STRING MUTATORS
// ============================================================================

/// Wraps a leaf string in inherited decoration.
///
/// In documents a bare string is shorthand for `{fallback: <string>}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StringMutatorRepr", rename_all = "camelCase")]
pub struct StringMutator {
    pub prefix: String,
    pub suffix: String,
    pub fallback: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringMutatorRepr {
    Plain(String),
    Parts(MutatorParts),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MutatorParts {
    #[serde(default)]
    prefix: String,
    #[serde(default)]
    suffix: String,
    #[serde(default)]
    fallback: String,
}

impl From<StringMutatorRepr> for StringMutator {
    fn from(repr: StringMutatorRepr) -> Self {
        match repr {
            StringMutatorRepr::Plain(fallback) => StringMutator {
                fallback,
                ..Default::default()
            },
            StringMutatorRepr::Parts(parts) => StringMutator {
                prefix: parts.prefix,
                suffix: parts.suffix,
                fallback: parts.fallback,
            },
        }
    }
}

impl StringMutator {
    pub fn new(prefix: &str, suffix: &str, fallback: &str) -> Self {
        StringMutator {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            fallback: fallback.to_string(),
        }
    }

    /// `self` is the parent; prefixes accumulate outside-in, suffixes
    /// inside-out, and the innermost non-empty fallback wins.
    pub fn compose(&self, child: &StringMutator) -> StringMutator {
        StringMutator {
            prefix: format!("{}{}", self.prefix, child.prefix),
            suffix: format!("{}{}", child.suffix, self.suffix),
            fallback: if child.fallback.is_empty() {
                self.fallback.clone()
            } else {
                child.fallback.clone()
            },
        }
    }

    pub fn apply(&self, leaf: &str) -> String {
        let body = if leaf.is_empty() { &self.fallback } else { leaf };
        format!("{}{}{}", self.prefix, body, self.suffix)
    }
}

// ============================================================================
// HYDRATED TEMPLATES
// ============================================================================

/// A template with all ancestors merged in, plus the structural path of the
/// node it applies to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HydratedTemplate {
    pub path: String,
    pub display_name: StringMutator,
    pub description: StringMutator,
    pub labels: Labels,
    pub expect: Option<TestExpectation>,
}

impl HydratedTemplate {
    pub fn root(path: &str) -> Self {
        HydratedTemplate {
            path: path.to_string(),
            ..Default::default()
        }
    }

    /// The template a document's own labels seed before its template applies.
    pub fn for_test(test: &Test) -> Self {
        HydratedTemplate {
            path: format!("/{}", test.metadata.name),
            labels: test.metadata.labels.clone(),
            ..Default::default()
        }
    }

    pub fn with_path_suffix(&self, suffix: &str) -> Self {
        HydratedTemplate {
            path: format!("{}{}", self.path, suffix),
            ..self.clone()
        }
    }

    pub fn merge(&self, child: &TestCaseTemplate) -> Self {
        let expect = match &child.expect {
            Some(e) if !e.is_empty() => Some(e.clone()),
            _ => self.expect.clone(),
        };
        HydratedTemplate {
            path: self.path.clone(),
            display_name: self.display_name.compose(&child.display_name),
            description: self.description.compose(&child.description),
            labels: merge_labels(&self.labels, &child.labels),
            expect,
        }
    }
}

// ============================================================================
// HYDRATED TEST CASES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HydratedTestCase {
    pub uid: String,
    pub display_name: String,
    pub description: String,
    pub labels: Labels,
    pub kind: TestKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TestKind {
    Skip {
        reason: String,
    },
    Invalid {
        reason: String,
    },
    Eval {
        input: String,
        assertion: String,
        config: Json,
    },
    CaptureEval {
        input: String,
    },
}

impl TestKind {
    pub fn name(&self) -> &'static str {
        match self {
            TestKind::Skip { .. } => "skip",
            TestKind::Invalid { .. } => "invalid",
            TestKind::Eval { .. } => "eval",
            TestKind::CaptureEval { .. } => "captureEval",
        }
    }
}

impl TestCase {
    pub fn hydrate(&self, parent: &HydratedTemplate) -> HydratedTestCase {
        HydratedTestCase {
            uid: self.uid.clone().unwrap_or_else(|| parent.path.clone()),
            display_name: parent.display_name.apply(&self.display_name),
            description: parent.description.apply(&self.description),
            labels: merge_labels(&parent.labels, &self.labels),
            kind: self.resolve_kind(parent),
        }
    }

    fn resolve_kind(&self, parent: &HydratedTemplate) -> TestKind {
        if let Some(reason) = &self.skip {
            return TestKind::Skip {
                reason: reason.clone(),
            };
        }
        let Some(expect) = self.effective_expectation(parent) else {
            return TestKind::Invalid {
                reason: "missing expectation".to_string(),
            };
        };
        let Some(expectation) = expect.resolve() else {
            return TestKind::Invalid {
                reason: format!("expected 1 expectation, got {}", expect.len()),
            };
        };
        let input = match &self.input {
            Some(input) if !input.trim().is_empty() => input.clone(),
            _ => {
                return TestKind::Invalid {
                    reason: "missing input".to_string(),
                }
            }
        };
        match expectation {
            Expectation::Undefined => TestKind::CaptureEval { input },
            Expectation::Assertion { name, config } => TestKind::Eval {
                input,
                assertion: name.to_string(),
                config: config.clone(),
            },
        }
    }
}

/// Flattens one `Test` document into hydrated cases, in document order.
pub fn hydrate_test(test: &Test) -> Vec<HydratedTestCase> {
    let mut out = Vec::new();
    walk_context(
        &test.template,
        &test.tests,
        &HydratedTemplate::for_test(test),
        &mut out,
    );
    out
}

fn walk_context(
    template: &TestCaseTemplate,
    entries: &[TestEntry],
    parent: &HydratedTemplate,
    out: &mut Vec<HydratedTestCase>,
) {
    let parent = parent.with_path_suffix("/tests").merge(template);
    for (idx, entry) in entries.iter().enumerate() {
        let entry_parent = parent.with_path_suffix(&format!("/{idx}"));
        match entry {
            TestEntry::Case(case) => out.push(case.hydrate(&entry_parent)),
            TestEntry::Context(context) => {
                walk_context(&context.template, &context.tests, &entry_parent, out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_string_is_fallback_shorthand() {
        let plain: StringMutator = serde_json::from_value(json!("Arithmetic")).unwrap();
        assert_eq!(plain, StringMutator::new("", "", "Arithmetic"));
        let parts: StringMutator =
            serde_json::from_value(json!({"prefix": "[", "suffix": "]"})).unwrap();
        assert_eq!(parts, StringMutator::new("[", "]", ""));
        assert!(serde_json::from_value::<StringMutator>(json!({"prefx": "["})).is_err());
    }

    #[test]
    fn mutator_composition() {
        let parent = StringMutator::new("[", "]", "DEFAULT");
        let child = StringMutator::new(">", "<", "");
        let merged = parent.compose(&child);
        assert_eq!(merged.apply(""), "[>DEFAULT<]");
        assert_eq!(merged.apply("leaf"), "[>leaf<]");
    }

    #[test]
    fn kind_resolution_order() {
        let parent = HydratedTemplate::root("/t/tests/0");
        let case = |value: serde_json::Value| -> TestCase { serde_json::from_value(value).unwrap() };

        let skipped = case(json!({"skip": "later"})).hydrate(&parent);
        assert_eq!(skipped.kind, TestKind::Skip { reason: "later".into() });

        let missing = case(json!({"input": "1"})).hydrate(&parent);
        assert_eq!(missing.kind, TestKind::Invalid { reason: "missing expectation".into() });

        let two = case(json!({"input": "1", "expect": {"a": 1, "b": 2}})).hydrate(&parent);
        assert_eq!(
            two.kind,
            TestKind::Invalid { reason: "expected 1 expectation, got 2".into() }
        );

        let no_input = case(json!({"expect": {"equals": "1"}})).hydrate(&parent);
        assert_eq!(no_input.kind, TestKind::Invalid { reason: "missing input".into() });

        let capture = case(json!({"input": "1", "expect": {"undefined": {}}})).hydrate(&parent);
        assert_eq!(capture.kind, TestKind::CaptureEval { input: "1".into() });

        let eval = case(json!({"input": "1", "expect": {"equals": "1"}})).hydrate(&parent);
        assert_eq!(
            eval.kind,
            TestKind::Eval {
                input: "1".into(),
                assertion: "equals".into(),
                config: json!("1")
            }
        );
    }

    #[test]
    fn explicit_uid_replaces_path() {
        let parent = HydratedTemplate::root("/t/tests/0");
        let case: TestCase = serde_json::from_value(json!({"uid": "custom", "skip": "x"})).unwrap();
        assert_eq!(case.hydrate(&parent).uid, "custom");
    }

    #[test]
    fn kind_serializes_with_type_tag() {
        let kind = TestKind::CaptureEval { input: "x".into() };
        assert_eq!(
            serde_json::to_value(&kind).unwrap(),
            json!({"type": "captureEval", "input": "x"})
        );
    }
}
