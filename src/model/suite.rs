//! The `TestSuite` document: the assertion script and its definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::assertion::{AssertionError, AssertionRuntime};
use crate::model::metadata::{validate_header, Metadata};
use crate::model::KIND_TEST_SUITE;
use crate::validation::{assert_distinct, assert_not_blank, FieldPath, Findings, Validate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TestSuiteDocument {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    #[serde(default)]
    pub spec: TestSuiteSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TestSuiteSpec {
    #[serde(default)]
    pub assertion_config: AssertionConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AssertionConfig {
    #[serde(default)]
    pub script: String,
    #[serde(default)]
    pub definitions: Vec<AssertionDefinition>,
}

/// Binds an expectation key to a script function and a JSON schema for its
/// configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AssertionDefinition {
    pub name: String,
    #[serde(default)]
    pub input_schema: Json,
    pub function_name: String,
}

impl TestSuiteDocument {
    /// Compiles the script and registers every definition.
    pub fn create_runtime(&self) -> Result<AssertionRuntime, AssertionError> {
        let config = &self.spec.assertion_config;
        let mut runtime = AssertionRuntime::new(&config.script)?;
        for definition in &config.definitions {
            runtime.add_assertion(
                &definition.name,
                &definition.function_name,
                &definition.input_schema,
            )?;
        }
        Ok(runtime)
    }
}

impl Validate for TestSuiteDocument {
    fn validate(&self, path: &FieldPath, findings: &mut Findings) {
        validate_header(
            &self.api_version,
            &self.kind,
            KIND_TEST_SUITE,
            &self.metadata,
            path,
            findings,
        );

        let config_path = path.field("spec").field("assertionConfig");
        let config = &self.spec.assertion_config;
        let script_path = config_path.field("script");

        let mut runtime = match AssertionRuntime::new(&config.script) {
            Ok(runtime) => Some(runtime),
            Err(e) => {
                findings.error(&script_path, format!("invalid script: {}", describe(&e)));
                None
            }
        };

        let definitions_path = config_path.field("definitions");
        for (idx, definition) in config.definitions.iter().enumerate() {
            let entry = definitions_path.index(idx);
            assert_not_blank(findings, &entry.field("name"), &definition.name);
            assert_not_blank(findings, &entry.field("functionName"), &definition.function_name);
            if definition.name.trim().is_empty() || definition.function_name.trim().is_empty() {
                continue;
            }
            if let Some(runtime) = runtime.as_mut() {
                // Duplicates are reported below, once for the whole list.
                if runtime.has_assertion(&definition.name) {
                    continue;
                }
                if let Err(e) = runtime.add_assertion(
                    &definition.name,
                    &definition.function_name,
                    &definition.input_schema,
                ) {
                    findings.error(&entry, format!("bad assertion: {}", describe(&e)));
                }
            }
        }
        assert_distinct(
            findings,
            &definitions_path,
            &config.definitions,
            |d| d.name.clone(),
            &["name"],
        );
    }
}

/// The error plus its first cause, on one line.
fn describe(error: &AssertionError) -> String {
    match std::error::Error::source(error) {
        Some(source) => format!("{error}: {source}"),
        None => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn suite(script: &str, definitions: Json) -> TestSuiteDocument {
        serde_json::from_value(json!({
            "apiVersion": "compliancetest/v1",
            "kind": "TestSuite",
            "metadata": {"name": "scheme"},
            "spec": {"assertionConfig": {"script": script, "definitions": definitions}}
        }))
        .unwrap()
    }

    #[test]
    fn valid_suite_builds_a_runtime() {
        let suite = suite(
            "(define (isEqual ctx) {\"pass\" (= (get ctx \"config\") (trim (get-in ctx \"output\" \"stdout\")))})",
            json!([{"name": "equals", "inputSchema": {"type": "string"}, "functionName": "isEqual"}]),
        );
        let mut findings = Findings::new();
        suite.validate(&FieldPath::root(), &mut findings);
        assert!(findings.is_empty(), "{:?}", findings);

        let runtime = suite.create_runtime().unwrap();
        assert!(runtime.has_assertion("equals"));
    }

    #[test]
    fn broken_script_and_definitions_are_reported() {
        let suite = suite(
            "(define (ok ctx) {\"pass\" true})",
            json!([
                {"name": "a", "inputSchema": {}, "functionName": "missing"},
                {"name": "b", "inputSchema": {}, "functionName": "ok"},
                {"name": "b", "inputSchema": {}, "functionName": "ok"}
            ]),
        );
        let mut findings = Findings::new();
        suite.validate(&FieldPath::root(), &mut findings);
        let fields: Vec<_> = findings.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                ".spec.assertionConfig.definitions[0]",
                ".spec.assertionConfig.definitions[2]",
            ]
        );
        assert!(suite.create_runtime().is_err());
    }

    #[test]
    fn unparseable_script_is_an_error() {
        let suite = suite("(define (f x)", json!([]));
        let mut findings = Findings::new();
        suite.validate(&FieldPath::root(), &mut findings);
        assert_eq!(findings.len(), 1);
        let finding = findings.iter().next().unwrap();
        assert_eq!(finding.field, ".spec.assertionConfig.script");
        assert!(finding.message.starts_with("invalid script"));
    }
}
