//! Assertion evaluation.
//!
//! A suite's script is compiled once. Each assertion definition binds a name
//! to a script function and a JSON Schema (draft 7) for its configuration.
//! Judging a test:
//!
//! 1. look up the assertion named by the test's expectation;
//! 2. validate the configuration against its schema;
//! 3. load the script into a fresh interpreter and call the function with
//!    `{metadata: {uid, labels}, input, config, output: {stdout, stderr, exitCode}}`;
//! 4. read the returned map as a [`Verdict`].

use std::collections::BTreeMap;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as Json};
use thiserror::Error;
use tracing::debug;

use crate::executor::runner::ProcessOutput;
use crate::hydrate::{HydratedTestCase, TestKind};
use crate::model::test::UNDEFINED_BEHAVIOR;
use crate::script::{Interpreter, Program, ScriptError, Value};

const DRAFT_7: &str = "http://json-schema.org/draft-07/schema#";

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error, Diagnostic)]
pub enum AssertionError {
    #[error("invalid assertion script")]
    #[diagnostic(code(spectest::config::script))]
    Script(#[source] #[diagnostic_source] ScriptError),

    #[error("assertion '{name}' is defined more than once")]
    #[diagnostic(code(spectest::config::duplicate_assertion))]
    Duplicate { name: String },

    #[error("assertion name '{name}' is reserved")]
    #[diagnostic(
        code(spectest::config::reserved_assertion),
        help("'undefined' marks cases whose output is captured without judgment")
    )]
    Reserved { name: String },

    #[error("assertion '{name}' refers to '{function}', which the script does not define as a function")]
    #[diagnostic(code(spectest::config::missing_function))]
    MissingFunction { name: String, function: String },

    #[error("assertion '{name}' has an invalid input schema: {message}")]
    #[diagnostic(code(spectest::config::schema))]
    InvalidSchema { name: String, message: String },

    #[error("unknown assertion '{name}'")]
    #[diagnostic(code(spectest::run::unknown_assertion))]
    UnknownAssertion { name: String },

    #[error("configuration for assertion '{name}' does not match its schema:\n{}", .violations.join("\n"))]
    #[diagnostic(code(spectest::run::config_schema))]
    ConfigRejected {
        name: String,
        violations: Vec<String>,
    },

    #[error("test is not evaluable (kind: {kind})")]
    #[diagnostic(code(spectest::run::not_evaluable))]
    NotEvaluable { kind: &'static str },

    #[error("assertion '{name}' failed to evaluate")]
    #[diagnostic(code(spectest::run::evaluation))]
    Evaluation {
        name: String,
        #[source]
        #[diagnostic_source]
        source: ScriptError,
    },

    #[error("assertion '{name}' returned {returned}, expected a map with a boolean 'pass'")]
    #[diagnostic(code(spectest::run::bad_verdict))]
    BadVerdict { name: String, returned: String },
}

// ============================================================================
// VERDICT
// ============================================================================

/// What an assertion function concluded about one test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub pass: bool,
    #[serde(flatten)]
    pub detail: Map<String, Json>,
}

impl Verdict {
    pub fn message(&self) -> Option<&str> {
        self.detail.get("message").and_then(Json::as_str)
    }

    /// `expected` and `actual` strings, when the assertion reported both.
    pub fn comparison(&self) -> Option<(&str, &str)> {
        let expected = self.detail.get("expected")?.as_str()?;
        let actual = self.detail.get("actual")?.as_str()?;
        Some((expected, actual))
    }
}

// ============================================================================
// RUNTIME
// ============================================================================

struct RegisteredAssertion {
    function: String,
    schema: jsonschema::Validator,
}

/// The compiled script plus its registered assertions. Read-only once
/// built, so one runtime is shared by every worker.
pub struct AssertionRuntime {
    program: Program,
    assertions: BTreeMap<String, RegisteredAssertion>,
}

impl AssertionRuntime {
    /// Compiles `script` and checks that its top level evaluates.
    pub fn new(script: &str) -> Result<Self, AssertionError> {
        let program = Program::compile("assertions", script).map_err(AssertionError::Script)?;
        let runtime = AssertionRuntime {
            program,
            assertions: BTreeMap::new(),
        };
        runtime.interpreter().map_err(AssertionError::Script)?;
        Ok(runtime)
    }

    pub fn add_assertion(
        &mut self,
        name: &str,
        function: &str,
        input_schema: &Json,
    ) -> Result<(), AssertionError> {
        if name == UNDEFINED_BEHAVIOR {
            return Err(AssertionError::Reserved {
                name: name.to_string(),
            });
        }
        if self.assertions.contains_key(name) {
            return Err(AssertionError::Duplicate {
                name: name.to_string(),
            });
        }

        let schema = compile_schema(name, input_schema)?;

        let interpreter = self.interpreter().map_err(AssertionError::Script)?;
        if !interpreter.is_function(function) {
            return Err(AssertionError::MissingFunction {
                name: name.to_string(),
                function: function.to_string(),
            });
        }

        self.assertions.insert(
            name.to_string(),
            RegisteredAssertion {
                function: function.to_string(),
                schema,
            },
        );
        Ok(())
    }

    pub fn has_assertion(&self, name: &str) -> bool {
        self.assertions.contains_key(name)
    }

    /// Judges one `Eval` test against the output its program produced.
    pub fn evaluate(
        &self,
        test: &HydratedTestCase,
        output: &ProcessOutput,
    ) -> Result<Verdict, AssertionError> {
        let TestKind::Eval {
            input,
            assertion,
            config,
        } = &test.kind
        else {
            return Err(AssertionError::NotEvaluable {
                kind: test.kind.name(),
            });
        };

        let registered =
            self.assertions
                .get(assertion)
                .ok_or_else(|| AssertionError::UnknownAssertion {
                    name: assertion.clone(),
                })?;

        let violations: Vec<String> = registered
            .schema
            .iter_errors(config)
            .map(|e| e.to_string())
            .collect();
        if !violations.is_empty() {
            return Err(AssertionError::ConfigRejected {
                name: assertion.clone(),
                violations,
            });
        }

        let context = json!({
            "metadata": {"uid": test.uid, "labels": test.labels},
            "input": input,
            "config": config,
            "output": output,
        });

        let evaluation_error = |source| AssertionError::Evaluation {
            name: assertion.clone(),
            source,
        };
        let mut interpreter = self.interpreter().map_err(evaluation_error)?;
        let result = interpreter
            .call_global(&registered.function, vec![Value::from_json(&context)])
            .map_err(evaluation_error)?;
        debug!(assertion = %assertion, result = %result, "assertion returned");

        let bad_verdict = || AssertionError::BadVerdict {
            name: assertion.clone(),
            returned: result.to_string(),
        };
        if !matches!(result, Value::Map(_)) {
            return Err(bad_verdict());
        }
        let json = result.to_json().map_err(evaluation_error)?;
        serde_json::from_value(json).map_err(|_| bad_verdict())
    }

    /// A fresh interpreter with the script loaded. Never shared between tests.
    fn interpreter(&self) -> Result<Interpreter, ScriptError> {
        let mut interpreter = Interpreter::new();
        interpreter.load(&self.program)?;
        Ok(interpreter)
    }
}

/// Compiles an input schema as draft 7, whatever `$schema` it declares.
fn compile_schema(name: &str, input_schema: &Json) -> Result<jsonschema::Validator, AssertionError> {
    let invalid = |message: String| AssertionError::InvalidSchema {
        name: name.to_string(),
        message,
    };
    // An omitted schema accepts any configuration.
    let mut schema = match input_schema {
        Json::Null => json!({}),
        other => other.clone(),
    };
    match &mut schema {
        Json::Object(fields) => {
            fields.insert("$schema".to_string(), Json::String(DRAFT_7.to_string()));
        }
        Json::Bool(_) => {}
        other => return Err(invalid(format!("expected an object, got {other}"))),
    }
    jsonschema::draft7::new(&schema).map_err(|e| invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Labels;

    const SCRIPT: &str = r#"
        (define (isEqual ctx)
          (let ((actual (trim (get-in ctx "output" "stdout")))
                (expected (get ctx "config")))
            {:pass (= actual expected)
             :expected expected
             :actual actual
             :uid (get-in ctx "metadata" "uid")}))

        (define (notAMap ctx) "nope")
        (define (boom ctx) (error "exploded on " (get-in ctx "metadata" "uid")))
        (define threshold 3)
    "#;

    fn runtime() -> AssertionRuntime {
        let mut runtime = AssertionRuntime::new(SCRIPT).unwrap();
        runtime
            .add_assertion("equals", "isEqual", &json!({"type": "string"}))
            .unwrap();
        runtime
            .add_assertion("weird", "notAMap", &json!({}))
            .unwrap();
        runtime.add_assertion("boom", "boom", &json!({})).unwrap();
        runtime
    }

    fn eval_test(assertion: &str, config: Json) -> HydratedTestCase {
        HydratedTestCase {
            uid: "/arith/tests/0".into(),
            display_name: String::new(),
            description: String::new(),
            labels: Labels::from([("suite".to_string(), "core".to_string())]),
            kind: TestKind::Eval {
                input: "(+ 1 2)".into(),
                assertion: assertion.into(),
                config,
            },
        }
    }

    fn output(stdout: &str) -> ProcessOutput {
        ProcessOutput {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    #[test]
    fn passing_and_failing_verdicts() {
        let runtime = runtime();
        let verdict = runtime
            .evaluate(&eval_test("equals", json!("3")), &output("3\n"))
            .unwrap();
        assert!(verdict.pass);
        assert_eq!(verdict.detail["uid"], json!("/arith/tests/0"));

        let verdict = runtime
            .evaluate(&eval_test("equals", json!("4")), &output("3\n"))
            .unwrap();
        assert!(!verdict.pass);
        assert_eq!(verdict.comparison(), Some(("4", "3")));
    }

    #[test]
    fn config_must_match_schema() {
        let err = runtime()
            .evaluate(&eval_test("equals", json!(3)), &output("3"))
            .unwrap_err();
        assert!(matches!(err, AssertionError::ConfigRejected { ref violations, .. } if violations.len() == 1));
    }

    #[test]
    fn evaluation_failures_are_errors() {
        let runtime = runtime();
        assert!(matches!(
            runtime.evaluate(&eval_test("weird", json!(null)), &output("")),
            Err(AssertionError::BadVerdict { .. })
        ));
        let err = runtime
            .evaluate(&eval_test("boom", json!(null)), &output(""))
            .unwrap_err();
        assert!(matches!(err, AssertionError::Evaluation { .. }));
        assert!(matches!(
            runtime.evaluate(&eval_test("missing", json!(null)), &output("")),
            Err(AssertionError::UnknownAssertion { .. })
        ));
    }

    #[test]
    fn registration_checks() {
        let mut runtime = runtime();
        assert!(matches!(
            runtime.add_assertion("equals", "isEqual", &json!({})),
            Err(AssertionError::Duplicate { .. })
        ));
        assert!(matches!(
            runtime.add_assertion("limit", "threshold", &json!({})),
            Err(AssertionError::MissingFunction { .. })
        ));
        assert!(matches!(
            runtime.add_assertion("undefined", "isEqual", &json!({})),
            Err(AssertionError::Reserved { .. })
        ));
        assert!(matches!(
            runtime.add_assertion("typed", "isEqual", &json!({"type": 12})),
            Err(AssertionError::InvalidSchema { .. })
        ));
    }

    #[test]
    fn broken_scripts_are_rejected() {
        assert!(matches!(
            AssertionRuntime::new("(define (f x)"),
            Err(AssertionError::Script(ScriptError::Syntax { .. }))
        ));
        assert!(matches!(
            AssertionRuntime::new("(define x (nope))"),
            Err(AssertionError::Script(ScriptError::UndefinedSymbol { .. }))
        ));
    }

    #[test]
    fn non_eval_tests_are_not_evaluable() {
        let mut test = eval_test("equals", json!("3"));
        test.kind = TestKind::CaptureEval { input: "x".into() };
        assert!(matches!(
            runtime().evaluate(&test, &output("")),
            Err(AssertionError::NotEvaluable { kind: "captureEval" })
        ));
    }
}
