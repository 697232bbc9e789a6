use serde_json::json;

use spectest::assertion::{AssertionError, AssertionRuntime};
use spectest::executor::runner::ProcessOutput;
use spectest::hydrate::{HydratedTestCase, TestKind};

const SCRIPT: &str = r#"
; Echoes the evaluation context back so tests can inspect it.
(define (describe ctx)
  {"pass" true
   "uid" (get-in ctx "metadata" "uid")
   "suite" (get-in ctx "metadata" "labels" "suite")
   "input" (get ctx "input")
   "config" (get ctx "config")
   "exitCode" (get-in ctx "output" "exitCode")
   "stderr" (get-in ctx "output" "stderr")})

(define (exitsWith ctx)
  (let ((want (get-in ctx "config" "code"))
        (got (get-in ctx "output" "exitCode")))
    {"pass" (= want got)
     "message" (str "exit code " got ", wanted " want)}))

(define (lineCount ctx)
  {"pass" (= (len (lines (get-in ctx "output" "stdout")))
             (get ctx "config"))})
"#;

fn runtime() -> AssertionRuntime {
    let mut runtime = AssertionRuntime::new(SCRIPT).unwrap();
    runtime.add_assertion("describe", "describe", &json!({})).unwrap();
    runtime
        .add_assertion(
            "exits-with",
            "exitsWith",
            &json!({
                "type": "object",
                "properties": {"code": {"type": "integer"}},
                "required": ["code"],
                "additionalProperties": false
            }),
        )
        .unwrap();
    runtime
        .add_assertion("line-count", "lineCount", &json!({"type": "integer", "minimum": 0}))
        .unwrap();
    runtime
}

fn eval_case(assertion: &str, config: serde_json::Value) -> HydratedTestCase {
    HydratedTestCase {
        uid: "/exits/tests/0".to_string(),
        display_name: "exit".to_string(),
        description: String::new(),
        labels: [("suite".to_string(), "core".to_string())].into_iter().collect(),
        kind: TestKind::Eval {
            input: "(exit 3)".to_string(),
            assertion: assertion.to_string(),
            config,
        },
    }
}

fn output(stdout: &str, exit_code: i64) -> ProcessOutput {
    ProcessOutput {
        stdout: stdout.to_string(),
        stderr: "warning\n".to_string(),
        exit_code,
    }
}

#[test]
fn functions_receive_the_full_context() {
    let verdict = runtime()
        .evaluate(&eval_case("describe", json!({"k": [1, 2]})), &output("", 3))
        .unwrap();
    assert!(verdict.pass);
    assert_eq!(
        serde_json::Value::Object(verdict.detail),
        json!({
            "uid": "/exits/tests/0",
            "suite": "core",
            "input": "(exit 3)",
            "config": {"k": [1, 2]},
            "exitCode": 3,
            "stderr": "warning\n"
        })
    );
}

#[test]
fn verdicts_carry_detail() {
    let runtime = runtime();
    let pass = runtime
        .evaluate(&eval_case("exits-with", json!({"code": 3})), &output("", 3))
        .unwrap();
    assert!(pass.pass);

    let fail = runtime
        .evaluate(&eval_case("exits-with", json!({"code": 0})), &output("", 3))
        .unwrap();
    assert!(!fail.pass);
    assert_eq!(fail.message(), Some("exit code 3, wanted 0"));
}

#[test]
fn each_schema_violation_is_reported() {
    let err = runtime()
        .evaluate(
            &eval_case("exits-with", json!({"code": "zero", "extra": true})),
            &output("", 0),
        )
        .unwrap_err();
    match err {
        AssertionError::ConfigRejected { name, violations } => {
            assert_eq!(name, "exits-with");
            assert_eq!(violations.len(), 2, "{violations:?}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn one_runtime_serves_many_evaluations() {
    let runtime = runtime();
    for n in 0..5i64 {
        let stdout: String = (0..n).map(|i| format!("{i}\n")).collect();
        let verdict = runtime
            .evaluate(&eval_case("line-count", json!(n)), &output(&stdout, 0))
            .unwrap();
        assert!(verdict.pass, "{n} lines");
    }
}
