#![cfg(unix)]

use std::time::Duration;

use spectest::executor::{execute, ExecutionOptions, Outcome, TestSuite};
use spectest::filter::Filter;
use spectest::selector::Selector;
use spectest::{load_suite, HarnessError};

mod common;

fn options(jobs: usize) -> ExecutionOptions {
    ExecutionOptions {
        jobs,
        timeout: Some(Duration::from_secs(10)),
        ..ExecutionOptions::default()
    }
}

#[test]
fn arithmetic_suite_passes() {
    let dir = common::arithmetic_suite();
    let suite = load_suite(dir.path()).unwrap();

    let report = execute(&suite, &options(2)).unwrap();
    assert_eq!(report.records.len(), 1);

    let record = &report.records[0];
    assert_eq!(record.implementation, "adder");
    assert_eq!(record.variant, "default");
    assert_eq!(record.specification, "core");
    assert_eq!(record.uid, "/addition/tests/0");
    assert_eq!(record.display_name, "one plus two");
    match &record.outcome {
        Outcome::Judged { verdict, output } => {
            assert!(verdict.pass, "{verdict:?}");
            assert_eq!(output.stdout, "3\n");
            assert_eq!(output.exit_code, 0);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let summary = report.summary();
    assert_eq!((summary.passed, summary.failed), (1, 0));
}

#[test]
fn failing_verdicts_are_reported_not_raised() {
    let dir = common::arithmetic_suite();
    common::write(
        dir.path(),
        "specifications/core.yaml",
        &common::SPECIFICATION.replace("suite=core", "suite in (core, extra)"),
    );
    let suite = load_suite(dir.path()).unwrap();

    let report = execute(&suite, &options(1)).unwrap();
    let outcomes: Vec<_> = report
        .records
        .iter()
        .map(|r| (r.uid.as_str(), r.outcome.passed()))
        .collect();
    assert_eq!(
        outcomes,
        vec![("/addition/tests/0", true), ("/addition/tests/1", false)]
    );
    assert!(report.has_failures());
}

#[test]
fn skipped_and_captured_tests_are_recorded() {
    let dir = common::arithmetic_suite();
    common::write(
        dir.path(),
        "tests/more.yaml",
        r#"
apiVersion: compliancetest/v1
kind: Test
metadata:
  name: more
  labels: {suite: core}
tests:
  - case: {input: (+ 5 5), expect: {undefined: {}}}
  - case: {skip: needs bignums}
"#,
    );
    let suite = load_suite(dir.path()).unwrap();

    let report = execute(&suite, &options(4)).unwrap();
    let uids: Vec<_> = report.records.iter().map(|r| r.uid.as_str()).collect();
    assert_eq!(
        uids,
        vec!["/addition/tests/0", "/more/tests/0", "/more/tests/1"]
    );
    assert!(matches!(
        &report.records[1].outcome,
        Outcome::Captured { output } if output.stdout == "10\n"
    ));
    assert!(matches!(
        &report.records[2].outcome,
        Outcome::Skipped { reason } if reason == "needs bignums"
    ));
}

#[test]
fn caller_filters_narrow_the_matrix() {
    let dir = common::arithmetic_suite();
    let suite = load_suite(dir.path()).unwrap();

    let mut options = options(1);
    options.implementation_filter =
        Filter::new().with_selector(&Selector::parse("vendor=nobody").unwrap());
    assert!(execute(&suite, &options).unwrap().records.is_empty());

    let mut options = self::options(1);
    options.test_filter = Filter::new().with_uid("/addition/tests/1");
    assert!(execute(&suite, &options).unwrap().records.is_empty());
}

#[test]
fn case_without_expectation_aborts_the_run() {
    let dir = common::arithmetic_suite();
    common::write(
        dir.path(),
        "tests/broken.yaml",
        r#"
apiVersion: compliancetest/v1
kind: Test
metadata:
  name: broken
  labels: {suite: core}
tests:
  - case: {input: (+ 1 1)}
"#,
    );
    let suite = load_suite(dir.path()).unwrap();
    assert_eq!(suite.list_hydrated_tests().len(), 3);

    match execute(&suite, &options(1)) {
        Err(HarnessError::InvalidTest { uid, reason }) => {
            assert_eq!(uid, "/broken/tests/0");
            assert_eq!(reason, "missing expectation");
        }
        other => panic!("expected an invalid test error, got {other:?}"),
    }
}

#[test]
fn missing_binary_aborts_the_run() {
    let dir = common::arithmetic_suite();
    common::write(
        dir.path(),
        "implementations/adder.yaml",
        &common::IMPLEMENTATION.replace("- sh\n      - -c", "- /no/such/shell\n      - -c"),
    );
    let suite = load_suite(dir.path()).unwrap();
    assert!(matches!(
        execute(&suite, &options(1)),
        Err(HarnessError::Runner { .. })
    ));
}

#[test]
fn variant_without_runtime_aborts_the_run() {
    let dir = common::arithmetic_suite();
    common::write(
        dir.path(),
        "implementations/adder.yaml",
        &common::IMPLEMENTATION.replace("runtime: {local: {}}", "runtime: {}"),
    );
    let suite = load_suite(dir.path()).unwrap();
    match execute(&suite, &options(1)) {
        Err(HarnessError::UnknownRuntime {
            implementation,
            variant,
        }) => assert_eq!((implementation.as_str(), variant.as_str()), ("adder", "default")),
        other => panic!("expected an unknown runtime error, got {other:?}"),
    }
}

#[test]
fn cancelled_runs_stop() {
    let dir = common::arithmetic_suite();
    let suite = load_suite(dir.path()).unwrap();
    let options = options(1);
    options.cancellation.cancel();
    assert!(matches!(
        execute(&suite, &options),
        Err(HarnessError::Cancelled)
    ));
}
