//! Shared fixtures: small suites written to temporary directories.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use tempfile::TempDir;

pub const SUITE: &str = r#"
apiVersion: compliancetest/v1
kind: TestSuite
metadata:
  name: arithmetic
spec:
  assertionConfig:
    script: |
      ; Compares trimmed stdout with the configured string.
      (define (isEqual ctx)
        (let ((expected (get ctx "config"))
              (actual (trim (get-in ctx "output" "stdout"))))
          {"pass" (= expected actual)
           "expected" expected
           "actual" actual}))
    definitions:
      - name: equals
        inputSchema: {type: string}
        functionName: isEqual
"#;

pub const SPECIFICATION: &str = r#"
apiVersion: compliancetest/v1
kind: Specification
metadata:
  name: core
sections:
  - metadata: {name: arithmetic}
    testSelector: suite=core
"#;

/// Adds the two numbers in a program like `(+ 1 2)`.
pub const IMPLEMENTATION: &str = r#"
apiVersion: compliancetest/v1
kind: Implementation
metadata:
  name: adder
variants:
  - metadata: {name: default}
    runtime: {local: {}}
    specifications: [core]
    testCommand:
      - sh
      - -c
      - "sed -e 's/[()+]//g' \"$1\" | awk '{print $1+$2}'"
      - sh
      - $(PROGRAM_PATH)
"#;

pub const TESTS: &str = r#"
apiVersion: compliancetest/v1
kind: Test
metadata:
  name: addition
  labels: {suite: core}
tests:
  - case:
      displayName: one plus two
      input: (+ 1 2)
      expect: {equals: "3"}
  - case:
      input: (+ 2 2)
      expect: {equals: "5"}
      labels: {suite: extra}
"#;

pub fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents.trim_start()).unwrap();
}

/// The complete arithmetic suite: one suite, one specification, one
/// implementation and one test document.
pub fn arithmetic_suite() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "suite.yaml", SUITE);
    write(dir.path(), "specifications/core.yaml", SPECIFICATION);
    write(dir.path(), "implementations/adder.yaml", IMPLEMENTATION);
    write(dir.path(), "tests/addition.yaml", TESTS);
    dir
}
