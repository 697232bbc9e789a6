//! Loads a suite directory.
//!
//! ```text
//! <root>/                 exactly one `kind: TestSuite` document (not recursive)
//! <root>/implementations/ Implementation documents (recursive)
//! <root>/specifications/  Specification documents (recursive)
//! <root>/tests/           Test documents (recursive)
//! ```
//!
//! Only `.yaml`, `.yml` and `.json` files are read. Files are loaded in path
//! order so every run sees the same sequence.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::Value as Json;
use tracing::debug;
use walkdir::WalkDir;

use crate::assertion::{AssertionError, AssertionRuntime};
use crate::errors::{HarnessError, Result};
use crate::executor::TestSuite;
use crate::hydrate::{hydrate_test, HydratedTestCase, TestKind};
use crate::model::{Implementation, Specification, Test, TestSuiteDocument, KIND_TEST_SUITE};
use crate::validation::{FieldPath, Findings, Validate};

const EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// A decoded document and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteFile<T> {
    pub path: PathBuf,
    pub value: T,
}

#[derive(Debug, Clone)]
pub struct LoadedSuite {
    pub root: PathBuf,
    pub suite: SuiteFile<TestSuiteDocument>,
    implementations: Vec<Implementation>,
    specifications: Vec<Specification>,
    tests: Vec<Test>,
    implementation_paths: Vec<PathBuf>,
    specification_paths: Vec<PathBuf>,
    test_paths: Vec<PathBuf>,
    hydrated: Vec<HydratedTestCase>,
}

pub fn load_suite(root: impl AsRef<Path>) -> Result<LoadedSuite> {
    let root = root.as_ref();
    let suite = find_suite_document(root)?;
    let (implementation_paths, implementations) =
        unzip(decode_tree::<Implementation>(&root.join("implementations"))?);
    let (specification_paths, specifications) =
        unzip(decode_tree::<Specification>(&root.join("specifications"))?);
    let (test_paths, tests) = unzip(decode_tree::<Test>(&root.join("tests"))?);

    let hydrated = tests.iter().flat_map(hydrate_test).collect();
    debug!(
        root = %root.display(),
        implementations = implementations.len(),
        specifications = specifications.len(),
        tests = tests.len(),
        "loaded suite"
    );

    Ok(LoadedSuite {
        root: root.to_path_buf(),
        suite,
        implementations,
        specifications,
        tests,
        implementation_paths,
        specification_paths,
        test_paths,
        hydrated,
    })
}

fn unzip<T>(files: Vec<SuiteFile<T>>) -> (Vec<PathBuf>, Vec<T>) {
    files.into_iter().map(|f| (f.path, f.value)).unzip()
}

fn find_suite_document(root: &Path) -> Result<SuiteFile<TestSuiteDocument>> {
    let mut found: Option<SuiteFile<TestSuiteDocument>> = None;
    for path in document_paths(root, false)? {
        let raw = read_document(&path)?;
        if raw.get("kind").and_then(Json::as_str) != Some(KIND_TEST_SUITE) {
            debug!(path = %path.display(), "ignoring non-suite document at the root");
            continue;
        }
        if let Some(first) = &found {
            return Err(HarnessError::ConflictingSuites {
                first: first.path.clone(),
                second: path,
            });
        }
        let value = from_json(&path, raw)?;
        found = Some(SuiteFile { path, value });
    }
    found.ok_or_else(|| HarnessError::MissingSuite {
        root: root.to_path_buf(),
    })
}

/// Every document under `dir`, sorted by path. A missing directory is empty.
pub fn decode_tree<T: DeserializeOwned>(dir: &Path) -> Result<Vec<SuiteFile<T>>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    document_paths(dir, true)?
        .into_iter()
        .map(|path| {
            let value = decode_document(&path)?;
            Ok(SuiteFile { path, value })
        })
        .collect()
}

fn document_paths(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut walker = WalkDir::new(dir).min_depth(1).sort_by_file_name();
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut paths = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            HarnessError::io(path, e.into())
        })?;
        let has_extension = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| EXTENSIONS.contains(&ext));
        if entry.file_type().is_file() && has_extension {
            paths.push(entry.into_path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Reads YAML or JSON into a typed document. Unknown fields are rejected.
pub fn decode_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = read_document(path)?;
    from_json(path, raw)
}

fn read_document(path: &Path) -> Result<Json> {
    let text = fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
    // YAML is a superset of JSON, so one decoder covers both.
    serde_yaml::from_str(&text).map_err(|e| HarnessError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn from_json<T: DeserializeOwned>(path: &Path, raw: Json) -> Result<T> {
    serde_json::from_value(raw).map_err(|e| HarnessError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

// ============================================================================
// VALIDATION
// ============================================================================

impl LoadedSuite {
    pub fn implementations(&self) -> impl Iterator<Item = SuiteFile<&Implementation>> {
        paired(&self.implementation_paths, &self.implementations)
    }

    pub fn specifications(&self) -> impl Iterator<Item = SuiteFile<&Specification>> {
        paired(&self.specification_paths, &self.specifications)
    }

    pub fn tests(&self) -> impl Iterator<Item = SuiteFile<&Test>> {
        paired(&self.test_paths, &self.tests)
    }

    /// Validates every document and hands each file's findings to `callback`
    /// in load order: the suite, implementations, specifications, tests.
    ///
    /// References between documents are checked too: variants naming an
    /// unknown specification get a warning, tests using an unknown assertion
    /// get an error.
    pub fn run_validation(&self, mut callback: impl FnMut(&Path, &Findings)) {
        let root = FieldPath::root();

        let mut findings = Findings::new();
        self.suite.value.validate(&root, &mut findings);
        callback(&self.suite.path, &findings);

        let known_specs: BTreeSet<&str> = self
            .specifications
            .iter()
            .map(|s| s.metadata.name.as_str())
            .collect();
        for file in self.implementations() {
            let mut findings = Findings::new();
            file.value.validate(&root, &mut findings);
            for (v, variant) in file.value.variants.iter().enumerate() {
                for (s, name) in variant.specifications.iter().enumerate() {
                    if !name.trim().is_empty() && !known_specs.contains(name.as_str()) {
                        findings.warning(
                            &root.field("variants").index(v).field("specifications").index(s),
                            format!("unknown specification {name:?}"),
                        );
                    }
                }
            }
            callback(&file.path, &findings);
        }

        for file in self.specifications() {
            let mut findings = Findings::new();
            file.value.validate(&root, &mut findings);
            callback(&file.path, &findings);
        }

        let assertions = self.suite.value.create_runtime().ok();
        for file in self.tests() {
            let mut findings = Findings::new();
            file.value.validate(&root, &mut findings);
            if let Some(runtime) = &assertions {
                for test in hydrate_test(file.value) {
                    if let TestKind::Eval { assertion, .. } = &test.kind {
                        if !runtime.has_assertion(assertion) {
                            findings.error(
                                &root.field("tests"),
                                format!("test {:?} uses unknown assertion {:?}", test.uid, assertion),
                            );
                        }
                    }
                }
            }
            callback(&file.path, &findings);
        }
    }

    /// Total number of `Test` documents, not hydrated cases.
    pub fn test_document_count(&self) -> usize {
        self.tests.len()
    }
}

fn paired<'a, T>(
    paths: &'a [PathBuf],
    values: &'a [T],
) -> impl Iterator<Item = SuiteFile<&'a T>> {
    paths.iter().zip(values).map(|(path, value)| SuiteFile {
        path: path.clone(),
        value,
    })
}

impl TestSuite for LoadedSuite {
    fn list_hydrated_tests(&self) -> &[HydratedTestCase] {
        &self.hydrated
    }

    fn list_implementations(&self) -> &[Implementation] {
        &self.implementations
    }

    fn list_specifications(&self) -> &[Specification] {
        &self.specifications
    }

    fn create_assertion_runtime(&self) -> std::result::Result<AssertionRuntime, AssertionError> {
        self.suite.value.create_runtime()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SUITE: &str = "\
apiVersion: compliancetest/v1
kind: TestSuite
metadata:
  name: scheme
spec:
  assertionConfig:
    script: |
      (define (ok ctx) {\"pass\" true})
    definitions:
      - name: ok
        inputSchema: {}
        functionName: ok
";

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn missing_suite_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_suite(dir.path()),
            Err(HarnessError::MissingSuite { .. })
        ));
    }

    #[test]
    fn two_suite_documents_conflict() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.yaml", SUITE);
        write(dir.path(), "b.yml", SUITE);
        assert!(matches!(
            load_suite(dir.path()),
            Err(HarnessError::ConflictingSuites { .. })
        ));
    }

    #[test]
    fn nested_documents_load_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "suite.yaml", SUITE);
        write(dir.path(), "README.md", "not a document");
        for name in ["b", "a"] {
            write(
                dir.path(),
                &format!("specifications/nested/{name}.json"),
                &format!(
                    r#"{{"apiVersion": "compliancetest/v1", "kind": "Specification", "metadata": {{"name": "{name}"}}}}"#
                ),
            );
        }

        let suite = load_suite(dir.path()).unwrap();
        let names: Vec<_> = suite
            .list_specifications()
            .iter()
            .map(|s| s.metadata.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(suite.list_implementations().is_empty());
        assert!(suite.list_hydrated_tests().is_empty());
    }

    #[test]
    fn unknown_fields_fail_to_decode() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "suite.yaml", SUITE);
        write(
            dir.path(),
            "specifications/bad.yaml",
            "apiVersion: compliancetest/v1\nkind: Specification\nmetadata: {name: bad}\nsectons: []\n",
        );
        assert!(matches!(
            load_suite(dir.path()),
            Err(HarnessError::Decode { .. })
        ));
    }

    #[test]
    fn contentless_sections_fail_to_decode() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "suite.yaml", SUITE);
        write(
            dir.path(),
            "specifications/hollow.yaml",
            "apiVersion: compliancetest/v1\nkind: Specification\nmetadata: {name: hollow}\nsections:\n  - metadata: {name: todo}\n",
        );
        match load_suite(dir.path()) {
            Err(HarnessError::Decode { message, .. }) => {
                assert!(message.contains("section 'todo' requires one of"), "{message}")
            }
            other => panic!("expected a decode error, got {other:?}"),
        }
    }

    #[test]
    fn validation_cross_checks_references() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "suite.yaml", SUITE);
        write(
            dir.path(),
            "implementations/impl.yaml",
            "\
apiVersion: compliancetest/v1
kind: Implementation
metadata: {name: impl}
variants:
  - metadata: {name: default}
    runtime: {local: {}}
    specifications: [missing]
    testCommand: [cat, $(PROGRAM_PATH)]
",
        );
        write(
            dir.path(),
            "tests/t.yaml",
            "\
apiVersion: compliancetest/v1
kind: Test
metadata: {name: t}
tests:
  - case: {input: '1', expect: {nope: 1}}
",
        );

        let suite = load_suite(dir.path()).unwrap();
        let mut seen = Vec::new();
        suite.run_validation(|path, findings| {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            for finding in findings {
                seen.push(format!("{name} {finding}"));
            }
        });
        assert_eq!(
            seen,
            vec![
                "impl.yaml WARNING: .variants[0].specifications[0]: unknown specification \"missing\"",
                "t.yaml ERROR: .tests: test \"/t/tests/0\" uses unknown assertion \"nope\"",
            ]
        );
    }
}
