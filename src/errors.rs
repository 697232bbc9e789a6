//! Harness-level errors.
//!
//! Everything that stops a run ends up here. Codes under `spectest::config`
//! are raised before any program executes; codes under `spectest::run` are
//! raised while the matrix is being executed.

use std::io;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::assertion::AssertionError;
use crate::executor::runner::RunnerError;
use crate::selector::SelectorError;

pub type Result<T, E = HarnessError> = std::result::Result<T, E>;

#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    // ========================================================================
    // CONFIGURATION
    // ========================================================================
    #[error("couldn't read {}", .path.display())]
    #[diagnostic(code(spectest::config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("couldn't decode {}: {message}", .path.display())]
    #[diagnostic(code(spectest::config::decode))]
    Decode { path: PathBuf, message: String },

    #[error("no TestSuite document found in {}", .root.display())]
    #[diagnostic(
        code(spectest::config::missing_suite),
        help("put exactly one document with `kind: TestSuite` at the top of the suite directory")
    )]
    MissingSuite { root: PathBuf },

    #[error("found more than one TestSuite document: {} and {}", .first.display(), .second.display())]
    #[diagnostic(code(spectest::config::conflicting_suites))]
    ConflictingSuites { first: PathBuf, second: PathBuf },

    #[error("invalid selector in {context}")]
    #[diagnostic(code(spectest::config::selector))]
    Selector {
        context: String,
        #[source]
        #[diagnostic_source]
        source: SelectorError,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Assertion(#[from] AssertionError),

    #[error("suite failed validation with {errors} error(s)")]
    #[diagnostic(
        code(spectest::config::validation),
        help("fix the errors listed above")
    )]
    Validation { errors: usize },

    // ========================================================================
    // EXECUTION
    // ========================================================================
    #[error("test '{uid}' is invalid: {reason}")]
    #[diagnostic(code(spectest::run::invalid_test))]
    InvalidTest { uid: String, reason: String },

    #[error("variant '{variant}' of implementation '{implementation}' has no known runtime")]
    #[diagnostic(
        code(spectest::run::unknown_runtime),
        help("declare a `runtime.local` block on the variant")
    )]
    UnknownRuntime {
        implementation: String,
        variant: String,
    },

    #[error("couldn't run test '{uid}'")]
    #[diagnostic(code(spectest::run::runner))]
    Runner {
        uid: String,
        #[source]
        #[diagnostic_source]
        source: RunnerError,
    },

    #[error("couldn't evaluate test '{uid}'")]
    #[diagnostic(code(spectest::run::evaluation))]
    Evaluation {
        uid: String,
        #[source]
        #[diagnostic_source]
        source: AssertionError,
    },

    #[error("couldn't start the worker pool: {0}")]
    #[diagnostic(code(spectest::run::thread_pool))]
    ThreadPool(String),

    #[error("run cancelled")]
    #[diagnostic(code(spectest::run::cancelled))]
    Cancelled,

    // ========================================================================
    // OUTPUT
    // ========================================================================
    #[error("couldn't encode {what} as JSON")]
    #[diagnostic(code(spectest::output::encode))]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl HarnessError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        HarnessError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn selector(context: impl Into<String>, source: SelectorError) -> Self {
        HarnessError::Selector {
            context: context.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(err: &HarnessError) -> String {
        err.code().map(|c| c.to_string()).unwrap_or_default()
    }

    #[test]
    fn validation_help_points_at_the_findings() {
        let err = HarnessError::Validation { errors: 2 };
        assert_eq!(code(&err), "spectest::config::validation");
        let help = err.help().map(|h| h.to_string()).unwrap_or_default();
        assert_eq!(help, "fix the errors listed above");
    }

    #[test]
    fn encoding_failures_have_their_own_code() {
        let source = serde_json::from_str::<u8>("x").unwrap_err();
        let err = HarnessError::Encode {
            what: "run report",
            source,
        };
        assert_eq!(code(&err), "spectest::output::encode");
        assert_eq!(err.to_string(), "couldn't encode run report as JSON");
    }

    #[test]
    fn unknown_runtime_names_the_variant() {
        let err = HarnessError::UnknownRuntime {
            implementation: "adder".into(),
            variant: "default".into(),
        };
        assert_eq!(code(&err), "spectest::run::unknown_runtime");
        assert_eq!(
            err.to_string(),
            "variant 'default' of implementation 'adder' has no known runtime"
        );
        let help = err.help().map(|h| h.to_string()).unwrap_or_default();
        assert_eq!(help, "declare a `runtime.local` block on the variant");
    }
}
