//! Errors raised while compiling or evaluating assertion scripts.
//!
//! Syntax errors keep the script source and the offending span so `miette`
//! can render them with a caret under the problem. Evaluation errors carry no
//! source: they are reported against the test case that triggered them.

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ScriptError {
    #[error("syntax error: {message}")]
    #[diagnostic(code(spectest::script::syntax))]
    Syntax {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("undefined symbol '{symbol}'")]
    #[diagnostic(code(spectest::script::undefined_symbol))]
    UndefinedSymbol { symbol: String },

    #[error("{atom}: expected {expected}, got {actual}")]
    #[diagnostic(code(spectest::script::type_mismatch))]
    TypeMismatch {
        atom: String,
        expected: String,
        actual: String,
    },

    #[error("{atom}: expected {expected} argument(s), got {actual}")]
    #[diagnostic(code(spectest::script::arity))]
    Arity {
        atom: String,
        expected: String,
        actual: usize,
    },

    #[error("malformed {form}: {message}")]
    #[diagnostic(code(spectest::script::malformed_form))]
    MalformedForm { form: String, message: String },

    #[error("{0} is not callable")]
    #[diagnostic(code(spectest::script::not_callable))]
    NotCallable(String),

    #[error("division by zero")]
    #[diagnostic(code(spectest::script::division_by_zero))]
    DivisionByZero,

    #[error("evaluation exceeded the maximum depth of {limit}")]
    #[diagnostic(
        code(spectest::script::depth_exceeded),
        help("check the assertion function for unbounded recursion")
    )]
    DepthExceeded { limit: usize },

    #[error("evaluation exhausted its budget of {limit} steps")]
    #[diagnostic(
        code(spectest::script::step_budget),
        help("check the assertion function for unbounded loops")
    )]
    StepBudgetExhausted { limit: usize },

    #[error("invalid regular expression '{pattern}': {message}")]
    #[diagnostic(code(spectest::script::invalid_pattern))]
    InvalidPattern { pattern: String, message: String },

    #[error("{message}")]
    #[diagnostic(code(spectest::script::raised))]
    Raised { message: String },

    #[error("cannot convert {type_name} to JSON")]
    #[diagnostic(code(spectest::script::not_serializable))]
    NotSerializable { type_name: &'static str },
}

impl ScriptError {
    pub fn type_mismatch(atom: &str, expected: &str, actual: &str) -> Self {
        ScriptError::TypeMismatch {
            atom: atom.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn arity(atom: &str, expected: impl ToString, actual: usize) -> Self {
        ScriptError::Arity {
            atom: atom.to_string(),
            expected: expected.to_string(),
            actual,
        }
    }

    pub fn malformed(form: &str, message: impl Into<String>) -> Self {
        ScriptError::MalformedForm {
            form: form.to_string(),
            message: message.into(),
        }
    }
}
