//! The assertion script language.
//!
//! A small Lisp with no I/O. Suites ship one script; each assertion names a
//! function defined in it.

pub mod atoms;
pub mod error;
pub mod eval;
pub mod parser;
pub mod value;

pub use error::ScriptError;
pub use eval::{Interpreter, Limits};
pub use parser::Program;
pub use value::Value;
