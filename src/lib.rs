//! spectest: a template-driven conformance-test harness.
//!
//! A suite describes tests as trees of templates, specifications as trees of
//! label selectors, and implementations as commands. The harness hydrates the
//! templates into concrete cases, works out which cases each specification
//! requires, runs them through each implementation variant, and judges the
//! output with assertion functions written in a small embedded Lisp.

pub mod assertion;
pub mod cli;
pub mod errors;
pub mod executor;
pub mod filter;
pub mod hydrate;
pub mod model;
pub mod script;
pub mod selector;
pub mod storage;
pub mod validation;
pub mod walker;

pub use crate::errors::{HarnessError, Result};
pub use crate::executor::{execute, ExecutionOptions, RunReport, TestSuite};
pub use crate::storage::{load_suite, LoadedSuite};
