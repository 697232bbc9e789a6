//! Typed forms of the four suite documents.

pub mod implementation;
pub mod metadata;
pub mod specification;
pub mod suite;

pub use implementation::{Implementation, ImplementationVariant};
pub use metadata::{LabelSelector, Labels, Metadata};
pub use specification::{Specification, SpecificationExclusion, SpecificationSection};
pub use suite::TestSuiteDocument;
pub use test::{Test, TestCase, TestEntry};

pub const API_VERSION: &str = "compliancetest/v1";

pub const KIND_TEST_SUITE: &str = "TestSuite";
pub const KIND_SPECIFICATION: &str = "Specification";
pub const KIND_IMPLEMENTATION: &str = "Implementation";
pub const KIND_TEST: &str = "Test";
