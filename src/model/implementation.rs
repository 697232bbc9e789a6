//! `Implementation` documents: the programs under test and how to run them.

use serde::{Deserialize, Serialize};

use crate::model::metadata::{validate_header, Metadata};
use crate::model::KIND_IMPLEMENTATION;
use crate::validation::{assert_distinct, assert_not_blank, FieldPath, Findings, OneOf, Validate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Implementation {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    #[serde(default)]
    pub variants: Vec<ImplementationVariant>,
}

/// One runnable configuration of an implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ImplementationVariant {
    pub metadata: Metadata,
    #[serde(default)]
    pub runtime: RuntimeSource,
    /// Names of the specifications this variant claims to satisfy.
    #[serde(default)]
    pub specifications: Vec<String>,
    /// Argument tokens; `$(PROGRAM)` and `$(PROGRAM_PATH)` are substituted
    /// per test.
    #[serde(default)]
    pub test_command: Vec<String>,
}

/// Where the variant's program comes from. Only `local` exists today.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RuntimeSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalRuntime>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalRuntime {}

impl Validate for Implementation {
    fn validate(&self, path: &FieldPath, findings: &mut Findings) {
        validate_header(
            &self.api_version,
            &self.kind,
            KIND_IMPLEMENTATION,
            &self.metadata,
            path,
            findings,
        );

        let variants_path = path.field("variants");
        if self.variants.is_empty() {
            findings.error(&variants_path, "must supply at least one variant");
        }
        for (idx, variant) in self.variants.iter().enumerate() {
            variant.validate(&variants_path.index(idx), findings);
        }
        assert_distinct(
            findings,
            &variants_path,
            &self.variants,
            |v| v.metadata.name.clone(),
            &["metadata.name"],
        );
    }
}

impl Validate for ImplementationVariant {
    fn validate(&self, path: &FieldPath, findings: &mut Findings) {
        self.metadata.validate(&path.field("metadata"), findings);

        OneOf::new()
            .field("local", self.runtime.local.is_some())
            .validate(findings, &path.field("runtime"));

        let specs_path = path.field("specifications");
        if self.specifications.is_empty() {
            findings.error(&specs_path, "must reference at least one specification");
        }
        for (idx, name) in self.specifications.iter().enumerate() {
            assert_not_blank(findings, &specs_path.index(idx), name);
        }

        let command_path = path.field("testCommand");
        match self.test_command.first() {
            None => findings.error(&command_path, "must not be empty"),
            Some(program) => assert_not_blank(findings, &command_path.index(0), program),
        }
        if !self
            .test_command
            .iter()
            .any(|t| t.contains("$(PROGRAM)") || t.contains("$(PROGRAM_PATH)"))
        {
            findings.warning(
                &command_path,
                "does not reference $(PROGRAM) or $(PROGRAM_PATH); every test will run the same command",
            );
        }
    }
}
