//! `Specification` documents: named compliance targets made of sections.

use serde::{Deserialize, Serialize};

use crate::model::metadata::{validate_header, LabelSelector, Metadata};
use crate::model::KIND_SPECIFICATION;
use crate::validation::{assert_distinct, FieldPath, Findings, Validate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Specification {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    #[serde(default)]
    pub sections: Vec<SpecificationSection>,
    /// Tests matching any exclusion are never required, whatever the
    /// sections select.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclusions: Vec<SpecificationExclusion>,
}

/// A grouping node (`sections`) or a leaf bound to one `testSelector`.
///
/// Documents that set both or neither are rejected when decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSection", into = "RawSection")]
pub struct SpecificationSection {
    pub metadata: Metadata,
    pub optional: bool,
    pub content: SectionContent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SectionContent {
    Leaf(LabelSelector),
    /// An empty group requires nothing.
    Group(Vec<SpecificationSection>),
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawSection {
    metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    test_selector: Option<LabelSelector>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sections: Option<Vec<SpecificationSection>>,
}

impl TryFrom<RawSection> for SpecificationSection {
    type Error = String;

    fn try_from(raw: RawSection) -> Result<Self, Self::Error> {
        let content = match (raw.test_selector, raw.sections) {
            (Some(selector), None) => SectionContent::Leaf(selector),
            (None, Some(sections)) => SectionContent::Group(sections),
            (Some(_), Some(_)) => {
                return Err(format!(
                    "section '{}' sets both testSelector and sections",
                    raw.metadata.name
                ))
            }
            (None, None) => {
                return Err(format!(
                    "section '{}' requires one of testSelector or sections",
                    raw.metadata.name
                ))
            }
        };
        Ok(SpecificationSection {
            metadata: raw.metadata,
            optional: raw.optional,
            content,
        })
    }
}

impl From<SpecificationSection> for RawSection {
    fn from(section: SpecificationSection) -> Self {
        let (test_selector, sections) = match section.content {
            SectionContent::Leaf(selector) => (Some(selector), None),
            SectionContent::Group(sections) => (None, Some(sections)),
        };
        RawSection {
            metadata: section.metadata,
            test_selector,
            optional: section.optional,
            sections,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SpecificationExclusion {
    pub metadata: Metadata,
    pub test_selector: LabelSelector,
}

impl Validate for Specification {
    fn validate(&self, path: &FieldPath, findings: &mut Findings) {
        validate_header(
            &self.api_version,
            &self.kind,
            KIND_SPECIFICATION,
            &self.metadata,
            path,
            findings,
        );

        let sections_path = path.field("sections");
        if self.sections.is_empty() {
            findings.warning(&sections_path, "specification has no sections");
        }
        validate_sections(&self.sections, &sections_path, findings);

        let exclusions_path = path.field("exclusions");
        for (idx, exclusion) in self.exclusions.iter().enumerate() {
            let entry = exclusions_path.index(idx);
            exclusion.metadata.validate(&entry.field("metadata"), findings);
            exclusion
                .test_selector
                .validate(&entry.field("testSelector"), findings);
        }
    }
}

fn validate_sections(sections: &[SpecificationSection], path: &FieldPath, findings: &mut Findings) {
    for (idx, section) in sections.iter().enumerate() {
        let entry = path.index(idx);
        section.metadata.validate(&entry.field("metadata"), findings);
        match &section.content {
            SectionContent::Leaf(selector) => selector.validate(&entry.field("testSelector"), findings),
            SectionContent::Group(children) => {
                let children_path = entry.field("sections");
                if children.is_empty() {
                    findings.warning(&children_path, "section selects no tests");
                }
                validate_sections(children, &children_path, findings);
            }
        }
    }
    assert_distinct(
        findings,
        path,
        sections,
        |s| s.metadata.name.clone(),
        &["metadata.name"],
    );
}
