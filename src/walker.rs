//! Turns a specification's section tree into the filters that decide which
//! tests it requires.

use crate::errors::{HarnessError, Result};
use crate::filter::{Filter, Selectable};
use crate::model::specification::{SectionContent, SpecificationSection};
use crate::model::Specification;

/// One filter per leaf section, depth-first in document order.
pub fn collect_test_filters(specification: &Specification) -> Result<Vec<Filter>> {
    let mut filters = Vec::new();
    walk_sections(specification, &specification.sections, &mut filters)?;
    Ok(filters)
}

fn walk_sections(
    specification: &Specification,
    sections: &[SpecificationSection],
    filters: &mut Vec<Filter>,
) -> Result<()> {
    for section in sections {
        match &section.content {
            SectionContent::Leaf(selector) => {
                let selector = selector.parse().map_err(|e| {
                    HarnessError::selector(
                        format!(
                            "section '{}' of specification '{}'",
                            section.metadata.name, specification.metadata.name
                        ),
                        e,
                    )
                })?;
                filters.push(Filter::new().with_selector(&selector));
            }
            SectionContent::Group(children) => walk_sections(specification, children, filters)?,
        }
    }
    Ok(())
}

pub fn collect_exclusion_filters(specification: &Specification) -> Result<Vec<Filter>> {
    specification
        .exclusions
        .iter()
        .map(|exclusion| {
            let selector = exclusion.test_selector.parse().map_err(|e| {
                HarnessError::selector(
                    format!(
                        "exclusion '{}' of specification '{}'",
                        exclusion.metadata.name, specification.metadata.name
                    ),
                    e,
                )
            })?;
            Ok(Filter::new().with_selector(&selector))
        })
        .collect()
}

/// What a specification requires: tests matched by any section and by no
/// exclusion.
#[derive(Debug, Clone)]
pub struct Requirements {
    include: Vec<Filter>,
    exclude: Vec<Filter>,
}

impl Requirements {
    pub fn for_specification(specification: &Specification) -> Result<Self> {
        Ok(Requirements {
            include: collect_test_filters(specification)?,
            exclude: collect_exclusion_filters(specification)?,
        })
    }

    pub fn requires<T: Selectable + ?Sized>(&self, item: &T) -> bool {
        self.include.iter().any(|f| f.matches(item)) && !self.exclude.iter().any(|f| f.matches(item))
    }

    /// The required items, in input order.
    pub fn required<'a, T: Selectable>(&self, items: &'a [T]) -> Vec<&'a T> {
        items.iter().filter(|item| self.requires(*item)).collect()
    }
}
