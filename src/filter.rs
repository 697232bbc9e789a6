//! Id-and-label filters over tests, implementations and specifications.

use std::collections::BTreeSet;

use crate::hydrate::HydratedTestCase;
use crate::model::{Implementation, Labels, Specification};
use crate::selector::Selector;

/// Anything a [`Filter`] can judge.
pub trait Selectable {
    fn uid(&self) -> &str;
    fn labels(&self) -> &Labels;
}

impl Selectable for HydratedTestCase {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn labels(&self) -> &Labels {
        &self.labels
    }
}

impl Selectable for Implementation {
    fn uid(&self) -> &str {
        &self.metadata.name
    }

    fn labels(&self) -> &Labels {
        &self.metadata.labels
    }
}

impl Selectable for Specification {
    fn uid(&self) -> &str {
        &self.metadata.name
    }

    fn labels(&self) -> &Labels {
        &self.metadata.labels
    }
}

/// Matches by id set and label selector; both must accept when both are set.
///
/// An empty id set accepts every id. A non-empty one rejects ids outside it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    uids: BTreeSet<String>,
    selector: Option<Selector>,
}

impl Filter {
    /// Matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uids.insert(uid.into());
        self
    }

    pub fn with_selector(mut self, selector: &Selector) -> Self {
        self.selector = Some(match self.selector.take() {
            Some(existing) => existing.and(selector),
            None => selector.clone(),
        });
        self
    }

    pub fn matches<T: Selectable + ?Sized>(&self, item: &T) -> bool {
        if !self.uids.is_empty() && !self.uids.contains(item.uid()) {
            return false;
        }
        match &self.selector {
            Some(selector) => selector.matches(item.labels()),
            None => true,
        }
    }

    /// The matching items, in input order.
    pub fn apply<'a, T: Selectable>(&self, items: &'a [T]) -> Vec<&'a T> {
        items.iter().filter(|item| self.matches(*item)).collect()
    }

    pub fn for_each<T: Selectable>(&self, items: &[T], mut visit: impl FnMut(&T)) {
        for item in items {
            if self.matches(item) {
                visit(item);
            }
        }
    }
}
