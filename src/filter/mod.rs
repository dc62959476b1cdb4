//! Result filtering by (severity, source)
//!
//! Architectural Principle: Service Layer - FilterSet owns the active hide rules
//! - Filters are compared structurally, so the set never holds duplicates
//! - Mutations report whether they changed anything but never fail
//! - Membership is the only question result views ask

use crate::domain::results::{ValidationFilter, ValidationResult, ValidationResultItem};
use std::collections::BTreeSet;

/// The active set of validation filters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    filters: BTreeSet<ValidationFilter>,
}

impl FilterSet {
    /// Create an empty filter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filter set from `<severity>:<source>` strings
    pub fn from_specs<I, S>(specs: I) -> ValidationResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for spec in specs {
            set.filters.insert(spec.as_ref().parse()?);
        }
        Ok(set)
    }

    /// Insert filters; already active ones are left alone
    pub fn add<I: IntoIterator<Item = ValidationFilter>>(&mut self, filters: I) -> bool {
        let mut changed = false;
        for filter in filters {
            changed |= self.filters.insert(filter);
        }
        changed
    }

    /// Remove filters; inactive ones are ignored
    pub fn remove<'a, I: IntoIterator<Item = &'a ValidationFilter>>(&mut self, filters: I) -> bool {
        let mut changed = false;
        for filter in filters {
            changed |= self.filters.remove(filter);
        }
        changed
    }

    /// Flip a filter; returns whether it is active afterwards
    pub fn toggle(&mut self, filter: ValidationFilter) -> bool {
        if self.filters.remove(&filter) {
            false
        } else {
            self.filters.insert(filter);
            true
        }
    }

    /// Whether some active filter hides this item
    pub fn matches(&self, item: &ValidationResultItem) -> bool {
        self.filters.iter().any(|filter| filter.matches(item))
    }

    pub fn contains(&self, filter: &ValidationFilter) -> bool {
        self.filters.contains(filter)
    }

    /// Active filters in (severity, source) order
    pub fn iter(&self) -> impl Iterator<Item = &ValidationFilter> {
        self.filters.iter()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn clear(&mut self) {
        self.filters.clear();
    }
}

impl FromIterator<ValidationFilter> for FilterSet {
    fn from_iter<T: IntoIterator<Item = ValidationFilter>>(iter: T) -> Self {
        Self {
            filters: iter.into_iter().collect(),
        }
    }
}
