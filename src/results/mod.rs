//! Raw and filtered validation results
//!
//! Architecture: Aggregate Root - ResultStore keeps the raw set and its filtered view in step
//! - The raw set is replaced wholesale on every validation cycle
//! - The filtered view is always recomputed from the raw set and the current filters
//! - The change listener hears about every recompute, changed or not

use crate::domain::results::ValidationResultItem;
use crate::filter::FilterSet;
use chrono::{DateTime, Utc};

/// Callback invoked with the filtered view whenever it is recomputed
///
/// `changed` runs while the owning `ValidationFramework` holds its state lock,
/// which is not reentrant. Implementations must not call back into the
/// framework, getters included, or they deadlock. Everything a listener needs
/// is in `results`; hand work off to a channel when more is required.
pub trait ChangeListener: Send + Sync {
    fn changed(&self, results: &[ValidationResultItem]);
}

impl<F> ChangeListener for F
where
    F: Fn(&[ValidationResultItem]) + Send + Sync,
{
    fn changed(&self, results: &[ValidationResultItem]) {
        self(results)
    }
}

/// Most recent server results plus the view left after filtering
pub struct ResultStore {
    raw: Vec<ValidationResultItem>,
    filtered: Vec<ValidationResultItem>,
    updated_at: Option<DateTime<Utc>>,
    listener: Box<dyn ChangeListener>,
}

impl ResultStore {
    /// Create an empty store notifying `listener` on every recompute
    pub fn new(listener: impl ChangeListener + 'static) -> Self {
        Self {
            raw: Vec::new(),
            filtered: Vec::new(),
            updated_at: None,
            listener: Box::new(listener),
        }
    }

    /// Replace the raw set, recompute the view and notify
    pub fn set_raw(&mut self, items: Vec<ValidationResultItem>, filters: &FilterSet) {
        self.raw = items;
        self.updated_at = Some(Utc::now());
        self.recompute(filters);
    }

    /// Recompute the view against `filters` and notify
    pub fn recompute(&mut self, filters: &FilterSet) {
        self.recompute_filtered_view(filters);

        tracing::debug!(
            raw = self.raw.len(),
            visible = self.filtered.len(),
            filters = filters.len(),
            "Validation results recomputed"
        );
        self.listener.changed(&self.filtered);
    }

    /// Stable filter of the raw set; no notification
    fn recompute_filtered_view(&mut self, filters: &FilterSet) {
        self.filtered = self
            .raw
            .iter()
            .filter(|item| !filters.matches(item))
            .cloned()
            .collect();
    }

    /// Unfiltered results of the latest cycle
    pub fn raw(&self) -> &[ValidationResultItem] {
        &self.raw
    }

    /// Results left visible by the active filters
    pub fn filtered(&self) -> &[ValidationResultItem] {
        &self.filtered
    }

    /// When the raw set was last replaced
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

impl std::fmt::Debug for ResultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStore")
            .field("raw", &self.raw.len())
            .field("filtered", &self.filtered.len())
            .field("updated_at", &self.updated_at)
            .finish()
    }
}
