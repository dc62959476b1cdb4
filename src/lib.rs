//! Model Validation Client - Live validation state for remote model servers
//!
//! Architecture: Clean Architecture - Library interface serves as the application layer
//! - Pure domain values separated from the server transport
//! - ValidationFramework keeps constraints, filters and results consistent under one lock
//! - SubscriptionListener feeds server pushes into the same framework

pub mod cache;
pub mod client;
pub mod config;
pub mod diagnostic;
pub mod domain;
pub mod filter;
pub mod report;
pub mod results;
pub mod subscription;

// Re-export main types for convenient access
pub use domain::constraints::{ConstraintMap, FacetConstraint};
pub use domain::results::{
    Severity, ValidationError, ValidationFilter, ValidationResult, ValidationResultItem,
};

pub use cache::{CacheStatistics, ConstraintCache};
pub use client::{
    ModelServerApi, ModelServerClient, ModelServerNotification, SubscriptionEvent,
    VALIDATION_RESULT_KIND,
};
pub use config::{ClientConfig, ConfigBuilder, ServerConfig};
pub use diagnostic::Diagnostic;
pub use filter::FilterSet;
pub use report::{OutputFormat, ReportFormatter, ResultsView};
pub use results::{ChangeListener, ResultStore};
pub use subscription::{SubscriptionListener, SubscriptionSummary};

use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// Everything guarded by the framework lock
#[derive(Debug)]
struct FrameworkState {
    constraints: ConstraintCache,
    filters: FilterSet,
    results: ResultStore,
    /// Last sequence number handed out to an update
    issued: u64,
    /// Sequence number of the update the raw set currently reflects
    applied: u64,
}

impl FrameworkState {
    fn begin_update(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Install a raw set unless a newer update has already landed
    fn apply(&mut self, sequence: u64, items: Vec<ValidationResultItem>) -> bool {
        if sequence < self.applied {
            return false;
        }
        self.applied = sequence;
        self.results.set_raw(items, &self.filters);
        true
    }

    fn recompute(&mut self) {
        self.results.recompute(&self.filters);
    }
}

/// Validation state of one model on a remote server
///
/// All four pieces of state (constraint cache, filter set, raw results and
/// the filtered view) sit behind a single lock. The change listener runs
/// while that lock is held, so it must not call back into the framework at
/// all (see `ChangeListener`).
pub struct ValidationFramework {
    model_uri: String,
    api: Arc<dyn ModelServerApi>,
    state: Mutex<FrameworkState>,
}

impl ValidationFramework {
    /// Create a framework bound to `model_uri`
    pub fn new(
        model_uri: impl Into<String>,
        api: Arc<dyn ModelServerApi>,
        listener: impl ChangeListener + 'static,
    ) -> Self {
        Self {
            model_uri: model_uri.into(),
            api,
            state: Mutex::new(FrameworkState {
                constraints: ConstraintCache::new(),
                filters: FilterSet::new(),
                results: ResultStore::new(listener),
                issued: 0,
                applied: 0,
            }),
        }
    }

    /// Create a framework talking to the configured server with the configured filters
    pub fn from_config(
        config: &ClientConfig,
        listener: impl ChangeListener + 'static,
    ) -> ValidationResult<Self> {
        let client = ModelServerClient::new(&config.server)?;
        let framework = Self::new(config.model_uri.clone(), Arc::new(client), listener);
        framework.state().filters = config.initial_filters()?;
        Ok(framework)
    }

    pub fn model_uri(&self) -> &str {
        &self.model_uri
    }

    fn state(&self) -> MutexGuard<'_, FrameworkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch the constraint map and replace the cache with it
    ///
    /// The cache keeps its previous contents when the fetch fails.
    pub async fn get_constraint_list(&self) -> ValidationResult<()> {
        let data = self.api.fetch_constraints(&self.model_uri).await.map_err(|e| {
            tracing::warn!(model_uri = %self.model_uri, error = %e, "Constraint fetch failed");
            e
        })?;

        let mut state = self.state();
        state.constraints.populate(data)?;
        tracing::info!(
            model_uri = %self.model_uri,
            constraints = state.constraints.len(),
            "Constraint list updated"
        );
        Ok(())
    }

    /// Request a fresh diagnostic and publish it as the raw result set
    pub async fn validate(&self) -> ValidationResult<()> {
        let sequence = self.state().begin_update();

        let data = self.api.fetch_validation(&self.model_uri).await.map_err(|e| {
            tracing::warn!(model_uri = %self.model_uri, error = %e, "Validation request failed");
            e
        })?;

        let items = Diagnostic::from_value(data)
            .map_err(|e| {
                ValidationError::fetch(format!(
                    "Validation response for '{}' is malformed: {e}",
                    self.model_uri
                ))
            })?
            .into_items();

        let count = items.len();
        if self.state().apply(sequence, items) {
            tracing::info!(model_uri = %self.model_uri, issues = count, "Validation completed");
        } else {
            tracing::debug!(
                model_uri = %self.model_uri,
                sequence,
                "Discarding validation response superseded by a newer update"
            );
        }
        Ok(())
    }

    /// Publish a pushed diagnostic; absent or empty payloads clear the results
    ///
    /// Returns the number of raw items now held. A malformed payload leaves
    /// the previous results in place.
    pub fn apply_diagnostic(&self, payload: Option<&str>) -> ValidationResult<usize> {
        let items = match payload {
            Some(payload) => diagnostic::parse_items(payload)?,
            None => Vec::new(),
        };

        let count = items.len();
        let mut state = self.state();
        let sequence = state.begin_update();
        state.apply(sequence, items);
        Ok(count)
    }

    /// Activate filters and recompute the visible results
    pub fn add_validation_filter<I>(&self, filters: I)
    where
        I: IntoIterator<Item = ValidationFilter>,
    {
        let mut state = self.state();
        state.filters.add(filters);
        state.recompute();
    }

    /// Deactivate filters and recompute the visible results
    pub fn remove_validation_filter<'a, I>(&self, filters: I)
    where
        I: IntoIterator<Item = &'a ValidationFilter>,
    {
        let mut state = self.state();
        state.filters.remove(filters);
        state.recompute();
    }

    /// Flip one filter and recompute the visible results
    pub fn toggle_validation_filter(&self, filter: ValidationFilter) {
        let mut state = self.state();
        state.filters.toggle(filter);
        state.recompute();
    }

    /// Open the server's notification channel for this model
    pub async fn subscribe(&self) -> ValidationResult<mpsc::Receiver<SubscriptionEvent>> {
        self.api.subscribe(&self.model_uri).await
    }

    /// Results left visible by the active filters
    pub fn recent_validation_result(&self) -> Vec<ValidationResultItem> {
        self.state().results.filtered().to_vec()
    }

    /// Unfiltered results of the latest validation cycle
    pub fn raw_validation_result(&self) -> Vec<ValidationResultItem> {
        self.state().results.raw().to_vec()
    }

    /// Consistent snapshot of the visible results for reporting
    pub fn results_view(&self) -> ResultsView {
        let state = self.state();
        ResultsView {
            model_uri: self.model_uri.clone(),
            visible: state.results.filtered().to_vec(),
            raw_count: state.results.raw().len(),
            filters: state.filters.iter().cloned().collect(),
            validated_at: state.results.updated_at(),
        }
    }

    /// When the results were last replaced
    pub fn last_validated(&self) -> Option<DateTime<Utc>> {
        self.state().results.updated_at()
    }

    /// Constraint recorded for a classifier feature
    pub fn constraint(&self, classifier_id: i32, feature_id: i32) -> Option<FacetConstraint> {
        self.state().constraints.lookup(classifier_id, feature_id).cloned()
    }

    /// Every cached constraint, sorted by classifier and feature
    pub fn constraints(&self) -> Vec<(i32, i32, FacetConstraint)> {
        self.state()
            .constraints
            .iter()
            .map(|(classifier, feature, constraint)| (classifier, feature, constraint.clone()))
            .collect()
    }

    pub fn has_constraints(&self) -> bool {
        self.state().constraints.is_populated()
    }

    pub fn active_filters(&self) -> Vec<ValidationFilter> {
        self.state().filters.iter().cloned().collect()
    }

    pub fn cache_statistics(&self) -> CacheStatistics {
        self.state().constraints.statistics()
    }

    /// Persist the cached constraints
    pub fn save_constraints<P: AsRef<Path>>(&self, path: P) -> ValidationResult<()> {
        self.state().constraints.save_snapshot(path, &self.model_uri)
    }

    /// Replace the cached constraints with a saved snapshot
    pub fn load_constraints<P: AsRef<Path>>(&self, path: P) -> ValidationResult<()> {
        self.state().constraints.load_snapshot(path, &self.model_uri)
    }
}

impl std::fmt::Debug for ValidationFramework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationFramework")
            .field("model_uri", &self.model_uri)
            .field("state", &*self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{self, MockModelServer, SOURCE};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio::sync::Notify;

    fn framework_with(server: Arc<MockModelServer>) -> (Arc<ValidationFramework>, Arc<AtomicUsize>) {
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        let framework = ValidationFramework::new(
            "test",
            server,
            move |_: &[ValidationResultItem]| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        (Arc::new(framework), notified)
    }

    fn setup() -> (Arc<ValidationFramework>, Arc<MockModelServer>, Arc<AtomicUsize>) {
        let server = Arc::new(MockModelServer::new());
        let (framework, notified) = framework_with(Arc::clone(&server));
        (framework, server, notified)
    }

    #[tokio::test]
    async fn test_constraint_list() -> ValidationResult<()> {
        let (framework, _, _) = setup();
        assert!(!framework.has_constraints());

        framework.get_constraint_list().await?;

        let constraint = framework.constraint(1, 5).unwrap();
        assert!(constraint.is_enumeration_default());
        assert!(!constraint.is_white_space_default());
        assert!(framework.constraint(1, 6).is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_constraint_fetch_keeps_cache() -> ValidationResult<()> {
        let (framework, server, _) = setup();
        framework.get_constraint_list().await?;

        server.set_constraints(None);
        assert!(matches!(
            framework.get_constraint_list().await,
            Err(ValidationError::Fetch { .. })
        ));

        server.set_constraints(Some(serde_json::json!("garbage")));
        assert!(framework.get_constraint_list().await.is_err());

        assert!(framework.constraint(1, 5).is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_validation() -> ValidationResult<()> {
        let (framework, _, notified) = setup();

        framework.validate().await?;

        assert_eq!(framework.recent_validation_result().len(), 2);
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert!(framework.last_validated().is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_validation_keeps_results() -> ValidationResult<()> {
        let (framework, server, notified) = setup();
        framework.validate().await?;

        server.set_validation(None);
        assert!(matches!(framework.validate().await, Err(ValidationError::Fetch { .. })));

        server.set_validation(Some(serde_json::json!({ "children": "nope" })));
        assert!(matches!(framework.validate().await, Err(ValidationError::Fetch { .. })));

        assert_eq!(framework.recent_validation_result().len(), 2);
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_redundant_validate_still_notifies() -> ValidationResult<()> {
        let (framework, _, notified) = setup();

        framework.validate().await?;
        let first = framework.recent_validation_result();
        framework.validate().await?;

        assert_eq!(framework.recent_validation_result(), first);
        assert_eq!(notified.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_filter() -> ValidationResult<()> {
        let (framework, _, notified) = setup();
        framework.validate().await?;
        assert_eq!(framework.recent_validation_result().len(), 2);

        framework.add_validation_filter(vec![ValidationFilter::new(29, SOURCE)]);
        let visible = framework.recent_validation_result();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].severity, Severity(6));
        assert_eq!(framework.raw_validation_result().len(), 2);

        framework.remove_validation_filter(&[ValidationFilter::new(29, SOURCE)]);
        assert_eq!(framework.recent_validation_result().len(), 2);

        framework.toggle_validation_filter(ValidationFilter::new(6, SOURCE));
        assert_eq!(framework.recent_validation_result().len(), 1);
        assert_eq!(framework.active_filters(), vec![ValidationFilter::new(6, SOURCE)]);

        let view = framework.results_view();
        assert_eq!(view.raw_count, 2);
        assert_eq!(view.hidden_count(), 1);
        assert!(view.has_errors());

        // validate + add + remove + toggle
        assert_eq!(notified.load(Ordering::SeqCst), 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_filter_batch_notifies_once() -> ValidationResult<()> {
        let (framework, _, notified) = setup();
        framework.validate().await?;

        framework.add_validation_filter(vec![
            ValidationFilter::new(29, SOURCE),
            ValidationFilter::new(6, SOURCE),
            ValidationFilter::new(6, SOURCE),
        ]);
        assert!(framework.recent_validation_result().is_empty());
        assert_eq!(framework.active_filters().len(), 2);

        framework.remove_validation_filter(&[ValidationFilter::new(1, "absent")]);
        assert_eq!(notified.load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_listener_receives_visible_results() -> ValidationResult<()> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let framework = ValidationFramework::new(
            "test",
            Arc::new(MockModelServer::new()),
            move |results: &[ValidationResultItem]| {
                *sink.lock().unwrap() = results.to_vec();
            },
        );

        framework.validate().await?;
        framework.add_validation_filter(vec![ValidationFilter::new(29, SOURCE)]);

        assert_eq!(*seen.lock().unwrap(), framework.recent_validation_result());
        assert_eq!(seen.lock().unwrap().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_view() -> ValidationResult<()> {
        let (framework, _, _) = setup();
        framework.validate().await?;
        let before = framework.recent_validation_result();

        let filter = ValidationFilter::new(29, SOURCE);
        framework.toggle_validation_filter(filter.clone());
        assert_ne!(framework.recent_validation_result(), before);
        framework.toggle_validation_filter(filter);

        assert_eq!(framework.recent_validation_result(), before);
        assert!(framework.active_filters().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_filters_apply_to_later_results() -> ValidationResult<()> {
        let (framework, _, _) = setup();
        framework.add_validation_filter(vec![ValidationFilter::new(6, SOURCE)]);
        assert!(framework.recent_validation_result().is_empty());

        framework.validate().await?;
        let visible = framework.recent_validation_result();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].severity, Severity(29));
        Ok(())
    }

    #[tokio::test]
    async fn test_apply_diagnostic() -> ValidationResult<()> {
        let (framework, _, _) = setup();
        framework.validate().await?;

        let payload = mock::empty_diagnostic().to_string();
        assert_eq!(framework.apply_diagnostic(Some(&payload))?, 0);
        assert!(framework.recent_validation_result().is_empty());

        let payload = mock::two_issue_diagnostic().to_string();
        assert_eq!(framework.apply_diagnostic(Some(&payload))?, 2);
        assert_eq!(framework.apply_diagnostic(None)?, 0);
        assert!(framework.raw_validation_result().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_diagnostic_keeps_results() -> ValidationResult<()> {
        let (framework, _, notified) = setup();
        framework.validate().await?;

        let result = framework.apply_diagnostic(Some("{\"children\": ["));
        assert!(matches!(result, Err(ValidationError::Parse { .. })));
        assert_eq!(framework.raw_validation_result().len(), 2);
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_validation_is_discarded() -> ValidationResult<()> {
        let gate = Arc::new(Notify::new());
        let server = Arc::new(MockModelServer::gated(Arc::clone(&gate)));
        let (framework, notified) = framework_with(Arc::clone(&server));

        let pending = {
            let framework = Arc::clone(&framework);
            tokio::spawn(async move { framework.validate().await })
        };

        // The request is in flight when the server pushes an all-clear
        server.entered.notified().await;
        framework.apply_diagnostic(Some(&mock::empty_diagnostic().to_string()))?;
        gate.notify_one();

        pending.await.expect("validate task panicked")?;

        assert!(framework.recent_validation_result().is_empty());
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert_eq!(server.validation_calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_constraint_snapshot() -> ValidationResult<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("constraints.json");

        let (framework, _, _) = setup();
        framework.get_constraint_list().await?;
        framework.save_constraints(&path)?;

        let (restored, _, _) = setup();
        restored.load_constraints(&path)?;
        assert_eq!(restored.constraint(1, 5), framework.constraint(1, 5));
        assert_eq!(restored.constraints().len(), 1);
        Ok(())
    }
}
