//! Constraint caching for a single model
//!
//! CDD Principle: Infrastructure Layer - Cache keeps server constraints close to the UI
//! - ConstraintCache holds the two-level classifier/feature map of facet constraints
//! - The map is replaced wholesale on every successful fetch, never merged
//! - Snapshots let tooling keep constraints locally between runs

use crate::domain::constraints::{ConstraintMap, FacetConstraint};
use crate::domain::results::{ValidationError, ValidationResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const SNAPSHOT_VERSION: u32 = 1;

/// Facet constraints per (classifier id, feature id)
#[derive(Debug, Default)]
pub struct ConstraintCache {
    /// The populated map, `None` until the first successful fetch
    constraints: Option<ConstraintMap>,
    /// When the map was last replaced
    populated_at: Option<DateTime<Utc>>,
}

/// Serializable snapshot of a populated cache
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheSnapshot {
    /// Snapshot format version for migration support
    version: u32,
    /// Model the constraints were fetched for
    model_uri: String,
    /// When the constraints were fetched
    fetched_at: DateTime<Utc>,
    constraints: ConstraintMap,
}

impl ConstraintCache {
    /// Create an empty, unpopulated cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Deserialize a server constraint payload and replace the cache with it
    ///
    /// On error the previous contents stay untouched.
    pub fn populate(&mut self, data: JsonValue) -> ValidationResult<()> {
        let constraints: ConstraintMap = serde_json::from_value(data)
            .map_err(|e| ValidationError::fetch(format!("Malformed constraint map: {e}")))?;

        self.replace(constraints);
        Ok(())
    }

    /// Replace the whole map
    pub fn replace(&mut self, constraints: ConstraintMap) {
        tracing::debug!(
            classifiers = constraints.len(),
            constraints = count_constraints(&constraints),
            "Replacing constraint cache"
        );
        self.constraints = Some(constraints);
        self.populated_at = Some(Utc::now());
    }

    /// Look up the constraint recorded for a classifier feature
    pub fn lookup(&self, classifier_id: i32, feature_id: i32) -> Option<&FacetConstraint> {
        self.constraints
            .as_ref()?
            .get(&classifier_id)?
            .get(&feature_id)
    }

    /// All feature constraints recorded for a classifier
    pub fn classifier(&self, classifier_id: i32) -> Option<&HashMap<i32, FacetConstraint>> {
        self.constraints.as_ref()?.get(&classifier_id)
    }

    /// Whether a fetch has succeeded at least once
    pub fn is_populated(&self) -> bool {
        self.constraints.is_some()
    }

    /// Number of recorded constraints across all classifiers
    pub fn len(&self) -> usize {
        self.constraints.as_ref().map(count_constraints).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over `(classifier, feature, constraint)` sorted by ids
    pub fn iter(&self) -> impl Iterator<Item = (i32, i32, &FacetConstraint)> {
        let mut entries: Vec<_> = self
            .constraints
            .iter()
            .flat_map(|map| map.iter())
            .flat_map(|(classifier, features)| {
                features
                    .iter()
                    .map(move |(feature, constraint)| (*classifier, *feature, constraint))
            })
            .collect();
        entries.sort_by_key(|(classifier, feature, _)| (*classifier, *feature));
        entries.into_iter()
    }

    /// Get cache statistics
    pub fn statistics(&self) -> CacheStatistics {
        CacheStatistics {
            classifiers: self.constraints.as_ref().map(HashMap::len).unwrap_or(0),
            constraints: self.len(),
            populated_at: self.populated_at,
        }
    }

    /// Write the populated map to a JSON snapshot file
    pub fn save_snapshot<P: AsRef<Path>>(&self, path: P, model_uri: &str) -> ValidationResult<()> {
        let path = path.as_ref();
        let constraints = self
            .constraints
            .clone()
            .ok_or_else(|| ValidationError::cache("Constraint cache is not populated"))?;

        let snapshot = CacheSnapshot {
            version: SNAPSHOT_VERSION,
            model_uri: model_uri.to_string(),
            fetched_at: self.populated_at.unwrap_or_else(Utc::now),
            constraints,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ValidationError::cache(format!("Failed to create snapshot directory: {}", e))
            })?;
        }

        let content = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| ValidationError::cache(format!("Failed to serialize snapshot: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| ValidationError::cache(format!("Failed to write snapshot file: {}", e)))?;

        Ok(())
    }

    /// Replace the cache with a snapshot previously saved for `model_uri`
    pub fn load_snapshot<P: AsRef<Path>>(&mut self, path: P, model_uri: &str) -> ValidationResult<()> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| ValidationError::cache(format!("Failed to read snapshot file: {}", e)))?;

        let snapshot: CacheSnapshot = serde_json::from_str(&content)
            .map_err(|e| ValidationError::cache(format!("Failed to parse snapshot file: {}", e)))?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(ValidationError::cache(format!(
                "Unsupported snapshot version: {}. Please delete the snapshot file.",
                snapshot.version
            )));
        }

        if snapshot.model_uri != model_uri {
            return Err(ValidationError::cache(format!(
                "Snapshot belongs to model '{}', not '{}'",
                snapshot.model_uri, model_uri
            )));
        }

        self.replace(snapshot.constraints);
        self.populated_at = Some(snapshot.fetched_at);
        Ok(())
    }
}

fn count_constraints(map: &ConstraintMap) -> usize {
    map.values().map(HashMap::len).sum()
}

/// Cache usage statistics
#[derive(Debug, Clone)]
pub struct CacheStatistics {
    pub classifiers: usize,
    pub constraints: usize,
    pub populated_at: Option<DateTime<Utc>>,
}

impl CacheStatistics {
    /// Format statistics for display
    pub fn format_display(&self) -> String {
        match self.populated_at {
            Some(at) => format!(
                "Constraints: {} across {} classifiers, fetched {}",
                self.constraints,
                self.classifiers,
                at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            None => "Constraints: not fetched".to_string(),
        }
    }
}
