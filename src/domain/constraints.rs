//! Facet constraints describing how a model feature may be validated

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sentinel for numeric bounds that were not set
pub const UNSET_BOUND: i32 = -1;

/// White space facet value meaning "unspecified"
pub const WHITE_SPACE_UNSPECIFIED: i32 = 0;

/// Validation metadata for one (classifier, feature) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FacetConstraint {
    pub white_space: i32,
    pub enumeration: Vec<String>,
    pub pattern: Vec<String>,
    pub total_digits: i32,
    pub fraction_digits: i32,
    pub length: i32,
    pub min_length: i32,
    pub max_length: i32,
    pub min_exclusive: Option<String>,
    pub max_exclusive: Option<String>,
    pub min_inclusive: Option<String>,
    pub max_inclusive: Option<String>,
}

impl Default for FacetConstraint {
    fn default() -> Self {
        Self {
            white_space: WHITE_SPACE_UNSPECIFIED,
            enumeration: Vec::new(),
            pattern: Vec::new(),
            total_digits: UNSET_BOUND,
            fraction_digits: UNSET_BOUND,
            length: UNSET_BOUND,
            min_length: UNSET_BOUND,
            max_length: UNSET_BOUND,
            min_exclusive: None,
            max_exclusive: None,
            min_inclusive: None,
            max_inclusive: None,
        }
    }
}

impl FacetConstraint {
    pub fn is_white_space_default(&self) -> bool {
        self.white_space == WHITE_SPACE_UNSPECIFIED
    }

    pub fn is_enumeration_default(&self) -> bool {
        self.enumeration.is_empty()
    }

    pub fn is_pattern_default(&self) -> bool {
        self.pattern.is_empty()
    }

    pub fn is_total_digits_default(&self) -> bool {
        self.total_digits == UNSET_BOUND
    }

    pub fn is_fraction_digits_default(&self) -> bool {
        self.fraction_digits == UNSET_BOUND
    }

    pub fn is_length_default(&self) -> bool {
        self.length == UNSET_BOUND
    }

    pub fn is_min_length_default(&self) -> bool {
        self.min_length == UNSET_BOUND
    }

    pub fn is_max_length_default(&self) -> bool {
        self.max_length == UNSET_BOUND
    }

    pub fn is_min_exclusive_default(&self) -> bool {
        self.min_exclusive.is_none()
    }

    pub fn is_max_exclusive_default(&self) -> bool {
        self.max_exclusive.is_none()
    }

    pub fn is_min_inclusive_default(&self) -> bool {
        self.min_inclusive.is_none()
    }

    pub fn is_max_inclusive_default(&self) -> bool {
        self.max_inclusive.is_none()
    }

    /// Whether no facet carries any information
    pub fn is_default(&self) -> bool {
        self.is_white_space_default()
            && self.is_enumeration_default()
            && self.is_pattern_default()
            && self.is_total_digits_default()
            && self.is_fraction_digits_default()
            && self.is_length_default()
            && self.is_min_length_default()
            && self.is_max_length_default()
            && self.is_min_exclusive_default()
            && self.is_max_exclusive_default()
            && self.is_min_inclusive_default()
            && self.is_max_inclusive_default()
    }

    /// Short summary of the facets that are set, for listings
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.is_white_space_default() {
            parts.push(format!("whiteSpace={}", self.white_space));
        }
        if !self.is_enumeration_default() {
            parts.push(format!("enumeration=[{}]", self.enumeration.join(", ")));
        }
        if !self.is_pattern_default() {
            parts.push(format!("pattern=[{}]", self.pattern.join(", ")));
        }
        for (name, value) in [
            ("totalDigits", self.total_digits),
            ("fractionDigits", self.fraction_digits),
            ("length", self.length),
            ("minLength", self.min_length),
            ("maxLength", self.max_length),
        ] {
            if value != UNSET_BOUND {
                parts.push(format!("{name}={value}"));
            }
        }
        for (name, value) in [
            ("minExclusive", &self.min_exclusive),
            ("maxExclusive", &self.max_exclusive),
            ("minInclusive", &self.min_inclusive),
            ("maxInclusive", &self.max_inclusive),
        ] {
            if let Some(value) = value {
                parts.push(format!("{name}={value}"));
            }
        }

        if parts.is_empty() {
            "(defaults)".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Classifier id -> feature id -> constraint
pub type ConstraintMap = HashMap<i32, HashMap<i32, FacetConstraint>>;
