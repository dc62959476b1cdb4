//! Server diagnostic trees and their conversion into result items
//!
//! Architecture: Anti-Corruption Layer - The server's nested diagnostic format stays here
//! - Diagnostic mirrors the JSON the server emits
//! - Conversion flattens the tree into an ordered list of ValidationResultItem
//! - Empty or absent payloads mean "no outstanding issues"

use crate::domain::results::{Severity, ValidationError, ValidationResult, ValidationResultItem};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

/// A diagnostic node as serialized by the validation server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Diagnostic {
    pub severity: i32,
    pub source: Option<String>,
    pub code: i32,
    pub message: Option<String>,
    pub id: Option<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub data: Vec<JsonValue>,
    #[serde(deserialize_with = "null_as_empty")]
    pub children: Vec<Diagnostic>,
}

/// Servers emit `null` for empty lists on leaf diagnostics
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Diagnostic {
    /// Parse a diagnostic from its serialized string form
    ///
    /// Blank input and `null` both yield an empty root.
    pub fn parse(payload: &str) -> ValidationResult<Self> {
        let payload = payload.trim();
        if payload.is_empty() {
            return Ok(Self::default());
        }

        let value: JsonValue = serde_json::from_str(payload)
            .map_err(|e| ValidationError::parse(format!("Invalid diagnostic JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Build a diagnostic from an already decoded JSON value
    pub fn from_value(value: JsonValue) -> ValidationResult<Self> {
        match value {
            JsonValue::Null => Ok(Self::default()),
            // Some servers double encode the diagnostic as a JSON string
            JsonValue::String(inner) => Self::parse(&inner),
            other => serde_json::from_value(other)
                .map_err(|e| ValidationError::parse(format!("Malformed diagnostic: {e}"))),
        }
    }

    /// Flatten the tree into result items, pre-order, excluding the root summary
    pub fn into_items(self) -> Vec<ValidationResultItem> {
        let mut items = Vec::new();
        for child in self.children {
            child.collect_into(&mut items);
        }
        items
    }

    fn collect_into(self, items: &mut Vec<ValidationResultItem>) {
        let element_id = self.element_id();
        let mut item = ValidationResultItem::new(
            Severity(self.severity),
            self.source.unwrap_or_default(),
            self.message.unwrap_or_default(),
        )
        .with_code(self.code);
        item.element_id = element_id;
        items.push(item);

        for child in self.children {
            child.collect_into(items);
        }
    }

    /// Reference to the offending element: explicit id, else the first usable data entry
    fn element_id(&self) -> Option<String> {
        if let Some(id) = &self.id {
            return Some(id.clone());
        }

        self.data.iter().find_map(|entry| match entry {
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Object(map) => ["id", "$ref", "uri"]
                .iter()
                .find_map(|key| map.get(*key).and_then(JsonValue::as_str))
                .map(str::to_string),
            _ => None,
        })
    }
}

/// Parse a serialized diagnostic straight into result items
pub fn parse_items(payload: &str) -> ValidationResult<Vec<ValidationResultItem>> {
    Ok(Diagnostic::parse(payload)?.into_items())
}
