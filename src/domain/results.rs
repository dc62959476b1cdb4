//! Core domain models for validation results and result filters
//!
//! Architecture: Value Objects - Results and filters are compared structurally
//! - ValidationResultItem is one diagnostic reported by the server
//! - ValidationFilter hides every item sharing its (severity, source) pair
//! - ValidationError is the single error taxonomy for every client operation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordinal severity of a diagnostic as reported by the server
///
/// The named constants follow the diagnostic bit values used by the server,
/// but any ordinal is accepted so filters can name arbitrary codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Severity(pub i32);

impl Severity {
    pub const OK: Severity = Severity(0);
    pub const INFO: Severity = Severity(1);
    pub const WARNING: Severity = Severity(2);
    pub const ERROR: Severity = Severity(4);
    pub const CANCEL: Severity = Severity(8);

    /// Raw ordinal value
    pub fn ordinal(self) -> i32 {
        self.0
    }

    /// Whether this severity denotes an error or a cancelled validation
    pub fn is_blocking(self) -> bool {
        self.0 >= Self::ERROR.0
    }

    /// Convert to string for display
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OK => "ok",
            Self::INFO => "info",
            Self::WARNING => "warning",
            Self::ERROR => "error",
            Self::CANCEL => "cancel",
            _ => "custom",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            "custom" => write!(f, "{}", self.0),
            name => f.write_str(name),
        }
    }
}

impl FromStr for Severity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ok" => Ok(Self::OK),
            "info" => Ok(Self::INFO),
            "warning" | "warn" => Ok(Self::WARNING),
            "error" => Ok(Self::ERROR),
            "cancel" => Ok(Self::CANCEL),
            other => other
                .parse::<i32>()
                .map(Severity)
                .map_err(|_| ValidationError::config(format!("Unknown severity '{s}'"))),
        }
    }
}

/// A single diagnostic produced by the validation server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResultItem {
    /// Severity ordinal of this issue
    pub severity: Severity,
    /// Validator or namespace that produced the issue
    pub source: String,
    /// Validator specific diagnostic code
    pub code: i32,
    /// Human-readable description
    pub message: String,
    /// Identifier of the offending model element, if the server sent one
    pub element_id: Option<String>,
}

impl ValidationResultItem {
    /// Create a new result item
    pub fn new(severity: Severity, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            source: source.into(),
            code: 0,
            message: message.into(),
            element_id: None,
        }
    }

    /// Set the diagnostic code
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }

    /// Attach the offending element reference
    pub fn with_element(mut self, element_id: impl Into<String>) -> Self {
        self.element_id = Some(element_id.into());
        self
    }

    /// Whether this item is blocking
    pub fn is_blocking(&self) -> bool {
        self.severity.is_blocking()
    }

    /// Format item for display
    pub fn format_display(&self) -> String {
        let element = match &self.element_id {
            Some(id) => format!(" ({id})"),
            None => String::new(),
        };

        format!("[{}] {}{} <{}>", self.severity, self.message, element, self.source)
    }
}

/// Predicate hiding every result item with the same severity and source
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValidationFilter {
    pub severity: Severity,
    pub source: String,
}

impl ValidationFilter {
    pub fn new(severity: impl Into<Severity>, source: impl Into<String>) -> Self {
        Self {
            severity: severity.into(),
            source: source.into(),
        }
    }

    /// Whether this filter hides the given item
    pub fn matches(&self, item: &ValidationResultItem) -> bool {
        self.severity == item.severity && self.source == item.source
    }
}

impl From<i32> for Severity {
    fn from(value: i32) -> Self {
        Severity(value)
    }
}

impl fmt::Display for ValidationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.severity.ordinal(), self.source)
    }
}

impl FromStr for ValidationFilter {
    type Err = ValidationError;

    /// Parse `<severity>:<source>`; the source itself may contain colons
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (severity, source) = s.split_once(':').ok_or_else(|| {
            ValidationError::config(format!("Filter '{s}' must have the form <severity>:<source>"))
        })?;

        let source = source.trim();
        if source.is_empty() {
            return Err(ValidationError::config(format!("Filter '{s}' has an empty source")));
        }

        Ok(Self::new(severity.parse::<Severity>()?, source))
    }
}

/// Error types that can occur while talking to the validation server
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Constraint or validation fetch failed, or returned malformed data
    #[error("Fetch error: {message}")]
    Fetch { message: String },

    /// A pushed diagnostic could not be parsed
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// The validation triggered when a subscription opened failed
    #[error("Subscription open error: {message}")]
    SubscriptionOpen { message: String },

    /// The notification channel could not be established
    #[error("Subscription error: {message}")]
    Subscription { message: String },

    /// Configuration file could not be loaded or parsed
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Constraint snapshot could not be read or written
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// File could not be read or accessed
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl ValidationError {
    /// Create a fetch error
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch {
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create a subscription open error
    pub fn subscription_open(message: impl Into<String>) -> Self {
        Self::SubscriptionOpen {
            message: message.into(),
        }
    }

    /// Create a subscription error
    pub fn subscription(message: impl Into<String>) -> Self {
        Self::Subscription {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a cache error
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }
}

/// Result type for client operations
pub type ValidationResult<T> = Result<T, ValidationError>;
