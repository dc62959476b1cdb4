//! Configuration loading and management for the validation client
//!
//! Architecture: Anti-Corruption Layer - Configuration translates external YAML formats
//! - Raw YAML structures are converted to clean domain objects
//! - Default configurations are embedded in the domain, not infrastructure
//! - Initial filters are written as `<severity>:<source>` strings

use crate::domain::results::{ValidationError, ValidationFilter, ValidationResult};
use crate::filter::FilterSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// File names probed when no configuration path is given
pub const DEFAULT_CONFIG_FILES: [&str; 3] =
    ["model_validation.yaml", "model_validation.yml", ".model_validation.yaml"];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Configuration format version
    pub version: String,
    /// Model server connection settings
    pub server: ServerConfig,
    /// Model the framework is bound to
    pub model_uri: String,
    /// Whether `watch` subscribes to live validation pushes
    #[serde(default = "default_true")]
    pub live_validation: bool,
    /// Filters active from startup
    #[serde(default)]
    pub filters: Vec<String>,
    /// Where constraint snapshots are kept
    #[serde(default)]
    pub constraint_snapshot: Option<String>,
}

/// Model server connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// REST API root, e.g. `http://localhost:8081/api/v1`
    pub base_url: String,
    /// WebSocket subscription endpoint; derived from `base_url` when absent
    #[serde(default)]
    pub subscribe_url: Option<String>,
    /// HTTP request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ServerConfig {
    /// Effective subscription endpoint
    pub fn subscribe_url(&self) -> String {
        if let Some(url) = &self.subscribe_url {
            return url.clone();
        }

        let base = self.base_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };
        format!("{base}/subscribe")
    }
}

impl ClientConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ValidationResult<Self> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            ValidationError::config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = serde_yaml::from_str(&contents).map_err(|e| {
            ValidationError::config(format!(
                "Failed to parse config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from string content
    pub fn load_from_str(content: &str) -> ValidationResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| ValidationError::config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Load the given file, else the first default file present, else defaults
    pub fn discover(path: Option<&Path>) -> ValidationResult<Self> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }

        for name in DEFAULT_CONFIG_FILES {
            if Path::new(name).exists() {
                tracing::debug!(file = name, "Using configuration file");
                return Self::load_from_file(name);
            }
        }

        Ok(Self::with_defaults())
    }

    /// Get default configuration for a local model server
    pub fn with_defaults() -> Self {
        Self {
            version: "1.0".to_string(),
            server: ServerConfig {
                base_url: "http://localhost:8081/api/v1".to_string(),
                subscribe_url: None,
                timeout_secs: default_timeout_secs(),
            },
            model_uri: "SuperBrewer3000.coffee".to_string(),
            live_validation: true,
            filters: Vec::new(),
            constraint_snapshot: None,
        }
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> ValidationResult<()> {
        if !["1.0"].contains(&self.version.as_str()) {
            return Err(ValidationError::config(format!(
                "Unsupported configuration version: {}. Supported versions: 1.0",
                self.version
            )));
        }

        let base_url = self.server.base_url.as_str();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ValidationError::config(format!(
                "Server base_url must be an http(s) URL, got '{base_url}'"
            )));
        }

        if let Some(url) = &self.server.subscribe_url {
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                return Err(ValidationError::config(format!(
                    "Server subscribe_url must be a ws(s) URL, got '{url}'"
                )));
            }
        }

        if self.server.timeout_secs == 0 {
            return Err(ValidationError::config("Server timeout_secs must be positive"));
        }

        if self.model_uri.trim().is_empty() {
            return Err(ValidationError::config("model_uri must not be empty"));
        }

        self.initial_filters()?;
        Ok(())
    }

    /// Parse the configured filters
    pub fn initial_filters(&self) -> ValidationResult<FilterSet> {
        FilterSet::from_specs(&self.filters)
    }

    /// Convert to YAML for display
    pub fn to_yaml(&self) -> ValidationResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| ValidationError::config(format!("Failed to serialize config: {e}")))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: ClientConfig,
}

impl ConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    /// Set the REST API root
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.server.base_url = url.into();
        self
    }

    /// Set the model to validate
    pub fn model_uri(mut self, model_uri: impl Into<String>) -> Self {
        self.config.model_uri = model_uri.into();
        self
    }

    /// Add an initial filter
    pub fn add_filter(mut self, filter: &ValidationFilter) -> Self {
        self.config.filters.push(filter.to_string());
        self
    }

    /// Build the final configuration
    pub fn build(self) -> ValidationResult<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
