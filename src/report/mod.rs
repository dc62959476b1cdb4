//! Report generation with multiple output formats
//!
//! CDD Principle: Anti-Corruption Layer - Formatters translate validation state to external formats
//! - A ResultsView (domain snapshot) is converted to various external representations
//! - Each formatter encapsulates the rules for its specific output format
//! - Constraint listings share the same formatter

use crate::domain::constraints::FacetConstraint;
use crate::domain::results::{
    Severity, ValidationError, ValidationFilter, ValidationResult, ValidationResultItem,
};
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable format with colors
    Human,
    /// JSON format for programmatic consumption
    Json,
    /// GitHub Actions format for workflow integration
    GitHub,
}

/// Snapshot of a framework's visible results
#[derive(Debug, Clone)]
pub struct ResultsView {
    pub model_uri: String,
    pub visible: Vec<ValidationResultItem>,
    pub raw_count: usize,
    pub filters: Vec<ValidationFilter>,
    pub validated_at: Option<DateTime<Utc>>,
}

impl ResultsView {
    /// Whether any visible item is blocking
    pub fn has_errors(&self) -> bool {
        self.visible.iter().any(ValidationResultItem::is_blocking)
    }

    pub fn hidden_count(&self) -> usize {
        self.raw_count.saturating_sub(self.visible.len())
    }
}

/// Renders results and constraints
#[derive(Debug, Clone)]
pub struct ReportFormatter {
    /// Whether to use colored output (for human format)
    use_colors: bool,
    /// Maximum number of items to include
    max_items: Option<usize>,
}

impl Default for ReportFormatter {
    fn default() -> Self {
        Self::new(true, None)
    }
}

impl ReportFormatter {
    pub fn new(use_colors: bool, max_items: Option<usize>) -> Self {
        Self {
            use_colors,
            max_items,
        }
    }

    /// Format the visible results in the specified format
    pub fn format_results(&self, view: &ResultsView, format: OutputFormat) -> ValidationResult<String> {
        let items = match self.max_items {
            Some(max) => &view.visible[..view.visible.len().min(max)],
            None => &view.visible[..],
        };

        match format {
            OutputFormat::Human => Ok(self.format_human(view, items)),
            OutputFormat::Json => self.format_json(view, items),
            OutputFormat::GitHub => Ok(self.format_github(items)),
        }
    }

    fn format_human(&self, view: &ResultsView, items: &[ValidationResultItem]) -> String {
        let mut output = String::new();

        if items.is_empty() {
            output.push_str(&self.paint("32", &format!("No validation issues for {}", view.model_uri)));
            output.push('\n');
        } else {
            let color = if view.has_errors() { "31" } else { "33" };
            output.push_str(&self.paint(color, &format!("Validation issues for {}", view.model_uri)));
            output.push_str("\n\n");

            for item in items {
                let element = item.element_id.as_deref().unwrap_or("-");
                output.push_str(&format!(
                    "  [{}] {}\n    {} {}\n",
                    self.paint(severity_color(item.severity), &item.severity.to_string()),
                    item.message,
                    self.paint("2", &format!("{} #{}", item.source, item.code)),
                    element
                ));
            }
        }

        output.push('\n');
        output.push_str(&format!(
            "{} shown, {} hidden by {} filter{}",
            items.len(),
            view.hidden_count(),
            view.filters.len(),
            if view.filters.len() == 1 { "" } else { "s" }
        ));
        if let Some(at) = view.validated_at {
            output.push_str(&format!(" (validated {})", at.format("%Y-%m-%d %H:%M:%S UTC")));
        }
        output.push('\n');
        output
    }

    fn format_json(&self, view: &ResultsView, items: &[ValidationResultItem]) -> ValidationResult<String> {
        let json_report = serde_json::json!({
            "model_uri": view.model_uri,
            "results": items,
            "summary": {
                "visible": view.visible.len(),
                "hidden": view.hidden_count(),
                "total": view.raw_count,
                "validated_at": view.validated_at.map(|at| at.to_rfc3339()),
            },
            "filters": view.filters.iter().map(ToString::to_string).collect::<Vec<_>>(),
        });

        to_pretty_json(&json_report)
    }

    fn format_github(&self, items: &[ValidationResultItem]) -> String {
        let mut output = String::new();
        for item in items {
            let level = if item.severity.is_blocking() {
                "error"
            } else if item.severity == Severity::WARNING {
                "warning"
            } else {
                "notice"
            };
            output.push_str(&format!(
                "::{} title={}::{}\n",
                level,
                item.source,
                item.format_display()
            ));
        }
        output
    }

    /// Format cached constraints
    pub fn format_constraints(
        &self,
        constraints: &[(i32, i32, FacetConstraint)],
        format: OutputFormat,
    ) -> ValidationResult<String> {
        match format {
            OutputFormat::Json => {
                let entries: Vec<JsonValue> = constraints
                    .iter()
                    .map(|(classifier, feature, constraint)| {
                        serde_json::json!({
                            "classifier": classifier,
                            "feature": feature,
                            "constraint": constraint,
                        })
                    })
                    .collect();
                to_pretty_json(&JsonValue::Array(entries))
            }
            OutputFormat::Human | OutputFormat::GitHub => {
                if constraints.is_empty() {
                    return Ok("No constraints recorded\n".to_string());
                }
                let mut output = String::new();
                for (classifier, feature, constraint) in constraints {
                    output.push_str(&format!(
                        "{} {}\n",
                        self.paint("1", &format!("{classifier}/{feature}")),
                        constraint.describe()
                    ));
                }
                Ok(output)
            }
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }
}

fn severity_color(severity: Severity) -> &'static str {
    if severity.is_blocking() {
        "31" // Red
    } else if severity == Severity::WARNING {
        "33" // Yellow
    } else {
        "36" // Cyan
    }
}

fn to_pretty_json(value: &JsonValue) -> ValidationResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ValidationError::config(format!("JSON serialization failed: {}", e)))
}
