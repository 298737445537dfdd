//! Domain models for the validation engine.
//!
//! - [`ValidationRule`] - A typed per-field predicate with severity
//! - [`ValidationError`] - One failed check (error, warning or info)
//! - [`ValidationResult`] - Final outcome of a run
//! - [`ValidationProgress`] - Live snapshot of an in-flight run
//! - [`ValidationOptions`] - Caller options, merged with [`OptionDefaults`]
//!
//! All types serialize in camelCase for API consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// =============================================================================
// Rules
// =============================================================================

/// Kind of check a rule performs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Required,
    DataType,
    Format,
    Range,
    Pattern,
    Custom,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::DataType => "data_type",
            Self::Format => "format",
            Self::Range => "range",
            Self::Pattern => "pattern",
            Self::Custom => "custom",
        }
    }
}

/// Severity of a failed rule. Only [`Severity::Error`] affects validity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Error,
    Warning,
    Info,
}

/// Target type for `data_type` rules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Number,
    Boolean,
    Date,
    Email,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Email => "email",
        }
    }
}

/// Type-specific rule configuration. Unused keys are ignored by other kinds.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// `Some(false)` forces non-required rules to check empty cells.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_empty: Option<bool>,
    /// Message with `{field}`, `{value}` and `{rule}` placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A named, typed, per-field predicate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    pub field: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub config: RuleConfig,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub order: u32,
}

fn default_active() -> bool {
    true
}

impl ValidationRule {
    /// Create an active error-severity rule with empty configuration.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        rule_type: RuleType,
        field: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rule_type,
            field: field.into(),
            severity: Severity::Error,
            config: RuleConfig::default(),
            active: true,
            order: 0,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_config(mut self, config: RuleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }
}

// =============================================================================
// Errors, warnings and info entries
// =============================================================================

/// Category attached to every entry produced by the engine.
pub const VALIDATION_CATEGORY: &str = "validation";

/// A single failed check. Used for errors, warnings and info alike.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    /// 1-based row index.
    pub row: usize,
    pub field: String,
    pub value: Value,
    /// Name of the originating rule.
    pub rule: String,
    pub rule_id: String,
    pub rule_type: RuleType,
    pub severity: Severity,
    pub message: String,
    pub category: String,
}

// =============================================================================
// Result
// =============================================================================

/// How a run ended. Failed runs never produce a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    EarlyStopped,
}

/// Aggregate counts. Tallies include every severity and stay exact even
/// when raw entries are capped.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub errors_by_field: BTreeMap<String, usize>,
    pub errors_by_rule: BTreeMap<String, usize>,
    /// Error entries per 100 input rows.
    pub error_rate: f64,
    /// Warning entries per 100 input rows.
    pub warning_rate: f64,
}

/// Per-row annotation for preview rows.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RowStatus {
    pub has_errors: bool,
    pub has_warnings: bool,
    pub error_count: usize,
    pub warning_count: usize,
}

/// A preview row: the original data plus its status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRow {
    /// 1-based row index.
    pub row: usize,
    pub data: Value,
    pub status: RowStatus,
}

/// Final outcome of a validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub job_id: String,
    pub status: RunStatus,
    pub is_valid: bool,
    pub total_rows: usize,
    pub processed_rows: usize,
    /// Number of error entries (not distinct rows).
    pub error_rows: usize,
    /// Number of warning entries (not distinct rows).
    pub warning_rows: usize,
    pub info_rows: usize,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationError>,
    pub info: Vec<ValidationError>,
    pub summary: ValidationSummary,
    pub preview: Vec<PreviewRow>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ValidationResult {
    /// True when the error-rate threshold cut the run short.
    pub fn is_partial(&self) -> bool {
        self.status == RunStatus::EarlyStopped
    }
}

// =============================================================================
// Progress
// =============================================================================

/// Live snapshot of an in-flight run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationProgress {
    pub job_id: String,
    pub current_row: usize,
    pub total_rows: usize,
    pub percent: u8,
    pub error_count: usize,
    pub warning_count: usize,
    /// Rows per second.
    pub processing_rate: f64,
    /// Seconds, once a rate is known.
    pub estimated_time_remaining: Option<f64>,
    pub started_at: DateTime<Utc>,
}

impl ValidationProgress {
    pub fn new(job_id: impl Into<String>, total_rows: usize) -> Self {
        Self {
            job_id: job_id.into(),
            current_row: 0,
            total_rows,
            percent: 0,
            error_count: 0,
            warning_count: 0,
            processing_rate: 0.0,
            estimated_time_remaining: None,
            started_at: Utc::now(),
        }
    }
}

// =============================================================================
// Options
// =============================================================================

pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_MAX_PREVIEW_ROWS: usize = 100;
pub const DEFAULT_STOP_ON_ERROR_THRESHOLD: f64 = 50.0;

/// Caller-supplied options. Unset fields fall back to [`OptionDefaults`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOptions {
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub max_preview_rows: Option<usize>,
    #[serde(default)]
    pub real_time_updates: Option<bool>,
    /// Extra rules appended after the header-derived ones.
    #[serde(default)]
    pub rules: Vec<ValidationRule>,
    /// Error rate (%) above which the run stops early.
    #[serde(default)]
    pub stop_on_error_threshold: Option<f64>,
    /// Cap on retained raw entries per severity list.
    #[serde(default)]
    pub max_stored_issues: Option<usize>,
}

/// Engine-wide defaults merged into every [`ValidationOptions`].
#[derive(Debug, Clone, PartialEq)]
pub struct OptionDefaults {
    pub batch_size: usize,
    pub max_preview_rows: usize,
    pub real_time_updates: bool,
    pub stop_on_error_threshold: f64,
    pub max_stored_issues: Option<usize>,
}

impl Default for OptionDefaults {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_preview_rows: DEFAULT_MAX_PREVIEW_ROWS,
            real_time_updates: true,
            stop_on_error_threshold: DEFAULT_STOP_ON_ERROR_THRESHOLD,
            max_stored_issues: None,
        }
    }
}

/// Options after merging with defaults.
#[derive(Debug, Clone)]
pub struct EffectiveOptions {
    pub batch_size: usize,
    pub max_preview_rows: usize,
    pub real_time_updates: bool,
    pub rules: Vec<ValidationRule>,
    pub stop_on_error_threshold: f64,
    pub max_stored_issues: Option<usize>,
}

impl ValidationOptions {
    /// Merge with defaults. A zero batch size becomes 1 and a zero storage
    /// cap becomes 1, so the emptiness of `errors` still tracks validity.
    pub fn resolve(self, defaults: &OptionDefaults) -> EffectiveOptions {
        EffectiveOptions {
            batch_size: self.batch_size.unwrap_or(defaults.batch_size).max(1),
            max_preview_rows: self.max_preview_rows.unwrap_or(defaults.max_preview_rows),
            real_time_updates: self.real_time_updates.unwrap_or(defaults.real_time_updates),
            rules: self.rules,
            stop_on_error_threshold: self
                .stop_on_error_threshold
                .unwrap_or(defaults.stop_on_error_threshold),
            max_stored_issues: self
                .max_stored_issues
                .or(defaults.max_stored_issues)
                .map(|cap| cap.max(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_options() {
        let opts = ValidationOptions::default().resolve(&OptionDefaults::default());
        assert_eq!(opts.batch_size, 1000);
        assert_eq!(opts.max_preview_rows, 100);
        assert!(opts.real_time_updates);
        assert_eq!(opts.stop_on_error_threshold, 50.0);
        assert!(opts.max_stored_issues.is_none());
    }

    #[test]
    fn test_options_override_and_clamp() {
        let opts = ValidationOptions {
            batch_size: Some(0),
            stop_on_error_threshold: Some(10.0),
            max_stored_issues: Some(0),
            ..Default::default()
        }
        .resolve(&OptionDefaults::default());

        assert_eq!(opts.batch_size, 1);
        assert_eq!(opts.stop_on_error_threshold, 10.0);
        assert_eq!(opts.max_stored_issues, Some(1));
    }

    #[test]
    fn test_rule_deserialize_defaults() {
        let rule: ValidationRule = serde_json::from_value(json!({
            "id": "age_range",
            "name": "Age Range",
            "type": "range",
            "field": "age",
            "config": { "min": 0, "max": 130 }
        }))
        .unwrap();

        assert_eq!(rule.rule_type, RuleType::Range);
        assert_eq!(rule.severity, Severity::Error);
        assert!(rule.active);
        assert_eq!(rule.config.max, Some(130.0));
    }

    #[test]
    fn test_options_camel_case() {
        let opts: ValidationOptions = serde_json::from_value(json!({
            "batchSize": 50,
            "stopOnErrorThreshold": 5.5,
            "realTimeUpdates": false
        }))
        .unwrap();

        assert_eq!(opts.batch_size, Some(50));
        assert_eq!(opts.stop_on_error_threshold, Some(5.5));
        assert_eq!(opts.real_time_updates, Some(false));
        assert!(opts.rules.is_empty());
    }
}
