//! Human-readable report derived from a stored result.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{RunStatus, ValidationError, ValidationResult, ValidationSummary};

/// Error rate (%) above which the report asks for a data review.
pub const HIGH_ERROR_RATE: f64 = 20.0;

/// How many top fields and top rules get their own recommendation.
const TOP_N: usize = 3;

/// Report for a completed (or early-stopped) run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub job_id: String,
    pub status: RunStatus,
    pub is_valid: bool,
    pub total_rows: usize,
    pub processed_rows: usize,
    pub summary: ValidationSummary,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationError>,
    pub recommendations: Vec<String>,
}

impl ValidationReport {
    pub fn from_result(result: &ValidationResult) -> Self {
        Self {
            job_id: result.job_id.clone(),
            status: result.status,
            is_valid: result.is_valid,
            total_rows: result.total_rows,
            processed_rows: result.processed_rows,
            summary: result.summary.clone(),
            errors: result.errors.clone(),
            warnings: result.warnings.clone(),
            recommendations: recommendations(result),
        }
    }
}

/// Build the recommendation list for `result`.
pub fn recommendations(result: &ValidationResult) -> Vec<String> {
    let mut recs = Vec::new();
    let summary = &result.summary;

    if summary.error_rate > HIGH_ERROR_RATE {
        recs.push(format!(
            "High error rate ({:.1}%). Review the source data and column mapping before importing.",
            summary.error_rate
        ));
    }

    for (field, count) in top_n(&summary.errors_by_field) {
        recs.push(format!(
            "Field '{}' has {} issue(s). Check its mapping and source values.",
            field, count
        ));
    }

    for (rule, count) in top_n(&summary.errors_by_rule) {
        recs.push(format!("Rule '{}' failed {} time(s).", rule, count));
    }

    if result.status == RunStatus::EarlyStopped {
        recs.push(format!(
            "Validation stopped early after {} of {} rows because the error threshold was exceeded.",
            result.processed_rows, result.total_rows
        ));
    }

    if recs.is_empty() {
        recs.push("Validation completed successfully. No issues found.".to_string());
    }

    recs
}

/// Entries ranked by count (descending), ties broken by name.
fn top_n(counts: &BTreeMap<String, usize>) -> Vec<(&str, usize)> {
    let mut ranked: Vec<(&str, usize)> = counts
        .iter()
        .filter(|(_, &c)| c > 0)
        .map(|(k, &c)| (k.as_str(), c))
        .collect();
    // BTreeMap iteration is already name-ordered; the sort is stable.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(TOP_N);
    ranked
}
