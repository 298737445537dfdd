//! The batch loop.
//!
//! Rows are processed in consecutive slices of `batch_size`. After each
//! slice the progress snapshot is replaced, the error-rate circuit breaker
//! is checked, the progress sink is notified, the preview is filled, the
//! cancellation token is checked and the task yields.

use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::sink::{self, JobProgressUpdate};
use super::ValidationEngine;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    EffectiveOptions, PreviewRow, RowStatus, RuleType, RunStatus, Severity, ValidationError,
    ValidationProgress, ValidationResult, ValidationSummary, VALIDATION_CATEGORY,
};
use crate::rules::{CompiledRule, RuleSet};
use crate::validation::{render_message, FieldValidator};

/// Mutable state of one run, frozen into a [`ValidationResult`] at the end.
#[derive(Debug)]
pub(crate) struct RunAccumulator {
    errors: Vec<ValidationError>,
    warnings: Vec<ValidationError>,
    info: Vec<ValidationError>,
    error_count: usize,
    warning_count: usize,
    info_count: usize,
    errors_by_field: BTreeMap<String, usize>,
    errors_by_rule: BTreeMap<String, usize>,
    preview: Vec<PreviewRow>,
    cap: Option<usize>,
}

impl RunAccumulator {
    pub(crate) fn new(cap: Option<usize>) -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            info: Vec::new(),
            error_count: 0,
            warning_count: 0,
            info_count: 0,
            errors_by_field: BTreeMap::new(),
            errors_by_rule: BTreeMap::new(),
            preview: Vec::new(),
            cap,
        }
    }

    /// Evaluate every matching rule on every cell of `row`.
    ///
    /// `row_number` is 1-based. Once a `required` rule fails on a field, the
    /// field's non-required rules are skipped; other `required` rules still run.
    pub(crate) fn validate_row(
        &mut self,
        row_number: usize,
        row: &Value,
        rules: &RuleSet,
        validator: &FieldValidator,
    ) -> EngineResult<RowStatus> {
        let cells = row
            .as_object()
            .ok_or(EngineError::InvalidRow { row: row_number })?;
        let mut status = RowStatus::default();

        for (field, value) in cells {
            let mut required_failed = false;
            for compiled in rules.for_field(field) {
                let rule = &compiled.rule;
                // required rules come first, so this skips only the rest
                if required_failed && rule.rule_type != RuleType::Required {
                    break;
                }
                let (severity, message) = match validator.evaluate(value, compiled) {
                    Ok(true) => continue,
                    Ok(false) => (rule.severity, render_message(rule, field, value)),
                    Err(fault) => (
                        Severity::Error,
                        format!("Rule '{}' could not be evaluated: {}", rule.name, fault),
                    ),
                };

                self.record(issue(row_number, field, value, compiled, severity, message));
                match severity {
                    Severity::Error => status.error_count += 1,
                    Severity::Warning => status.warning_count += 1,
                    Severity::Info => {}
                }

                if rule.rule_type == RuleType::Required {
                    required_failed = true;
                }
            }
        }

        status.has_errors = status.error_count > 0;
        status.has_warnings = status.warning_count > 0;
        Ok(status)
    }

    fn record(&mut self, entry: ValidationError) {
        *self.errors_by_field.entry(entry.field.clone()).or_insert(0) += 1;
        *self.errors_by_rule.entry(entry.rule.clone()).or_insert(0) += 1;

        let (list, count) = match entry.severity {
            Severity::Error => (&mut self.errors, &mut self.error_count),
            Severity::Warning => (&mut self.warnings, &mut self.warning_count),
            Severity::Info => (&mut self.info, &mut self.info_count),
        };
        *count += 1;
        if self.cap.map_or(true, |cap| list.len() < cap) {
            list.push(entry);
        }
    }

    /// Append rows of a slice to the preview until `max` rows are held.
    pub(crate) fn extend_preview(
        &mut self,
        batch: &[Value],
        first_row: usize,
        statuses: &[RowStatus],
        max: usize,
    ) {
        let room = max.saturating_sub(self.preview.len());
        self.preview.extend(
            batch
                .iter()
                .zip(statuses)
                .enumerate()
                .take(room)
                .map(|(offset, (data, status))| PreviewRow {
                    row: first_row + offset + 1,
                    data: data.clone(),
                    status: *status,
                }),
        );
    }

    pub(crate) fn error_count(&self) -> usize {
        self.error_count
    }

    pub(crate) fn warning_count(&self) -> usize {
        self.warning_count
    }
}

fn issue(
    row: usize,
    field: &str,
    value: &Value,
    compiled: &CompiledRule,
    severity: Severity,
    message: String,
) -> ValidationError {
    ValidationError {
        row,
        field: field.to_string(),
        value: value.clone(),
        rule: compiled.rule.name.clone(),
        rule_id: compiled.rule.id.clone(),
        rule_type: compiled.rule.rule_type,
        severity,
        message,
        category: VALIDATION_CATEGORY.to_string(),
    }
}

fn percent(current: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((current as f64 / total as f64) * 100.0).round().min(100.0) as u8
}

/// Rows per second so far and seconds left at that rate.
fn throughput(current_row: usize, total: usize, elapsed_secs: f64) -> (f64, Option<f64>) {
    if elapsed_secs <= 0.0 || current_row == 0 {
        return (0.0, None);
    }
    let rate = current_row as f64 / elapsed_secs;
    (rate, Some(total.saturating_sub(current_row) as f64 / rate))
}

fn rate_of(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

impl ValidationEngine {
    /// Drive the batch loop for a registered job and build its result.
    pub(super) async fn process(
        &self,
        job_id: &str,
        rows: &[Value],
        rules: &RuleSet,
        opts: &EffectiveOptions,
        cancel: &CancellationToken,
    ) -> EngineResult<ValidationResult> {
        let total = rows.len();
        let started = Instant::now();
        let started_at = Utc::now();
        let mut acc = RunAccumulator::new(opts.max_stored_issues);
        let mut snapshot = ValidationProgress::new(job_id, total);
        snapshot.started_at = started_at;
        let mut current_row = 0;
        let mut stopped_early = false;

        for batch in rows.chunks(opts.batch_size) {
            let first_row = current_row;
            let mut statuses = Vec::with_capacity(batch.len());
            for (offset, row) in batch.iter().enumerate() {
                statuses.push(acc.validate_row(
                    first_row + offset + 1,
                    row,
                    rules,
                    &self.validator,
                )?);
            }
            current_row += batch.len();

            let (rate, remaining) =
                throughput(current_row, total, started.elapsed().as_secs_f64());
            snapshot.current_row = current_row;
            snapshot.percent = percent(current_row, total);
            snapshot.error_count = acc.error_count();
            snapshot.warning_count = acc.warning_count();
            snapshot.processing_rate = rate;
            snapshot.estimated_time_remaining = remaining;
            self.progress.put(job_id, snapshot.clone());

            debug!(
                job_id,
                current_row,
                total,
                percent = snapshot.percent,
                errors = snapshot.error_count,
                "Batch validated",
            );

            let error_rate = rate_of(acc.error_count(), current_row);
            if error_rate > opts.stop_on_error_threshold {
                stopped_early = current_row < total;
                warn!(
                    job_id,
                    current_row,
                    total,
                    error_rate,
                    threshold = opts.stop_on_error_threshold,
                    "Error rate threshold exceeded, stopping validation",
                );
                break;
            }

            if opts.real_time_updates {
                sink::notify(
                    self.sink.clone(),
                    job_id.to_string(),
                    JobProgressUpdate {
                        progress: snapshot.percent,
                        records_processed: current_row,
                        estimated_time_remaining: snapshot.estimated_time_remaining,
                    },
                );
            }

            acc.extend_preview(batch, first_row, &statuses, opts.max_preview_rows);

            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled {
                    job_id: job_id.to_string(),
                    processed_rows: current_row,
                });
            }

            tokio::task::yield_now().await;
        }

        Ok(finalize(
            job_id,
            acc,
            total,
            current_row,
            stopped_early,
            started_at,
            started.elapsed().as_millis() as u64,
        ))
    }
}

fn finalize(
    job_id: &str,
    acc: RunAccumulator,
    total_rows: usize,
    processed_rows: usize,
    stopped_early: bool,
    started_at: chrono::DateTime<Utc>,
    duration_ms: u64,
) -> ValidationResult {
    ValidationResult {
        job_id: job_id.to_string(),
        status: if stopped_early {
            RunStatus::EarlyStopped
        } else {
            RunStatus::Completed
        },
        is_valid: acc.errors.is_empty(),
        total_rows,
        processed_rows,
        error_rows: acc.error_count,
        warning_rows: acc.warning_count,
        info_rows: acc.info_count,
        summary: ValidationSummary {
            errors_by_field: acc.errors_by_field,
            errors_by_rule: acc.errors_by_rule,
            error_rate: rate_of(acc.error_count, total_rows),
            warning_rate: rate_of(acc.warning_count, total_rows),
        },
        errors: acc.errors,
        warnings: acc.warnings,
        info: acc.info,
        preview: acc.preview,
        started_at,
        completed_at: Utc::now(),
        duration_ms,
    }
}
