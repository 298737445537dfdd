//! Validation engine.
//!
//! [`ValidationEngine::run`] validates a full row set in batches and stores
//! the result under the job id. While a run is active, pollers read its
//! progress with [`ValidationEngine::get_progress`]; afterwards the result
//! and a derived report are available until [`ValidationEngine::clear`].
//!
//! # Lifecycle per job id
//!
//! ```text
//! CREATED ──▶ RUNNING ──┬──▶ COMPLETED       (result stored, progress cleared)
//!                       ├──▶ EARLY_STOPPED   (result stored, progress cleared)
//!                       └──▶ FAILED          (no result,     progress cleared)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use rowcheck::{ValidationEngine, ValidationOptions};
//! use serde_json::json;
//!
//! let engine = ValidationEngine::new();
//! let rows = vec![json!({"name": "John", "email": "john@x.com"})];
//! let headers = vec!["name".to_string(), "email".to_string()];
//! let result = engine.run("job-1", &rows, &headers, ValidationOptions::default()).await?;
//! assert!(result.is_valid);
//! ```

mod batch;
pub mod report;
pub mod sink;
pub mod store;

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::{EngineError, EngineResult};
use crate::models::{OptionDefaults, ValidationOptions, ValidationProgress, ValidationResult};
use crate::rules::{resolve_rules, RuleSet};
use crate::validation::{CustomRuleEvaluator, FieldValidator};

pub use report::ValidationReport;
pub use sink::{HttpProgressSink, JobProgressUpdate, NoopSink, ProgressSink};
pub use store::{InMemoryStore, JobStore};

/// Streaming rule-based validation engine.
///
/// The engine is the only writer of its progress and result stores. It is
/// cheap to share behind an `Arc`; runs for different job ids are isolated.
pub struct ValidationEngine {
    progress: Arc<dyn JobStore<ValidationProgress>>,
    results: Arc<dyn JobStore<Arc<ValidationResult>>>,
    sink: Arc<dyn ProgressSink>,
    validator: FieldValidator,
    defaults: OptionDefaults,
    cancellations: DashMap<String, CancellationToken>,
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationEngine {
    /// Engine with in-memory stores, no progress sink and default options.
    pub fn new() -> Self {
        Self {
            progress: Arc::new(InMemoryStore::new()),
            results: Arc::new(InMemoryStore::new()),
            sink: Arc::new(NoopSink),
            validator: FieldValidator::default(),
            defaults: OptionDefaults::default(),
            cancellations: DashMap::new(),
        }
    }

    pub fn with_stores(
        mut self,
        progress: Arc<dyn JobStore<ValidationProgress>>,
        results: Arc<dyn JobStore<Arc<ValidationResult>>>,
    ) -> Self {
        self.progress = progress;
        self.results = results;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_custom_evaluator(mut self, evaluator: Arc<dyn CustomRuleEvaluator>) -> Self {
        self.validator = FieldValidator::new(evaluator);
        self
    }

    pub fn with_defaults(mut self, defaults: OptionDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn defaults(&self) -> &OptionDefaults {
        &self.defaults
    }

    /// Validate `rows` under `job_id`.
    ///
    /// Returns the stored result for completed and early-stopped runs.
    /// Systemic failures (a non-object row, cancellation) return an error
    /// and store nothing. A second run for an id that is still active is
    /// rejected without touching the active run.
    pub async fn run(
        &self,
        job_id: &str,
        rows: &[Value],
        headers: &[String],
        options: ValidationOptions,
    ) -> EngineResult<Arc<ValidationResult>> {
        let mut opts = options.resolve(&self.defaults);
        let rule_set = RuleSet::new(resolve_rules(headers, std::mem::take(&mut opts.rules)));

        if !self
            .progress
            .insert_if_absent(job_id, ValidationProgress::new(job_id, rows.len()))
        {
            return Err(EngineError::JobAlreadyRunning(job_id.to_string()));
        }
        let cancel = CancellationToken::new();
        self.cancellations.insert(job_id.to_string(), cancel.clone());
        let _guard = RunGuard {
            engine: self,
            job_id,
        };

        info!(
            job_id,
            total_rows = rows.len(),
            rules = rule_set.len(),
            batch_size = opts.batch_size,
            "Validation started",
        );

        match self.process(job_id, rows, &rule_set, &opts, &cancel).await {
            Ok(result) => {
                let result = Arc::new(result);
                self.results.put(job_id, result.clone());
                info!(
                    job_id,
                    status = ?result.status,
                    processed_rows = result.processed_rows,
                    errors = result.error_rows,
                    warnings = result.warning_rows,
                    duration_ms = result.duration_ms,
                    "Validation finished",
                );
                Ok(result)
            }
            Err(e) => {
                error!(job_id, error = %e, "Validation failed");
                Err(e)
            }
        }
    }

    /// Live progress, or `None` when no run is active for `job_id`.
    pub fn get_progress(&self, job_id: &str) -> Option<ValidationProgress> {
        self.progress.get(job_id)
    }

    /// Stored result, or `None` while running, after a failure, or if never run.
    pub fn get_result(&self, job_id: &str) -> Option<Arc<ValidationResult>> {
        self.results.get(job_id)
    }

    /// Report for a stored result.
    pub fn generate_report(&self, job_id: &str) -> EngineResult<ValidationReport> {
        let result = self
            .get_result(job_id)
            .ok_or_else(|| EngineError::NotFound(job_id.to_string()))?;
        Ok(ValidationReport::from_result(&result))
    }

    /// Drop the stored result for `job_id`.
    pub fn clear(&self, job_id: &str) {
        if self.results.remove(job_id).is_some() {
            info!(job_id, "Validation result cleared");
        }
    }

    /// Ask an active run to stop at its next batch boundary.
    ///
    /// Returns `false` when no run is active for `job_id`.
    pub fn cancel(&self, job_id: &str) -> bool {
        match self.cancellations.get(job_id) {
            Some(token) => {
                token.cancel();
                info!(job_id, "Validation cancellation requested");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, job_id: &str) -> bool {
        self.progress.contains(job_id)
    }
}

/// Clears the per-run entries however the run ends, including when the
/// run future is dropped mid-flight.
struct RunGuard<'a> {
    engine: &'a ValidationEngine,
    job_id: &'a str,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.engine.progress.remove(self.job_id);
        self.engine.cancellations.remove(self.job_id);
    }
}
