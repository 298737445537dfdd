//! # Rowcheck - streaming rule-based CSV validation
//!
//! Rowcheck validates uploaded CSV rows against a rule set derived from the
//! column headers plus caller-supplied rules. Rows are processed in batches,
//! progress is observable while a run is active, and a run whose error rate
//! crosses a threshold stops early with a partial result.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│   Engine    │────▶│   Result /  │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │  (batches)  │     │   Report    │
//! └─────────────┘     └─────────────┘     └──────┬──────┘     └─────────────┘
//!                                                │
//!                                  progress store + optional sink
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rowcheck::{parse_file_auto, ValidationEngine, ValidationOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let csv = parse_file_auto("input.csv").unwrap();
//!     let engine = ValidationEngine::new();
//!     let result = engine
//!         .run("job-1", &csv.records, &csv.headers, ValidationOptions::default())
//!         .await
//!         .unwrap();
//!     println!("{} rows with errors", result.error_rows);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Rules, options, results and progress
//! - [`config`] - Environment configuration
//! - [`parser`] - CSV parsing with auto-detection
//! - [`rules`] - Header heuristics and rule set compilation
//! - [`validation`] - Per-value rule evaluation
//! - [`engine`] - Batch processor, stores, progress sink and reports
//! - [`cache`] - Rule template registry
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Rules and validation
pub mod rules;
pub mod validation;

// Engine
pub mod engine;

// Templates
pub mod cache;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError,
    CsvError,
    EngineError,
    RegistryError,
    RuleFault,
    ServerError,
    SinkError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    DataType,
    PreviewRow,
    RowStatus,
    RuleConfig,
    RuleType,
    RunStatus,
    Severity,
    ValidationError,
    ValidationOptions,
    ValidationProgress,
    ValidationResult,
    ValidationRule,
    ValidationSummary,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::EngineConfig;

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content,
    detect_delimiter,
    detect_encoding,
    parse_bytes_auto,
    parse_bytes_with_delimiter,
    parse_file_auto,
    parse_str,
    ParseResult,
};

// =============================================================================
// Re-exports - Rules and validation
// =============================================================================

pub use rules::{default_rules, resolve_rules, RuleSet};
pub use validation::{CustomRuleEvaluator, FieldValidator, PassThroughEvaluator};

// =============================================================================
// Re-exports - Engine
// =============================================================================

pub use engine::{
    HttpProgressSink,
    InMemoryStore,
    JobProgressUpdate,
    JobStore,
    NoopSink,
    ProgressSink,
    ValidationEngine,
    ValidationReport,
};

// =============================================================================
// Re-exports - Registry (Cache)
// =============================================================================

pub use cache::{RuleTemplate, RuleTemplateRegistry, TemplateMatch};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
