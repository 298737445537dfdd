//! Error types for the rowcheck validation engine.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`CsvError`] - CSV ingestion errors
//! - [`ConfigError`] - Malformed environment configuration
//! - [`RuleFault`] - A single rule could not be evaluated against a cell
//! - [`SinkError`] - Progress persistence collaborator failures
//! - [`EngineError`] - Systemic run failures and accessor lookups
//! - [`RegistryError`] - Rule template registry errors
//! - [`ServerError`] - HTTP layer errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// CSV Ingestion Errors
// =============================================================================

/// Errors during CSV parsing.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid CSV format.
    #[error("Invalid CSV format at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable holds a value of the wrong shape.
    #[error("{var} must be {expected}, got '{value}'")]
    InvalidValue {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

// =============================================================================
// Rule Faults
// =============================================================================

/// A rule misbehaved while evaluating a cell.
///
/// Faults never abort a run: the batch processor turns them into
/// error-severity entries scoped to the offending row and field.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuleFault {
    /// The rule lacks configuration its kind needs.
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),

    /// A custom evaluator reported a failure.
    #[error("custom evaluator failed: {0}")]
    Custom(String),
}

// =============================================================================
// Progress Sink Errors
// =============================================================================

/// Errors from the external job-progress persistence collaborator.
#[derive(Debug, Error)]
pub enum SinkError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The collaborator answered with a non-success status.
    #[error("Progress endpoint returned status {0}")]
    Status(u16),

    /// The collaborator is not reachable or not configured.
    #[error("Progress sink unavailable: {0}")]
    Unavailable(String),
}

// =============================================================================
// Engine Errors (top-level)
// =============================================================================

/// Systemic validation failures and accessor lookups.
///
/// A run that returns one of these leaves no result in the store.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No stored result for this job.
    #[error("No validation result found for job '{0}'")]
    NotFound(String),

    /// A run for this job id is already in flight.
    #[error("Validation already running for job '{0}'")]
    JobAlreadyRunning(String),

    /// The run was cancelled at a batch boundary.
    #[error("Validation cancelled for job '{job_id}' after {processed_rows} rows")]
    Cancelled { job_id: String, processed_rows: usize },

    /// A row is not a JSON object.
    #[error("Row {row} is not an object")]
    InvalidRow { row: usize },
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors from the rule template registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Template not found.
    #[error("Template not found: {0}")]
    NotFound(String),

    /// IO error.
    #[error("Registry IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error.
    #[error("Registry JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Engine error.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// CSV ingestion error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Socket or listener failure.
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
