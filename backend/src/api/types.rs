//! REST API types.
//!
//! Progress, result and report bodies are the engine's own models
//! serialized as camelCase; only the upload acknowledgement and error
//! bodies are defined here.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{EngineError, ServerError};
use crate::parser::ParseResult;

/// Sent back as soon as an upload is parsed and its run is scheduled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationAccepted {
    /// Job identifier to poll
    pub job_id: String,

    /// Always "running" at this point
    pub status: String,

    /// CSV info
    pub csv_info: CsvMetadata,

    /// Number of rules the run will apply
    pub rule_count: usize,
}

/// CSV file metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvMetadata {
    pub encoding: String,
    pub delimiter: String,
    pub row_count: usize,
    pub columns: Vec<String>,
}

impl From<&ParseResult> for CsvMetadata {
    fn from(parsed: &ParseResult) -> Self {
        Self {
            encoding: parsed.encoding.clone(),
            delimiter: parsed.delimiter.to_string(),
            row_count: parsed.records.len(),
            columns: parsed.headers.clone(),
        }
    }
}

/// Acknowledgement for cancel and delete requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAction {
    pub job_id: String,
    pub action: String,
}

/// Create an error response body
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
    })
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Engine(EngineError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServerError::Engine(EngineError::JobAlreadyRunning(_)) => StatusCode::CONFLICT,
            ServerError::Engine(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Csv(_) | ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(error_response(&self.to_string()))).into_response()
    }
}
