//! HTTP server for the rowcheck API.
//!
//! Uploads are parsed synchronously and validated in a spawned task; clients
//! poll the job endpoints for progress and fetch the result or report once
//! the run has finished.
//!
//! # API Endpoints
//!
//! | Method | Path                        | Description                        |
//! |--------|-----------------------------|------------------------------------|
//! | GET    | `/health`                   | Health check                       |
//! | POST   | `/api/validate`             | Upload CSV and start a validation  |
//! | GET    | `/api/jobs/{id}/progress`   | Live progress of an active run     |
//! | GET    | `/api/jobs/{id}/result`     | Stored result                      |
//! | GET    | `/api/jobs/{id}/report`     | Report derived from the result     |
//! | POST   | `/api/jobs/{id}/cancel`     | Stop an active run                 |
//! | DELETE | `/api/jobs/{id}`            | Drop a stored result               |

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde_json::{json, Value};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};
use uuid::Uuid;

use super::types::{CsvMetadata, JobAction, ValidationAccepted};
use crate::engine::{ValidationEngine, ValidationReport};
use crate::error::{EngineError, ServerError, ServerResult};
use crate::models::{ValidationOptions, ValidationProgress};
use crate::parser::parse_bytes_auto;

/// Largest accepted upload body.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ValidationEngine>,
}

impl AppState {
    pub fn new(engine: Arc<ValidationEngine>) -> Self {
        Self { engine }
    }
}

/// Build the router with CORS and request tracing.
pub fn router(engine: Arc<ValidationEngine>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/validate", post(start_validation))
        .route("/api/jobs/{id}/progress", get(job_progress))
        .route("/api/jobs/{id}/result", get(job_result))
        .route("/api/jobs/{id}/report", get(job_report))
        .route("/api/jobs/{id}/cancel", post(cancel_job))
        .route("/api/jobs/{id}", delete(clear_job))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(engine))
}

/// Start the HTTP server
pub async fn start_server(engine: Arc<ValidationEngine>, port: u16) -> ServerResult<()> {
    let app = router(engine);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "rowcheck server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "rowcheck",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Upload endpoint: `file` part (CSV) and optional `options` part (JSON).
async fn start_validation(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ValidationAccepted>), ServerError> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut options = ValidationOptions::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                file_data = Some(bytes.to_vec());
            }
            "options" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                options = serde_json::from_str(&text)
                    .map_err(|e| ServerError::BadRequest(format!("Invalid options: {}", e)))?;
            }
            other => debug!(field = other, "Ignoring multipart field"),
        }
    }

    let bytes = file_data.ok_or_else(|| ServerError::BadRequest("No file provided".into()))?;
    let parsed = parse_bytes_auto(&bytes)?;

    let job_id = Uuid::new_v4().to_string();
    info!(
        job_id = %job_id,
        file = file_name.as_deref().unwrap_or("unknown"),
        bytes = bytes.len(),
        rows = parsed.records.len(),
        "Upload accepted",
    );

    let accepted = ValidationAccepted {
        job_id: job_id.clone(),
        status: "running".to_string(),
        csv_info: CsvMetadata::from(&parsed),
        rule_count: crate::rules::resolve_rules(&parsed.headers, options.rules.clone()).len(),
    };

    let engine = state.engine.clone();
    tokio::spawn(async move {
        // Outcome is logged by the engine and read back through the job endpoints.
        let _ = engine
            .run(&job_id, &parsed.records, &parsed.headers, options)
            .await;
    });

    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

async fn job_progress(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<ValidationProgress>, ServerError> {
    state
        .engine
        .get_progress(&job_id)
        .map(Json)
        .ok_or_else(|| EngineError::NotFound(job_id).into())
}

async fn job_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response, ServerError> {
    let result = state
        .engine
        .get_result(&job_id)
        .ok_or_else(|| EngineError::NotFound(job_id))?;
    Ok(Json(result.as_ref()).into_response())
}

async fn job_report(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<ValidationReport>, ServerError> {
    Ok(Json(state.engine.generate_report(&job_id)?))
}

async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<(StatusCode, Json<JobAction>), ServerError> {
    if !state.engine.cancel(&job_id) {
        return Err(EngineError::NotFound(job_id).into());
    }
    Ok((
        StatusCode::ACCEPTED,
        Json(JobAction {
            job_id,
            action: "cancelling".to_string(),
        }),
    ))
}

async fn clear_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobAction>, ServerError> {
    if state.engine.get_result(&job_id).is_none() {
        return Err(EngineError::NotFound(job_id).into());
    }
    state.engine.clear(&job_id);
    Ok(Json(JobAction {
        job_id,
        action: "cleared".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state() -> AppState {
        AppState::new(Arc::new(ValidationEngine::new()))
    }

    fn id(s: &str) -> Path<String> {
        Path(s.to_string())
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let state = state();

        let progress = job_progress(State(state.clone()), id("nope")).await.err();
        assert_eq!(progress.map(|e| e.status_code()), Some(StatusCode::NOT_FOUND));

        let result = job_result(State(state.clone()), id("nope")).await.err();
        assert_eq!(result.map(|e| e.status_code()), Some(StatusCode::NOT_FOUND));

        let cancel = cancel_job(State(state), id("nope")).await.err();
        assert_eq!(cancel.map(|e| e.status_code()), Some(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_finished_job_endpoints() {
        let state = state();
        let rows = vec![json!({"email": "not-an-email"})];
        state
            .engine
            .run("job-1", &rows, &["email".to_string()], ValidationOptions::default())
            .await
            .unwrap();

        let result = job_result(State(state.clone()), id("job-1")).await.unwrap();
        assert_eq!(result.status(), StatusCode::OK);

        let Json(report) = job_report(State(state.clone()), id("job-1")).await.unwrap();
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 1);

        // Progress is gone once the run has finished
        let progress = job_progress(State(state.clone()), id("job-1")).await.err();
        assert_eq!(progress.map(|e| e.status_code()), Some(StatusCode::NOT_FOUND));

        let Json(action) = clear_job(State(state.clone()), id("job-1")).await.unwrap();
        assert_eq!(action.action, "cleared");

        let again = job_report(State(state), id("job-1")).await.err();
        assert_eq!(again.map(|e| e.status_code()), Some(StatusCode::NOT_FOUND));
    }
}
