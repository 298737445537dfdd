//! Job progress persistence collaborator.
//!
//! The batch loop hands each update to [`notify`], which spawns the call and
//! returns immediately. A failing or unreachable sink is logged and ignored.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::SinkError;

/// Payload pushed to the job-progress collaborator after each batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressUpdate {
    /// Percent complete (0-100).
    pub progress: u8,
    pub records_processed: usize,
    /// Seconds.
    pub estimated_time_remaining: Option<f64>,
}

/// Persists job progress somewhere outside the engine.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn update(&self, job_id: &str, update: JobProgressUpdate) -> Result<(), SinkError>;
}

/// Discards updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl ProgressSink for NoopSink {
    async fn update(&self, _job_id: &str, _update: JobProgressUpdate) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Sends updates as `PUT {base_url}/jobs/{job_id}/progress`.
#[derive(Debug, Clone)]
pub struct HttpProgressSink {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProgressSink {
    const TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(base_url: impl Into<String>) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder().timeout(Self::TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, job_id: &str) -> String {
        format!("{}/jobs/{}/progress", self.base_url, job_id)
    }
}

#[async_trait]
impl ProgressSink for HttpProgressSink {
    async fn update(&self, job_id: &str, update: JobProgressUpdate) -> Result<(), SinkError> {
        let response = self
            .client
            .put(self.endpoint(job_id))
            .json(&update)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SinkError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Fire-and-forget delivery of one update.
pub fn notify(sink: Arc<dyn ProgressSink>, job_id: String, update: JobProgressUpdate) {
    tokio::spawn(async move {
        match sink.update(&job_id, update).await {
            Ok(()) => debug!(job_id = %job_id, "Progress update delivered"),
            Err(e) => warn!(
                job_id = %job_id,
                error = %e,
                "Failed to persist job progress, continuing",
            ),
        }
    });
}
