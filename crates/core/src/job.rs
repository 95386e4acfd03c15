//! Job status model and the response envelope exchanged with the backend.
//!
//! The same [`JobResponse`] shape arrives from the creation request, the
//! status endpoint, and the realtime channel.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::JobId;

/// Lifecycle states of a generation job, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    ProcessingImages,
    GeneratingStory,
    GeneratingImage,
    Uploading,
    Completed,
    Failed,
}

impl JobStatus {
    /// Every status, in pipeline order.
    pub const ALL: [JobStatus; 7] = [
        JobStatus::Queued,
        JobStatus::ProcessingImages,
        JobStatus::GeneratingStory,
        JobStatus::GeneratingImage,
        JobStatus::Uploading,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    /// `COMPLETED` and `FAILED` end tracking for a job.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Wire representation (`SCREAMING_SNAKE_CASE`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::ProcessingImages => "PROCESSING_IMAGES",
            Self::GeneratingStory => "GENERATING_STORY",
            Self::GeneratingImage => "GENERATING_IMAGE",
            Self::Uploading => "UPLOADING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown job status: '{s}'")))
    }
}

/// Snapshot of a job as reported by the backend.
///
/// Envelopes are idempotent snapshots, not deltas. `result_url` and
/// `error_message` may be `null` or missing on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(default)]
    pub result_url: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl JobResponse {
    /// Envelope carrying only a status, as returned right after creation.
    pub fn with_status(job_id: impl Into<JobId>, status: JobStatus) -> Self {
        Self {
            job_id: job_id.into(),
            status,
            result_url: None,
            error_message: None,
        }
    }
}
