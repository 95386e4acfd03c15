//! REST client for the Panel One job API.
//!
//! Wraps job creation (`POST /generate`), status checks (`GET /job/{id}`)
//! and image fetches using [`reqwest`]. The [`JobBackend`] trait is the
//! seam the controller depends on, so tests can substitute a fake.

use async_trait::async_trait;
use reqwest::StatusCode;

use panel_core::endpoints;
use panel_core::job::JobResponse;
use panel_core::tracker::FetchFailure;
use panel_core::upload::UploadFile;

/// Multipart field carrying each uploaded image.
const IMAGES_FIELD: &str = "images";

/// Operations the job controller needs from the backend.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Submit images for a new job.
    async fn create_job(&self, files: &[UploadFile]) -> Result<JobResponse, PanelApiError>;

    /// Fetch the current state of a job.
    async fn job_status(&self, job_id: &str) -> Result<JobResponse, PanelApiError>;
}

/// HTTP client for one Panel One backend.
pub struct PanelApi {
    client: reqwest::Client,
    api_url: String,
}

/// An image body together with its content type.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Errors from the REST layer.
#[derive(Debug, thiserror::Error)]
pub enum PanelApiError {
    /// The HTTP request itself failed (network, DNS, TLS, body decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered 503: it no longer knows about its jobs.
    #[error("Service Unavailable")]
    ServiceUnavailable,

    /// Any other non-2xx status code.
    #[error("Error {status}: {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl PanelApiError {
    /// Whether this error invalidates the whole tracking session.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Self::ServiceUnavailable)
    }

    /// Classify for the tracker.
    pub fn to_fetch_failure(&self) -> FetchFailure {
        if self.is_session_fatal() {
            FetchFailure::Unavailable
        } else {
            FetchFailure::Transient(self.to_string())
        }
    }
}

impl PanelApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8080`.
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self { client, api_url }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Submit images as a multipart form, one `images` part per file.
    pub async fn submit_images(&self, files: &[UploadFile]) -> Result<JobResponse, PanelApiError> {
        let mut form = reqwest::multipart::Form::new();
        for file in files {
            let part = reqwest::multipart::Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str(&file.content_type)?;
            form = form.part(IMAGES_FIELD, part);
        }

        let response = self
            .client
            .post(endpoints::generate_url(&self.api_url))
            .multipart(form)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the current envelope for `job_id`.
    pub async fn get_job(&self, job_id: &str) -> Result<JobResponse, PanelApiError> {
        let response = self
            .client
            .get(endpoints::job_status_url(&self.api_url, job_id))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Download an image from an absolute URL.
    pub async fn fetch_image(&self, url: &str) -> Result<FetchedImage, PanelApiError> {
        let response = Self::ensure_success(self.client.get(url).send().await?).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();
        Ok(FetchedImage {
            bytes,
            content_type,
        })
    }

    // ---- private helpers ----

    /// Map non-2xx responses to errors; 503 gets its own variant.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, PanelApiError> {
        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(PanelApiError::ServiceUnavailable);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(PanelApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PanelApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl JobBackend for PanelApi {
    async fn create_job(&self, files: &[UploadFile]) -> Result<JobResponse, PanelApiError> {
        self.submit_images(files).await
    }

    async fn job_status(&self, job_id: &str) -> Result<JobResponse, PanelApiError> {
        self.get_job(job_id).await
    }
}
