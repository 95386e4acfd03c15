//! Handler for downloading result images through the server.
//!
//! Browsers cannot force a download of a cross-origin image, so the
//! client asks this endpoint instead. The upstream body is streamed back
//! with attachment headers.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::Response;
use serde::Deserialize;

use panel_core::download::{attachment_disposition, DEFAULT_CONTENT_TYPE, PROXY_CACHE_CONTROL};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Message returned when the `url` query parameter is absent.
pub const MISSING_URL_MESSAGE: &str = "Missing URL param";

#[derive(Debug, Deserialize)]
pub struct ProxyImageQuery {
    /// Absolute URL of the image to fetch.
    pub url: Option<String>,
}

// ---------------------------------------------------------------------------
// GET /api/proxy-image?url=...
// ---------------------------------------------------------------------------

/// Fetch `url` and return it as a downloadable attachment.
pub async fn proxy_image(
    State(state): State<AppState>,
    Query(params): Query<ProxyImageQuery>,
) -> AppResult<Response<Body>> {
    let url = params
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest(MISSING_URL_MESSAGE.into()))?;

    let upstream = state
        .http
        .get(&url)
        .send()
        .await
        .map_err(|e| AppError::Upstream(format!("{url}: {e}")))?;

    let status = upstream.status();
    if !status.is_success() {
        return Err(AppError::Upstream(format!("{url}: upstream returned {status}")));
    }

    let content_type = upstream
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    tracing::debug!(url = %url, content_type = %content_type, "Proxying image");

    Response::builder()
        .header(CONTENT_TYPE, &content_type)
        .header(CONTENT_DISPOSITION, attachment_disposition(&content_type))
        .header(CACHE_CONTROL, PROXY_CACHE_CONTROL)
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| AppError::Internal(format!("Failed to build proxy response: {e}")))
}
