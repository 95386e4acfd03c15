//! Saving the result image of a completed job.
//!
//! Goes through the download proxy when one is configured and falls back
//! to fetching `result_url` directly if the proxy fails.

use std::path::{Path, PathBuf};

use panel_core::download::{self, DEFAULT_CONTENT_TYPE};

use crate::api::{FetchedImage, PanelApi, PanelApiError};

/// Proxy route serving result images as attachments.
pub const PROXY_IMAGE_PATH: &str = "/api/proxy-image";

/// A downloaded result ready to be written out.
#[derive(Debug, Clone)]
pub struct DownloadedResult {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub file_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Invalid proxy URL: {0}")]
    InvalidProxyUrl(String),

    #[error(transparent)]
    Fetch(#[from] PanelApiError),

    #[error("Failed to write result: {0}")]
    Io(#[from] std::io::Error),
}

/// Proxy URL for downloading `result_url`.
pub fn proxy_download_url(proxy_base: &str, result_url: &str) -> Result<String, DownloadError> {
    let endpoint = format!("{}{PROXY_IMAGE_PATH}", proxy_base.trim_end_matches('/'));
    reqwest::Url::parse_with_params(&endpoint, &[("url", result_url)])
        .map(String::from)
        .map_err(|e| DownloadError::InvalidProxyUrl(format!("{endpoint}: {e}")))
}

/// Fetch the result image, preferring the proxy.
pub async fn fetch_result(
    api: &PanelApi,
    proxy_base: Option<&str>,
    result_url: &str,
) -> Result<DownloadedResult, DownloadError> {
    if let Some(proxy_base) = proxy_base {
        let proxied = match proxy_download_url(proxy_base, result_url) {
            Ok(url) => api.fetch_image(&url).await.map_err(DownloadError::from),
            Err(e) => Err(e),
        };
        match proxied {
            Ok(image) => return Ok(into_result(image)),
            Err(e) => {
                tracing::warn!(error = %e, "Proxy download failed, fetching result directly");
            }
        }
    }

    let image = api.fetch_image(result_url).await?;
    Ok(into_result(image))
}

/// Write `result` into `dir` under its result file name.
pub async fn save_result(result: &DownloadedResult, dir: &Path) -> Result<PathBuf, DownloadError> {
    let path = dir.join(&result.file_name);
    tokio::fs::write(&path, &result.bytes).await?;
    tracing::info!(path = %path.display(), bytes = result.bytes.len(), "Result saved");
    Ok(path)
}

fn into_result(image: FetchedImage) -> DownloadedResult {
    let content_type = image
        .content_type
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
    DownloadedResult {
        file_name: download::result_file_name(&content_type),
        bytes: image.bytes,
        content_type,
    }
}
