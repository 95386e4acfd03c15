//! Naming and header values for downloaded result images.
//!
//! Shared by the download proxy and by clients that save the result
//! directly.

/// Base name (without extension) of a saved result.
pub const RESULT_FILE_STEM: &str = "panel-one-result";

/// Content type assumed when the upstream does not send one.
pub const DEFAULT_CONTENT_TYPE: &str = "image/png";

/// Cache directive attached to proxied images.
pub const PROXY_CACHE_CONTROL: &str = "public, max-age=3600";

/// File extension for an image content type.
///
/// `jpeg` maps to `jpg`, `webp` to `webp`, anything else to `png`.
pub fn extension_for_content_type(content_type: &str) -> &'static str {
    if content_type.contains("jpeg") {
        "jpg"
    } else if content_type.contains("webp") {
        "webp"
    } else {
        "png"
    }
}

/// File name a result with `content_type` is saved under.
pub fn result_file_name(content_type: &str) -> String {
    format!(
        "{RESULT_FILE_STEM}.{}",
        extension_for_content_type(content_type)
    )
}

/// `Content-Disposition` value forcing a download.
pub fn attachment_disposition(content_type: &str) -> String {
    format!("attachment; filename=\"{}\"", result_file_name(content_type))
}
