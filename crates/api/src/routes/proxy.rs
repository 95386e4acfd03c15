use axum::routing::get;
use axum::Router;

use crate::handlers::proxy_image;
use crate::state::AppState;

/// Mount the image download proxy.
///
/// ```text
/// /api/proxy-image?url=<encoded URL>    GET
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/api/proxy-image", get(proxy_image::proxy_image))
}
