use std::sync::Arc;
use std::time::Duration;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// HTTP client for upstream image fetches.
    pub http: reqwest::Client,
}

impl AppState {
    /// Build state with an upstream client honouring `upstream_timeout_secs`.
    pub fn new(config: ServerConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upstream_timeout_secs))
            .build()?;
        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }
}
