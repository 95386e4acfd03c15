use std::path::PathBuf;
use std::time::Duration;

use panel_core::endpoints;

use crate::poller::DEFAULT_POLL_INTERVAL;

const DEFAULT_API_URL: &str = "http://localhost:8080";
const DEFAULT_SESSION_FILE: &str = ".panel_one_session.json";

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for a backend running locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend HTTP base URL.
    pub api_url: String,
    /// Realtime channel base URL.
    pub ws_url: String,
    /// Base URL of the image download proxy, if one is deployed.
    pub proxy_url: Option<String>,
    /// Interval between watchdog status checks.
    pub poll_interval: Duration,
    /// Where the active job id is persisted.
    pub session_file: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            ws_url: endpoints::ws_base_from_api(DEFAULT_API_URL),
            proxy_url: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                      |
    /// |----------------------------|------------------------------|
    /// | `PANEL_API_URL`            | `http://localhost:8080`      |
    /// | `PANEL_WS_URL`             | API URL with `ws(s)` scheme  |
    /// | `PANEL_PROXY_URL`          | unset                        |
    /// | `PANEL_POLL_INTERVAL_SECS` | `5`                          |
    /// | `PANEL_SESSION_FILE`       | `.panel_one_session.json`    |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unparseable values fall
    /// back to their defaults with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_url = non_empty("PANEL_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into());
        let ws_url =
            non_empty("PANEL_WS_URL").unwrap_or_else(|| endpoints::ws_base_from_api(&api_url));
        let proxy_url = non_empty("PANEL_PROXY_URL");

        let poll_interval = match non_empty("PANEL_POLL_INTERVAL_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    tracing::warn!(value = %raw, "Invalid PANEL_POLL_INTERVAL_SECS, using default");
                    DEFAULT_POLL_INTERVAL
                }
            },
            None => DEFAULT_POLL_INTERVAL,
        };

        let session_file = non_empty("PANEL_SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE));

        Self {
            api_url,
            ws_url,
            proxy_url,
            poll_interval,
            session_file,
        }
    }

    /// Whether the backend is reached over TLS; upgrades the channel to `wss://`.
    pub fn secure(&self) -> bool {
        self.api_url.starts_with("https://")
    }
}
