//! URL construction for the backend's HTTP and WebSocket endpoints.

/// `POST` target for new generation jobs.
pub fn generate_url(api_url: &str) -> String {
    format!("{}/generate", api_url.trim_end_matches('/'))
}

/// `GET` target for the current state of a job.
pub fn job_status_url(api_url: &str, job_id: &str) -> String {
    format!("{}/job/{}", api_url.trim_end_matches('/'), job_id)
}

/// Realtime channel URL for `job_id`.
///
/// Trailing slashes are stripped from `ws_base`; a base already ending in
/// `/ws` gets `/{job_id}` appended, anything else `/ws/{job_id}`. With
/// `secure` set a plain `ws://` base is upgraded to `wss://`.
pub fn channel_url(ws_base: &str, job_id: &str, secure: bool) -> String {
    let mut base = ws_base.to_string();
    if secure {
        if let Some(rest) = base.strip_prefix("ws://") {
            base = format!("wss://{rest}");
        }
    }

    let base = base.trim_end_matches('/');
    if base.ends_with("/ws") {
        format!("{base}/{job_id}")
    } else {
        format!("{base}/ws/{job_id}")
    }
}

/// Default WebSocket base for an HTTP API base (`http` -> `ws`, `https` -> `wss`).
pub fn ws_base_from_api(api_url: &str) -> String {
    if let Some(rest) = api_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = api_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        api_url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_endpoints_ignore_trailing_slash() {
        assert_eq!(generate_url("http://api:8080/"), "http://api:8080/generate");
        assert_eq!(
            job_status_url("http://api:8080", "abc123"),
            "http://api:8080/job/abc123"
        );
    }

    #[test]
    fn channel_url_appends_ws_segment() {
        assert_eq!(
            channel_url("ws://api:8080", "xyz", false),
            "ws://api:8080/ws/xyz"
        );
    }

    #[test]
    fn channel_url_does_not_duplicate_ws_segment() {
        assert_eq!(
            channel_url("ws://api:8080/ws/", "xyz", false),
            "ws://api:8080/ws/xyz"
        );
        assert_eq!(
            channel_url("ws://api:8080/ws//", "xyz", false),
            "ws://api:8080/ws/xyz"
        );
    }

    #[test]
    fn secure_upgrades_plain_scheme() {
        assert_eq!(
            channel_url("ws://api.example.com", "xyz", true),
            "wss://api.example.com/ws/xyz"
        );
        assert_eq!(
            channel_url("wss://api.example.com/ws", "xyz", true),
            "wss://api.example.com/ws/xyz"
        );
    }

    #[test]
    fn insecure_keeps_scheme() {
        assert_eq!(
            channel_url("ws://localhost:8080", "a", false),
            "ws://localhost:8080/ws/a"
        );
    }

    #[test]
    fn ws_base_derivation() {
        assert_eq!(ws_base_from_api("http://localhost:8080"), "ws://localhost:8080");
        assert_eq!(ws_base_from_api("https://api.example.com"), "wss://api.example.com");
        assert_eq!(ws_base_from_api("ws://already"), "ws://already");
    }
}
