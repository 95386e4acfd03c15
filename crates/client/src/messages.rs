//! Realtime channel frame parsing.
//!
//! The backend pushes [`JobResponse`] envelopes as JSON text frames. Each
//! frame is parsed on its own; a bad frame never affects the next one.

use panel_core::job::JobResponse;

/// Parse one text frame into an envelope.
///
/// Returns `Err` for malformed JSON, missing fields, or unknown status
/// values. Callers should log and drop the frame.
pub fn parse_envelope(text: &str) -> Result<JobResponse, serde_json::Error> {
    serde_json::from_str(text)
}
