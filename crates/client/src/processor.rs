//! Realtime channel task.
//!
//! Connects through a [`ChannelConnector`], parses every text frame into
//! an envelope, and forwards valid envelopes to the controller's update
//! queue. Parse failures and connection errors are logged only; the
//! watchdog covers for a dead channel.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use panel_core::job::JobResponse;
use panel_core::tracker::TrackerMsg;

use crate::channel::{ChannelConnector, FrameStream};
use crate::messages::parse_envelope;

/// Run the channel for `job_id` until it closes or `cancel` fires.
pub async fn run_channel(
    connector: Arc<dyn ChannelConnector>,
    job_id: String,
    updates: mpsc::UnboundedSender<TrackerMsg>,
    cancel: CancellationToken,
) {
    let frames = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        result = connector.connect(&job_id) => match result {
            Ok(frames) => frames,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Realtime channel connection failed");
                return;
            }
        },
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::debug!(job_id = %job_id, "Realtime channel closed");
        }
        _ = process_frames(frames, &job_id, &updates) => {
            tracing::info!(job_id = %job_id, "Realtime channel ended");
        }
    }
}

/// Forward frames until the stream ends, errors, or the queue is gone.
pub async fn process_frames(
    mut frames: FrameStream,
    job_id: &str,
    updates: &mpsc::UnboundedSender<TrackerMsg>,
) {
    while let Some(frame) = frames.next().await {
        match frame {
            Ok(text) => {
                let Some(envelope) = handle_text_frame(&text, job_id) else {
                    continue;
                };
                if updates.send(TrackerMsg::FrameReceived(envelope)).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::error!(job_id, error = %e, "Realtime channel receive error");
                break;
            }
        }
    }
}

/// Parse a single text frame, logging and dropping anything malformed.
pub fn handle_text_frame(text: &str, job_id: &str) -> Option<JobResponse> {
    match parse_envelope(text) {
        Ok(envelope) => {
            tracing::debug!(job_id, status = %envelope.status, "Realtime update");
            Some(envelope)
        }
        Err(e) => {
            tracing::warn!(job_id, error = %e, raw = %text, "Dropping malformed frame");
            None
        }
    }
}
