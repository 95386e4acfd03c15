//! Watchdog poller: periodic status checks independent of the channel.
//!
//! Fires once immediately and then every interval while the job is being
//! tracked. Each result is queued for the controller tagged with the job
//! id the request was issued for, so answers to a job that is no longer
//! tracked are discarded by the tracker.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use panel_core::job::JobResponse;
use panel_core::tracker::{FetchFailure, TrackerMsg};

use crate::api::{JobBackend, PanelApiError};

/// Default interval between watchdog status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Poll `job_id` until `cancel` fires or the update queue is dropped.
pub async fn run_watchdog(
    backend: Arc<dyn JobBackend>,
    job_id: String,
    interval: Duration,
    updates: mpsc::UnboundedSender<TrackerMsg>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let msg = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = backend.job_status(&job_id) => status_msg(&job_id, result),
        };

        if updates.send(msg).is_err() {
            break;
        }
    }

    tracing::debug!(job_id = %job_id, "Watchdog stopped");
}

/// Turn a status check result into a tracker message, logging failures.
pub fn status_msg(job_id: &str, result: Result<JobResponse, PanelApiError>) -> TrackerMsg {
    match result {
        Ok(envelope) if envelope.job_id != job_id => {
            tracing::warn!(
                job_id,
                answered_for = %envelope.job_id,
                "Status check answered for another job"
            );
            TrackerMsg::StatusFetchFailed {
                job_id: job_id.to_string(),
                failure: FetchFailure::Transient(format!(
                    "Status answered for job {}",
                    envelope.job_id
                )),
            }
        }
        Ok(envelope) => TrackerMsg::StatusFetched(envelope),
        Err(e) => {
            if e.is_session_fatal() {
                tracing::error!(job_id, error = %e, "Backend unavailable during status check");
            } else {
                tracing::warn!(job_id, error = %e, "Status check failed");
            }
            TrackerMsg::StatusFetchFailed {
                job_id: job_id.to_string(),
                failure: e.to_fetch_failure(),
            }
        }
    }
}
