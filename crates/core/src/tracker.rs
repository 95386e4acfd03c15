//! Job tracking state machine.
//!
//! [`JobTracker`] holds the client's view of the active job and reacts to
//! [`TrackerMsg`]s by mutating itself and returning [`Effect`]s for the
//! runtime to execute (persist the id, open the channel, start the
//! watchdog, ...). It performs no I/O, so every transition is testable
//! synchronously.
//!
//! Updates from the realtime channel and the watchdog are applied
//! last-writer-wins. An update is accepted only while it refers to the job
//! currently tracked, which discards results of requests issued before a
//! reset or a new start.

use crate::job::{JobResponse, JobStatus};
use crate::types::JobId;
use crate::view::{self, View};

/// Notice shown when the backend reports it is unavailable.
pub const SERVICE_UNAVAILABLE_NOTICE: &str = "Servicio no disponible. Intentando limpiar sesión.";

/// Notice shown when a job could not be created.
pub const START_FAILED_NOTICE: &str = "Error al iniciar la generación.";

/// Where a job stands with respect to its creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No job.
    #[default]
    Idle,
    /// Creation request in flight; status is optimistically `QUEUED`.
    Pending,
    /// The backend knows the job (created or restored).
    Confirmed,
    /// The creation request failed.
    Failed,
}

/// Why a status check did not produce an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// The backend lost track of its jobs; the session is meaningless.
    Unavailable,
    /// Anything else. Retried on the next watchdog tick.
    Transient(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A user-visible message raised by the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Inputs to the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerMsg {
    /// A job id was found in the session store at startup.
    SessionRestored { job_id: JobId },
    /// The user submitted images; the creation request is about to go out.
    StartRequested,
    /// The creation request succeeded.
    JobCreated(JobResponse),
    /// The creation request failed.
    CreateFailed { message: String },
    /// A status check (restore or watchdog) returned an envelope.
    StatusFetched(JobResponse),
    /// A status check for `job_id` failed.
    StatusFetchFailed { job_id: JobId, failure: FetchFailure },
    /// The realtime channel delivered an envelope.
    FrameReceived(JobResponse),
    /// The user asked to start over.
    ResetRequested,
}

/// Side effects requested by the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Write the job id to the session store.
    PersistJobId(JobId),
    /// Remove the job id from the session store.
    ClearSession,
    /// Issue one status check whose result comes back as
    /// [`TrackerMsg::StatusFetched`] or [`TrackerMsg::StatusFetchFailed`].
    FetchStatus { job_id: JobId },
    /// Open the realtime channel for the job.
    OpenChannel { job_id: JobId },
    /// Start the watchdog poller for the job.
    StartWatchdog { job_id: JobId },
    /// Close the channel and stop the watchdog, whatever job they serve.
    StopTracking,
    /// Show a message to the user.
    Notify(Notice),
}

/// Client-side state of the active job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobTracker {
    job_id: Option<JobId>,
    status: Option<JobStatus>,
    result_url: Option<String>,
    error: Option<String>,
    phase: Phase,
    /// Channel and watchdog are running for `job_id`.
    tracking: bool,
    /// The startup status check for a restored id has not answered yet.
    restoring: bool,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn status(&self) -> Option<JobStatus> {
        self.status
    }

    pub fn result_url(&self) -> Option<&str> {
        self.result_url.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn is_restoring(&self) -> bool {
        self.restoring
    }

    /// Whether channel/poller activity can still change this state.
    pub fn is_settled(&self) -> bool {
        !self.tracking && !self.restoring && self.phase != Phase::Pending
    }

    /// The screen for the current state.
    pub fn view(&self) -> View {
        view::render(self.status, self.result_url(), self.error())
    }

    /// Apply `msg` and return the effects to execute, in order.
    pub fn handle(&mut self, msg: TrackerMsg) -> Vec<Effect> {
        match msg {
            TrackerMsg::SessionRestored { job_id } => self.on_session_restored(job_id),
            TrackerMsg::StartRequested => self.on_start_requested(),
            TrackerMsg::JobCreated(envelope) => self.on_job_created(envelope),
            TrackerMsg::CreateFailed { message } => self.on_create_failed(message),
            TrackerMsg::StatusFetched(envelope) => self.on_status_fetched(envelope),
            TrackerMsg::StatusFetchFailed { job_id, failure } => {
                self.on_status_fetch_failed(&job_id, failure)
            }
            TrackerMsg::FrameReceived(envelope) => self.on_frame(envelope),
            TrackerMsg::ResetRequested => self.reset(),
        }
    }

    // ---- transitions ----

    fn on_session_restored(&mut self, job_id: JobId) -> Vec<Effect> {
        if self.job_id.is_some() || self.phase == Phase::Pending {
            return Vec::new();
        }
        self.job_id = Some(job_id.clone());
        self.phase = Phase::Confirmed;
        self.restoring = true;
        vec![Effect::FetchStatus { job_id }]
    }

    fn on_start_requested(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.tracking {
            effects.push(Effect::StopTracking);
        }
        *self = Self {
            status: Some(JobStatus::Queued),
            phase: Phase::Pending,
            ..Self::default()
        };
        effects
    }

    fn on_job_created(&mut self, envelope: JobResponse) -> Vec<Effect> {
        if self.phase != Phase::Pending {
            return Vec::new();
        }
        let job_id = envelope.job_id.clone();
        self.job_id = Some(job_id.clone());
        self.phase = Phase::Confirmed;

        let mut effects = vec![Effect::PersistJobId(job_id.clone())];
        self.apply(envelope);
        effects.extend(self.begin_tracking_unless_terminal(job_id));
        effects
    }

    fn on_create_failed(&mut self, message: String) -> Vec<Effect> {
        if self.phase != Phase::Pending {
            return Vec::new();
        }
        self.job_id = None;
        self.status = Some(JobStatus::Failed);
        self.error = Some(message);
        self.phase = Phase::Failed;
        vec![
            Effect::ClearSession,
            Effect::Notify(Notice::error(START_FAILED_NOTICE)),
        ]
    }

    fn on_status_fetched(&mut self, envelope: JobResponse) -> Vec<Effect> {
        if !self.is_current(&envelope.job_id) {
            // The restore check answered for another job. It still ends the
            // restore; the channel and watchdog take over.
            return match self.job_id.clone() {
                Some(job_id) if self.restoring => {
                    self.restoring = false;
                    self.begin_tracking_unless_terminal(job_id)
                }
                _ => Vec::new(),
            };
        }
        if self.restoring {
            self.restoring = false;
            let job_id = envelope.job_id.clone();
            self.apply(envelope);
            return self.begin_tracking_unless_terminal(job_id);
        }
        if self.tracking {
            return self.apply_tracked(envelope);
        }
        Vec::new()
    }

    fn on_frame(&mut self, envelope: JobResponse) -> Vec<Effect> {
        if self.tracking && self.is_current(&envelope.job_id) {
            self.apply_tracked(envelope)
        } else {
            Vec::new()
        }
    }

    fn on_status_fetch_failed(&mut self, job_id: &str, failure: FetchFailure) -> Vec<Effect> {
        if !self.is_current(job_id) || !(self.tracking || self.restoring) {
            return Vec::new();
        }
        match failure {
            FetchFailure::Unavailable => {
                let mut effects = self.reset();
                effects.push(Effect::Notify(Notice::error(SERVICE_UNAVAILABLE_NOTICE)));
                effects
            }
            FetchFailure::Transient(_) if self.restoring => {
                // The first check failed; let the channel and watchdog catch up.
                self.restoring = false;
                self.begin_tracking_unless_terminal(job_id.to_string())
            }
            FetchFailure::Transient(_) => Vec::new(),
        }
    }

    fn reset(&mut self) -> Vec<Effect> {
        *self = Self::default();
        vec![Effect::StopTracking, Effect::ClearSession]
    }

    // ---- helpers ----

    fn is_current(&self, job_id: &str) -> bool {
        self.job_id.as_deref() == Some(job_id)
    }

    /// Overwrite status; keep previously known result/error when the
    /// envelope carries none.
    fn apply(&mut self, envelope: JobResponse) {
        self.status = Some(envelope.status);
        if let Some(url) = envelope.result_url {
            self.result_url = Some(url);
        }
        if let Some(message) = envelope.error_message {
            self.error = Some(message);
        }
    }

    fn apply_tracked(&mut self, envelope: JobResponse) -> Vec<Effect> {
        self.apply(envelope);
        if self.status.is_some_and(JobStatus::is_terminal) {
            self.tracking = false;
            vec![Effect::StopTracking]
        } else {
            Vec::new()
        }
    }

    fn begin_tracking_unless_terminal(&mut self, job_id: JobId) -> Vec<Effect> {
        if self.status.is_some_and(JobStatus::is_terminal) {
            return Vec::new();
        }
        self.tracking = true;
        vec![
            Effect::OpenChannel {
                job_id: job_id.clone(),
            },
            Effect::StartWatchdog { job_id },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::StepState;
    use assert_matches::assert_matches;

    fn envelope(job_id: &str, status: JobStatus) -> JobResponse {
        JobResponse::with_status(job_id, status)
    }

    fn started(job_id: &str) -> JobTracker {
        let mut tracker = JobTracker::new();
        tracker.handle(TrackerMsg::StartRequested);
        tracker.handle(TrackerMsg::JobCreated(envelope(job_id, JobStatus::Queued)));
        tracker
    }

    #[test]
    fn start_is_optimistic() {
        let mut tracker = JobTracker::new();
        let effects = tracker.handle(TrackerMsg::StartRequested);

        assert!(effects.is_empty());
        assert_eq!(tracker.status(), Some(JobStatus::Queued));
        assert_eq!(tracker.phase(), Phase::Pending);
        assert!(tracker.job_id().is_none());
        assert_matches!(tracker.view(), View::Progress { .. });
    }

    #[test]
    fn created_job_is_persisted_and_tracked() {
        let mut tracker = JobTracker::new();
        tracker.handle(TrackerMsg::StartRequested);
        let effects = tracker.handle(TrackerMsg::JobCreated(envelope("xyz", JobStatus::Queued)));

        assert_eq!(
            effects,
            vec![
                Effect::PersistJobId("xyz".into()),
                Effect::OpenChannel { job_id: "xyz".into() },
                Effect::StartWatchdog { job_id: "xyz".into() },
            ]
        );
        assert_eq!(tracker.job_id(), Some("xyz"));
        assert_eq!(tracker.phase(), Phase::Confirmed);
        assert!(tracker.is_tracking());
    }

    #[test]
    fn create_failure_surfaces_as_failed() {
        let mut tracker = JobTracker::new();
        tracker.handle(TrackerMsg::StartRequested);
        let effects = tracker.handle(TrackerMsg::CreateFailed {
            message: "Failed to start generation".into(),
        });

        assert_eq!(tracker.status(), Some(JobStatus::Failed));
        assert_eq!(tracker.phase(), Phase::Failed);
        assert!(tracker.job_id().is_none());
        assert_eq!(effects[0], Effect::ClearSession);
        assert_matches!(&effects[1], Effect::Notify(n) if n.level == NoticeLevel::Error);
        assert_eq!(
            tracker.view(),
            View::Error {
                message: "Failed to start generation".into()
            }
        );
    }

    #[test]
    fn terminal_update_stops_tracking_once() {
        let mut tracker = started("xyz");

        let mut done = envelope("xyz", JobStatus::Completed);
        done.result_url = Some("https://cdn/result.png".into());
        let effects = tracker.handle(TrackerMsg::FrameReceived(done.clone()));

        assert_eq!(effects, vec![Effect::StopTracking]);
        assert!(!tracker.is_tracking());
        assert!(tracker.is_settled());

        // Late updates for the same job never restart tracking.
        let effects = tracker.handle(TrackerMsg::StatusFetched(envelope("xyz", JobStatus::Uploading)));
        assert!(effects.is_empty());
        assert_eq!(tracker.status(), Some(JobStatus::Completed));
        assert_eq!(
            tracker.view(),
            View::Result {
                result_url: "https://cdn/result.png".into()
            }
        );
    }

    #[test]
    fn failed_update_stops_tracking_and_keeps_session() {
        let mut tracker = started("xyz");
        let mut failed = envelope("xyz", JobStatus::Failed);
        failed.error_message = Some("model error".into());

        let effects = tracker.handle(TrackerMsg::StatusFetched(failed));

        assert_eq!(effects, vec![Effect::StopTracking]);
        assert_eq!(tracker.job_id(), Some("xyz"));
        assert_eq!(tracker.view(), View::Error { message: "model error".into() });
    }

    #[test]
    fn last_writer_wins_between_sources() {
        let mut tracker = started("xyz");
        tracker.handle(TrackerMsg::FrameReceived(envelope("xyz", JobStatus::GeneratingStory)));
        tracker.handle(TrackerMsg::StatusFetched(envelope("xyz", JobStatus::ProcessingImages)));

        assert_eq!(tracker.status(), Some(JobStatus::ProcessingImages));
        assert!(tracker.is_tracking());
    }

    #[test]
    fn null_fields_do_not_erase_known_values() {
        let mut tracker = started("xyz");
        let mut with_error = envelope("xyz", JobStatus::GeneratingImage);
        with_error.error_message = Some("retrying".into());
        tracker.handle(TrackerMsg::FrameReceived(with_error));
        tracker.handle(TrackerMsg::FrameReceived(envelope("xyz", JobStatus::Uploading)));

        assert_eq!(tracker.error(), Some("retrying"));
    }

    #[test]
    fn updates_for_other_jobs_are_ignored() {
        let mut tracker = started("xyz");
        let effects = tracker.handle(TrackerMsg::FrameReceived(envelope("old", JobStatus::Failed)));

        assert!(effects.is_empty());
        assert_eq!(tracker.status(), Some(JobStatus::Queued));
        assert!(tracker.is_tracking());
    }

    #[test]
    fn restore_fetches_once_before_tracking() {
        let mut tracker = JobTracker::new();
        let effects = tracker.handle(TrackerMsg::SessionRestored {
            job_id: "abc123".into(),
        });
        assert_eq!(effects, vec![Effect::FetchStatus { job_id: "abc123".into() }]);
        assert!(tracker.is_restoring());
        assert!(!tracker.is_tracking());

        let effects = tracker.handle(TrackerMsg::StatusFetched(envelope(
            "abc123",
            JobStatus::GeneratingImage,
        )));
        assert_eq!(
            effects,
            vec![
                Effect::OpenChannel { job_id: "abc123".into() },
                Effect::StartWatchdog { job_id: "abc123".into() },
            ]
        );

        let View::Progress { steps } = tracker.view() else {
            panic!("expected progress view");
        };
        let current: Vec<_> = steps
            .iter()
            .filter(|s| s.state == StepState::Current)
            .map(|s| s.label)
            .collect();
        assert_eq!(current, vec!["Generando panel final..."]);
        assert!(steps[..3].iter().all(|s| s.state == StepState::Completed));
    }

    #[test]
    fn restore_of_completed_job_does_not_track() {
        let mut tracker = JobTracker::new();
        tracker.handle(TrackerMsg::SessionRestored { job_id: "done".into() });
        let mut completed = envelope("done", JobStatus::Completed);
        completed.result_url = Some("https://cdn/done.png".into());

        let effects = tracker.handle(TrackerMsg::StatusFetched(completed));

        assert!(effects.is_empty());
        assert!(tracker.is_settled());
        assert_matches!(tracker.view(), View::Result { .. });
    }

    #[test]
    fn restore_with_transient_failure_still_tracks() {
        let mut tracker = JobTracker::new();
        tracker.handle(TrackerMsg::SessionRestored { job_id: "abc".into() });
        let effects = tracker.handle(TrackerMsg::StatusFetchFailed {
            job_id: "abc".into(),
            failure: FetchFailure::Transient("Error 500".into()),
        });

        assert_eq!(
            effects,
            vec![
                Effect::OpenChannel { job_id: "abc".into() },
                Effect::StartWatchdog { job_id: "abc".into() },
            ]
        );
        assert!(tracker.status().is_none());
    }

    #[test]
    fn restore_answered_for_another_job_still_settles_into_tracking() {
        let mut tracker = JobTracker::new();
        tracker.handle(TrackerMsg::SessionRestored { job_id: "abc123".into() });

        let effects = tracker.handle(TrackerMsg::StatusFetched(envelope(
            "other",
            JobStatus::Completed,
        )));

        assert_eq!(
            effects,
            vec![
                Effect::OpenChannel { job_id: "abc123".into() },
                Effect::StartWatchdog { job_id: "abc123".into() },
            ]
        );
        assert!(!tracker.is_restoring());
        assert!(tracker.is_tracking());
        assert_eq!(tracker.job_id(), Some("abc123"));
        assert!(tracker.status().is_none());

        // Once tracking, envelopes for other jobs are ignored again.
        let effects = tracker.handle(TrackerMsg::StatusFetched(envelope(
            "other",
            JobStatus::Failed,
        )));
        assert!(effects.is_empty());
        assert!(tracker.is_tracking());
    }

    #[test]
    fn unavailable_resets_the_session() {
        let mut tracker = started("xyz");
        tracker.handle(TrackerMsg::FrameReceived(envelope("xyz", JobStatus::GeneratingStory)));

        let effects = tracker.handle(TrackerMsg::StatusFetchFailed {
            job_id: "xyz".into(),
            failure: FetchFailure::Unavailable,
        });

        assert_eq!(tracker, JobTracker::new());
        assert_eq!(effects[..2], [Effect::StopTracking, Effect::ClearSession]);
        assert_eq!(
            effects[2],
            Effect::Notify(Notice::error(SERVICE_UNAVAILABLE_NOTICE))
        );
    }

    #[test]
    fn transient_watchdog_failure_is_ignored() {
        let mut tracker = started("xyz");
        let before = tracker.clone();
        let effects = tracker.handle(TrackerMsg::StatusFetchFailed {
            job_id: "xyz".into(),
            failure: FetchFailure::Transient("timeout".into()),
        });
        assert!(effects.is_empty());
        assert_eq!(tracker, before);
    }

    #[test]
    fn reset_returns_to_first_load() {
        let mut tracker = started("xyz");
        let effects = tracker.handle(TrackerMsg::ResetRequested);

        assert_eq!(tracker, JobTracker::new());
        assert_eq!(effects, vec![Effect::StopTracking, Effect::ClearSession]);
        assert_eq!(tracker.view(), View::Upload);

        // Idempotent when nothing is active.
        let effects = tracker.handle(TrackerMsg::ResetRequested);
        assert_eq!(effects, vec![Effect::StopTracking, Effect::ClearSession]);
    }

    #[test]
    fn creation_result_after_reset_is_discarded() {
        let mut tracker = JobTracker::new();
        tracker.handle(TrackerMsg::StartRequested);
        tracker.handle(TrackerMsg::ResetRequested);

        let effects = tracker.handle(TrackerMsg::JobCreated(envelope("late", JobStatus::Queued)));
        assert!(effects.is_empty());
        assert_eq!(tracker, JobTracker::new());
    }

    #[test]
    fn new_start_stops_previous_tracking() {
        let mut tracker = started("first");
        let effects = tracker.handle(TrackerMsg::StartRequested);

        assert_eq!(effects, vec![Effect::StopTracking]);
        assert!(tracker.job_id().is_none());

        let effects = tracker.handle(TrackerMsg::JobCreated(envelope("second", JobStatus::Queued)));
        assert_eq!(effects[0], Effect::PersistJobId("second".into()));
        // Stragglers from the first job no longer apply.
        tracker.handle(TrackerMsg::FrameReceived(envelope("first", JobStatus::Completed)));
        assert_eq!(tracker.status(), Some(JobStatus::Queued));
    }

    #[test]
    fn same_final_triple_yields_same_view_regardless_of_order() {
        let mut a = started("j");
        a.handle(TrackerMsg::FrameReceived(envelope("j", JobStatus::GeneratingStory)));
        a.handle(TrackerMsg::StatusFetched(envelope("j", JobStatus::Uploading)));

        let mut b = started("j");
        b.handle(TrackerMsg::StatusFetched(envelope("j", JobStatus::ProcessingImages)));
        b.handle(TrackerMsg::FrameReceived(envelope("j", JobStatus::Uploading)));

        assert_eq!(a.view(), b.view());
    }
}
