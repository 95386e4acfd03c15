//! Job controller: the runtime around [`JobTracker`].
//!
//! [`JobController`] owns the tracker and executes the effects it asks
//! for: it talks to the backend, persists the job id, and spawns the
//! realtime channel and watchdog tasks for the tracked job. Both tasks
//! report back through a single update queue, which the controller drains
//! one message at a time, so job state is only ever touched through
//! `&mut self`.
//!
//! Every applied update is published as a [`JobTracker`] snapshot on a
//! [`tokio::sync::watch`] channel; user-visible notices are broadcast via
//! [`tokio::sync::broadcast`]. Call [`JobController::subscribe`] and
//! [`JobController::notices`] to receive them.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use panel_core::tracker::{Effect, JobTracker, Notice, NoticeLevel, TrackerMsg};
use panel_core::types::JobId;
use panel_core::upload::UploadFile;
use panel_core::view::View;

use crate::api::{JobBackend, PanelApi, PanelApiError};
use crate::channel::{ChannelConnector, WsConnector};
use crate::config::ClientConfig;
use crate::poller::{run_watchdog, status_msg, DEFAULT_POLL_INTERVAL};
use crate::processor::run_channel;
use crate::session::{FileSessionStore, SessionStore};

/// Broadcast channel capacity for notices.
const NOTICE_CHANNEL_CAPACITY: usize = 16;

/// How long [`JobController::shutdown`] waits for each task.
const TASK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Error shown when the backend rejects a creation request.
const START_FAILED_MESSAGE: &str = "Failed to start generation";

/// Tracks one generation job at a time.
pub struct JobController {
    tracker: JobTracker,
    backend: Arc<dyn JobBackend>,
    connector: Arc<dyn ChannelConnector>,
    session: Arc<dyn SessionStore>,
    poll_interval: Duration,
    updates_tx: mpsc::UnboundedSender<TrackerMsg>,
    updates_rx: mpsc::UnboundedReceiver<TrackerMsg>,
    snapshot_tx: watch::Sender<JobTracker>,
    notice_tx: broadcast::Sender<Notice>,
    /// Channel and watchdog tasks of the tracked job.
    active: Option<ActiveTracking>,
}

/// Internal bookkeeping for the tasks serving one job.
struct ActiveTracking {
    job_id: JobId,
    /// Cancels both tasks.
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl JobController {
    pub fn new(
        backend: Arc<dyn JobBackend>,
        connector: Arc<dyn ChannelConnector>,
        session: Arc<dyn SessionStore>,
    ) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(JobTracker::new());
        let (notice_tx, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);

        Self {
            tracker: JobTracker::new(),
            backend,
            connector,
            session,
            poll_interval: DEFAULT_POLL_INTERVAL,
            updates_tx,
            updates_rx,
            snapshot_tx,
            notice_tx,
            active: None,
        }
    }

    /// Build a controller talking to the backend described by `config`.
    pub fn from_config(config: &ClientConfig) -> Self {
        let backend = Arc::new(PanelApi::new(config.api_url.clone()));
        let connector = Arc::new(WsConnector::new(config.ws_url.clone(), config.secure()));
        let session = Arc::new(FileSessionStore::new(config.session_file.clone()));
        Self::new(backend, connector, session).with_poll_interval(config.poll_interval)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Receive a snapshot after every applied update.
    pub fn subscribe(&self) -> watch::Receiver<JobTracker> {
        self.snapshot_tx.subscribe()
    }

    /// Receive user-visible notices.
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notice_tx.subscribe()
    }

    pub fn state(&self) -> &JobTracker {
        &self.tracker
    }

    pub fn view(&self) -> View {
        self.tracker.view()
    }

    /// Pick up a job left behind by a previous run.
    ///
    /// Issues one status check for the persisted id and applies it before
    /// any channel or watchdog starts. Returns the restored id.
    pub async fn restore_session(&mut self) -> Option<JobId> {
        let job_id = match self.session.load() {
            Ok(Some(job_id)) => job_id,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read session, starting fresh");
                return None;
            }
        };

        tracing::info!(job_id = %job_id, "Restoring session");
        self.dispatch(TrackerMsg::SessionRestored {
            job_id: job_id.clone(),
        })
        .await;
        Some(job_id)
    }

    /// Submit `files` as a new job and start tracking it.
    ///
    /// The snapshot switches to `QUEUED` before the creation request goes
    /// out. Tracking of any previous job stops immediately.
    pub async fn start_job(&mut self, files: Vec<UploadFile>) {
        self.dispatch(TrackerMsg::StartRequested).await;

        tracing::info!(files = files.len(), "Submitting generation job");
        let msg = match self.backend.create_job(&files).await {
            Ok(envelope) => {
                tracing::info!(job_id = %envelope.job_id, status = %envelope.status, "Job created");
                TrackerMsg::JobCreated(envelope)
            }
            Err(e) => {
                tracing::error!(error = %e, "Job creation failed");
                TrackerMsg::CreateFailed {
                    message: creation_error_message(&e),
                }
            }
        };
        self.dispatch(msg).await;
    }

    /// Forget the current job, persisted id included.
    pub async fn reset(&mut self) {
        tracing::info!(job_id = ?self.tracker.job_id(), "Resetting session");
        self.dispatch(TrackerMsg::ResetRequested).await;
    }

    /// Wait for the next update from the channel or watchdog and apply it.
    pub async fn process_next(&mut self) {
        // The controller holds a sender, so the queue never closes.
        if let Some(msg) = self.updates_rx.recv().await {
            self.dispatch(msg).await;
        }
    }

    /// Apply every update already queued without waiting.
    pub async fn drain_pending(&mut self) {
        while let Ok(msg) = self.updates_rx.try_recv() {
            self.dispatch(msg).await;
        }
    }

    /// Apply updates until nothing can change the state any more.
    pub async fn run_until_settled(&mut self) {
        while !self.tracker.is_settled() {
            self.process_next().await;
        }
    }

    /// Stop tracking and wait for the tasks to exit.
    pub async fn shutdown(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        tracing::info!(job_id = %active.job_id, "Shutting down job tracking");
        active.cancel.cancel();
        for task in active.tasks {
            let _ = tokio::time::timeout(TASK_SHUTDOWN_TIMEOUT, task).await;
        }
    }

    // ---- private helpers ----

    /// Feed `msg` to the tracker and execute the resulting effects.
    ///
    /// Effects that produce a follow-up message (status checks) are fed
    /// back before returning.
    async fn dispatch(&mut self, msg: TrackerMsg) {
        let mut queue = VecDeque::from([msg]);

        while let Some(msg) = queue.pop_front() {
            if let Some(job_id) = update_job_id(&msg) {
                if self.tracker.job_id() != Some(job_id) {
                    tracing::debug!(job_id, "Discarding update for untracked job");
                    continue;
                }
            }

            let effects = self.tracker.handle(msg);
            self.snapshot_tx.send_replace(self.tracker.clone());

            for effect in effects {
                if let Some(next) = self.execute(effect).await {
                    queue.push_back(next);
                }
            }
        }
    }

    async fn execute(&mut self, effect: Effect) -> Option<TrackerMsg> {
        match effect {
            Effect::PersistJobId(job_id) => {
                if let Err(e) = self.session.save(&job_id) {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to persist job id");
                }
                None
            }
            Effect::ClearSession => {
                if let Err(e) = self.session.clear() {
                    tracing::error!(error = %e, "Failed to clear session");
                }
                None
            }
            Effect::FetchStatus { job_id } => {
                let result = self.backend.job_status(&job_id).await;
                Some(status_msg(&job_id, result))
            }
            Effect::OpenChannel { job_id } => {
                let cancel = self.tracking_token(&job_id);
                let task = tokio::spawn(run_channel(
                    Arc::clone(&self.connector),
                    job_id,
                    self.updates_tx.clone(),
                    cancel,
                ));
                self.push_task(task);
                None
            }
            Effect::StartWatchdog { job_id } => {
                let cancel = self.tracking_token(&job_id);
                let task = tokio::spawn(run_watchdog(
                    Arc::clone(&self.backend),
                    job_id,
                    self.poll_interval,
                    self.updates_tx.clone(),
                    cancel,
                ));
                self.push_task(task);
                None
            }
            Effect::StopTracking => {
                self.stop_tracking();
                None
            }
            Effect::Notify(notice) => {
                match notice.level {
                    NoticeLevel::Error => tracing::error!(message = %notice.message, "Notice"),
                    NoticeLevel::Info => tracing::info!(message = %notice.message, "Notice"),
                }
                // No subscribers is fine.
                let _ = self.notice_tx.send(notice);
                None
            }
        }
    }

    /// Cancellation token for tasks serving `job_id`, replacing tracking
    /// of any other job.
    fn tracking_token(&mut self, job_id: &str) -> CancellationToken {
        if self.active.as_ref().is_some_and(|a| a.job_id != job_id) {
            self.stop_tracking();
        }
        let active = self.active.get_or_insert_with(|| {
            tracing::info!(job_id, "Tracking job");
            ActiveTracking {
                job_id: job_id.to_string(),
                cancel: CancellationToken::new(),
                tasks: Vec::new(),
            }
        });
        active.cancel.clone()
    }

    fn push_task(&mut self, task: JoinHandle<()>) {
        match self.active.as_mut() {
            Some(active) => active.tasks.push(task),
            None => task.abort(),
        }
    }

    fn stop_tracking(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::info!(job_id = %active.job_id, "Stopping job tracking");
            active.cancel.cancel();
        }
    }
}

impl Drop for JobController {
    fn drop(&mut self) {
        self.stop_tracking();
    }
}

/// Job id carried by a channel or watchdog update.
fn update_job_id(msg: &TrackerMsg) -> Option<&str> {
    match msg {
        TrackerMsg::StatusFetched(envelope) | TrackerMsg::FrameReceived(envelope) => {
            Some(&envelope.job_id)
        }
        TrackerMsg::StatusFetchFailed { job_id, .. } => Some(job_id),
        _ => None,
    }
}

/// Message shown for a failed creation request.
fn creation_error_message(error: &PanelApiError) -> String {
    match error {
        PanelApiError::Request(e) => e.to_string(),
        PanelApiError::ServiceUnavailable | PanelApiError::ApiError { .. } => {
            START_FAILED_MESSAGE.to_string()
        }
    }
}
