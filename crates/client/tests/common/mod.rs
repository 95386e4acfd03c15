#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc as frames;
use futures::StreamExt;
use tokio::sync::Notify;

use panel_client::api::{JobBackend, PanelApiError};
use panel_client::channel::{ChannelConnector, ChannelError, FrameStream};
use panel_client::session::MemorySessionStore;
use panel_client::JobController;
use panel_core::job::{JobResponse, JobStatus};
use panel_core::tracker::JobTracker;
use panel_core::upload::UploadFile;

/// Long enough that the watchdog only fires its immediate first check.
pub const QUIET_POLL_INTERVAL: Duration = Duration::from_secs(3600);

/// How long a test waits for an asynchronous update before failing.
pub const UPDATE_TIMEOUT: Duration = Duration::from_secs(2);

/// A backend request recorded by [`FakeBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create { files: usize },
    Status(String),
}

/// Backend answering from scripted result queues.
///
/// Status checks with nothing scripted fail with a transient 500.
#[derive(Default)]
pub struct FakeBackend {
    creates: Mutex<VecDeque<Result<JobResponse, PanelApiError>>>,
    statuses: Mutex<VecDeque<Result<JobResponse, PanelApiError>>>,
    calls: Mutex<Vec<Call>>,
    create_gate: Option<Arc<Notify>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold creation requests until the returned gate is notified.
    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.create_gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub fn on_create(self, result: Result<JobResponse, PanelApiError>) -> Self {
        self.creates.lock().unwrap().push_back(result);
        self
    }

    pub fn on_status(self, result: Result<JobResponse, PanelApiError>) -> Self {
        self.statuses.lock().unwrap().push_back(result);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobBackend for FakeBackend {
    async fn create_job(&self, files: &[UploadFile]) -> Result<JobResponse, PanelApiError> {
        self.calls.lock().unwrap().push(Call::Create { files: files.len() });
        if let Some(gate) = &self.create_gate {
            gate.notified().await;
        }
        let next = self.creates.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            Err(PanelApiError::ApiError {
                status: 500,
                body: "no scripted creation".into(),
            })
        })
    }

    async fn job_status(&self, job_id: &str) -> Result<JobResponse, PanelApiError> {
        self.calls.lock().unwrap().push(Call::Status(job_id.to_string()));
        let next = self.statuses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            Err(PanelApiError::ApiError {
                status: 500,
                body: "no scripted status".into(),
            })
        })
    }
}

/// Connector handing out in-memory frame streams per job id.
#[derive(Default)]
pub struct FakeConnector {
    pending: Mutex<HashMap<String, frames::UnboundedReceiver<String>>>,
    connected: Mutex<Vec<String>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepare the channel for `job_id`; frames sent on the returned
    /// sender are delivered once the controller connects.
    pub fn channel(&self, job_id: &str) -> frames::UnboundedSender<String> {
        let (tx, rx) = frames::unbounded();
        self.pending.lock().unwrap().insert(job_id.to_string(), rx);
        tx
    }

    /// Job ids a channel was opened for, in order.
    pub fn connected(&self) -> Vec<String> {
        self.connected.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelConnector for FakeConnector {
    async fn connect(&self, job_id: &str) -> Result<FrameStream, ChannelError> {
        self.connected.lock().unwrap().push(job_id.to_string());
        let rx = self.pending.lock().unwrap().remove(job_id);
        match rx {
            Some(rx) => Ok(rx.map(Ok).boxed()),
            None => Err(ChannelError::Connection(format!("no channel for {job_id}"))),
        }
    }
}

pub struct Harness {
    pub controller: JobController,
    pub backend: Arc<FakeBackend>,
    pub connector: Arc<FakeConnector>,
    pub session: Arc<MemorySessionStore>,
}

pub fn harness(backend: FakeBackend, session: MemorySessionStore) -> Harness {
    let backend = Arc::new(backend);
    let connector = Arc::new(FakeConnector::new());
    let session = Arc::new(session);
    let controller = JobController::new(backend.clone(), connector.clone(), session.clone())
        .with_poll_interval(QUIET_POLL_INTERVAL);
    Harness {
        controller,
        backend,
        connector,
        session,
    }
}

pub fn envelope(job_id: &str, status: JobStatus) -> JobResponse {
    JobResponse::with_status(job_id, status)
}

/// Serialize an envelope the way the backend pushes it.
pub fn frame(envelope: &JobResponse) -> String {
    serde_json::to_string(envelope).unwrap()
}

pub fn image(name: &str) -> UploadFile {
    UploadFile::new(name, "image/png", vec![0x89, b'P', b'N', b'G'])
}

/// Apply queued updates until `done` holds for the controller state.
pub async fn process_until(
    controller: &mut JobController,
    done: impl Fn(&JobTracker) -> bool,
) {
    tokio::time::timeout(UPDATE_TIMEOUT, async {
        while !done(controller.state()) {
            controller.process_next().await;
        }
    })
    .await
    .expect("controller never reached the expected state");
}

/// Wait until the connector has opened a channel for `job_id`.
pub async fn wait_for_channel(connector: &FakeConnector, job_id: &str) {
    tokio::time::timeout(UPDATE_TIMEOUT, async {
        while !connector.connected().iter().any(|id| id == job_id) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("channel was never opened");
}
