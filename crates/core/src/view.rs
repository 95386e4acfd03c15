//! Presentation layer: which screen to show for a given job state.
//!
//! Everything here is derived; nothing is stored. [`render`] picks one of
//! four views in a fixed priority order and [`progress_steps`] expands a
//! status into the timeline shown while a job runs.

use crate::job::JobStatus;

/// Message shown on the error view when the backend gave no detail.
pub const DEFAULT_ERROR_MESSAGE: &str = "Ocurrió un error inesperado al procesar tu solicitud.";

/// Ordered timeline of the non-terminal states with their labels.
pub const PROGRESS_STEPS: [(JobStatus, &str); 5] = [
    (JobStatus::Queued, "En cola de espera..."),
    (JobStatus::ProcessingImages, "Procesando imágenes..."),
    (JobStatus::GeneratingStory, "Generando historia..."),
    (JobStatus::GeneratingImage, "Generando panel final..."),
    (JobStatus::Uploading, "Finalizando..."),
];

/// Visual state of one timeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Upcoming,
    Current,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepView {
    pub status: JobStatus,
    pub label: &'static str,
    pub state: StepState,
}

/// The screen to display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    /// No job: pick images and start.
    Upload,
    /// A job is running.
    Progress { steps: Vec<StepView> },
    /// The job completed and produced an image.
    Result { result_url: String },
    /// The job (or its creation) failed.
    Error { message: String },
}

/// Choose the view for `{status, result_url, error}`.
///
/// Priority: completed-with-result, then error-or-failed, then any other
/// status (progress), then the upload form.
pub fn render(status: Option<JobStatus>, result_url: Option<&str>, error: Option<&str>) -> View {
    if let (Some(JobStatus::Completed), Some(url)) = (status, result_url) {
        return View::Result {
            result_url: url.to_string(),
        };
    }

    if status == Some(JobStatus::Failed) || error.is_some() {
        return View::Error {
            message: error.unwrap_or(DEFAULT_ERROR_MESSAGE).to_string(),
        };
    }

    match status {
        Some(status) => View::Progress {
            steps: progress_steps(status),
        },
        None => View::Upload,
    }
}

/// Expand `status` into per-step states along [`PROGRESS_STEPS`].
///
/// `COMPLETED` marks every step completed. A status not in the list (e.g.
/// `FAILED` reaching here transiently) leaves every step upcoming.
pub fn progress_steps(status: JobStatus) -> Vec<StepView> {
    let current = PROGRESS_STEPS.iter().position(|(s, _)| *s == status);
    let all_done = status == JobStatus::Completed;

    PROGRESS_STEPS
        .iter()
        .enumerate()
        .map(|(index, (step_status, label))| {
            let state = match current {
                _ if all_done => StepState::Completed,
                Some(cur) if index < cur => StepState::Completed,
                Some(cur) if index == cur => StepState::Current,
                _ => StepState::Upcoming,
            };
            StepView {
                status: *step_status,
                label: *label,
                state,
            }
        })
        .collect()
}
