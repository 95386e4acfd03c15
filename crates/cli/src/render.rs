//! Plain-text rendering of the job views.

use panel_core::tracker::Notice;
use panel_core::view::{StepState, View};

/// Shown when no job is active.
pub const IDLE_MESSAGE: &str = "No hay ninguna generación activa.";

/// Render `view` as terminal lines.
pub fn render_view(view: &View) -> String {
    match view {
        View::Upload => IDLE_MESSAGE.to_string(),
        View::Progress { steps } => steps
            .iter()
            .map(|step| {
                let marker = match step.state {
                    StepState::Completed => "[x]",
                    StepState::Current => "[>]",
                    StepState::Upcoming => "[ ]",
                };
                format!("{marker} {}", step.label)
            })
            .collect::<Vec<_>>()
            .join("\n"),
        View::Result { result_url } => format!("¡Listo! {result_url}"),
        View::Error { message } => format!("Error: {message}"),
    }
}

pub fn render_notice(notice: &Notice) -> String {
    format!("! {}", notice.message)
}
