//! Subcommand implementations.
//!
//! Output goes to the given writer so the commands can be exercised
//! without a terminal; logs go through `tracing` to stderr.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use tokio::sync::broadcast;

use panel_client::api::PanelApi;
use panel_client::config::ClientConfig;
use panel_client::download::{fetch_result, save_result};
use panel_client::session::{FileSessionStore, SessionStore};
use panel_client::JobController;
use panel_core::job::JobStatus;
use panel_core::tracker::Notice;
use panel_core::view::View;

use crate::args::Cli;
use crate::files;
use crate::render::{render_notice, render_view, IDLE_MESSAGE};

/// Printed when the user interrupts `watch`; the job keeps running remotely.
pub const DETACHED_MESSAGE: &str = "Seguimiento interrumpido. Usa `panel-one watch` para retomarlo.";

/// Client configuration with command-line overrides applied.
pub fn client_config(cli: &Cli) -> ClientConfig {
    let session_file = cli
        .session_file
        .as_ref()
        .map(|p| p.display().to_string());
    ClientConfig::from_lookup(|key| {
        let flag = match key {
            "PANEL_API_URL" => cli.api_url.clone(),
            "PANEL_SESSION_FILE" => session_file.clone(),
            _ => None,
        };
        flag.or_else(|| std::env::var(key).ok())
    })
}

/// Upload images and, unless `detach` is set, follow the new job.
pub async fn start(
    controller: &mut JobController,
    paths: Vec<PathBuf>,
    dir: Option<PathBuf>,
    detach: bool,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let mut paths = paths;
    if let Some(dir) = dir {
        paths.extend(files::images_in_dir(&dir)?);
    }
    let selection = files::load_selection(&paths).await?;
    writeln!(out, "Subiendo {} imágenes...", selection.len())?;

    let mut notices = controller.notices();
    controller.start_job(selection.into_files()).await;

    if detach {
        let mut printer = ViewPrinter::default();
        printer.show(&controller.view(), out)?;
        print_notices(&mut notices, out)?;
        if let Some(job_id) = controller.state().job_id() {
            writeln!(out, "Trabajo {job_id} creado.")?;
        }
        return Ok(());
    }

    follow(controller, notices, out).await
}

/// Resume the stored job and follow it to the end.
pub async fn watch(controller: &mut JobController, out: &mut impl Write) -> anyhow::Result<()> {
    let notices = controller.notices();
    if controller.restore_session().await.is_none() {
        writeln!(out, "{IDLE_MESSAGE}")?;
        return Ok(());
    }
    follow(controller, notices, out).await
}

/// Print the stored job's state once.
pub async fn status(controller: &mut JobController, out: &mut impl Write) -> anyhow::Result<()> {
    let mut notices = controller.notices();
    controller.restore_session().await;
    writeln!(out, "{}", render_view(&controller.view()))?;
    print_notices(&mut notices, out)?;
    Ok(())
}

pub async fn reset(controller: &mut JobController, out: &mut impl Write) -> anyhow::Result<()> {
    controller.reset().await;
    writeln!(out, "{IDLE_MESSAGE}")?;
    Ok(())
}

/// Save the stored job's result image into `out_dir`.
pub async fn download(config: &ClientConfig, out_dir: &Path) -> anyhow::Result<PathBuf> {
    let session = FileSessionStore::new(config.session_file.clone());
    let job_id = session
        .load()?
        .ok_or_else(|| anyhow!("{IDLE_MESSAGE}"))?;

    let api = PanelApi::new(config.api_url.clone());
    let job = api
        .get_job(&job_id)
        .await
        .with_context(|| format!("Failed to fetch job {job_id}"))?;

    let result_url = match (job.status, job.result_url) {
        (JobStatus::Completed, Some(url)) => url,
        (status, _) => bail!("Job {job_id} is {status}; there is no result to download"),
    };

    let result = fetch_result(&api, config.proxy_url.as_deref(), &result_url).await?;
    Ok(save_result(&result, out_dir).await?)
}

/// Apply updates and reprint the view until the job settles or the user
/// interrupts.
pub async fn follow(
    controller: &mut JobController,
    mut notices: broadcast::Receiver<Notice>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let mut printer = ViewPrinter::default();

    loop {
        printer.show(&controller.view(), out)?;
        print_notices(&mut notices, out)?;

        if controller.state().is_settled() {
            return Ok(());
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                writeln!(out, "{DETACHED_MESSAGE}")?;
                return Ok(());
            }
            _ = controller.process_next() => {}
        }
    }
}

/// Prints a view only when it differs from the last one printed.
#[derive(Default)]
struct ViewPrinter {
    last: Option<View>,
}

impl ViewPrinter {
    fn show(&mut self, view: &View, out: &mut impl Write) -> std::io::Result<()> {
        if self.last.as_ref() == Some(view) {
            return Ok(());
        }
        writeln!(out, "{}\n", render_view(view))?;
        self.last = Some(view.clone());
        Ok(())
    }
}

fn print_notices(
    notices: &mut broadcast::Receiver<Notice>,
    out: &mut impl Write,
) -> std::io::Result<()> {
    while let Ok(notice) = notices.try_recv() {
        writeln!(out, "{}", render_notice(&notice))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use panel_core::job::JobStatus;
    use panel_core::view::progress_steps;

    #[test]
    fn cli_flags_override_config() {
        let cli = Cli::try_parse_from([
            "panel-one",
            "--api-url",
            "https://panel.example.com",
            "--session-file",
            "/tmp/panel-one.json",
            "status",
        ])
        .unwrap();

        let config = client_config(&cli);

        assert_eq!(config.api_url, "https://panel.example.com");
        assert_eq!(config.session_file, PathBuf::from("/tmp/panel-one.json"));
        assert!(config.secure());
    }

    #[test]
    fn printer_skips_repeated_views() {
        let mut printer = ViewPrinter::default();
        let mut out = Vec::new();
        let view = View::Progress {
            steps: progress_steps(JobStatus::Queued),
        };

        printer.show(&view, &mut out).unwrap();
        printer.show(&view, &mut out).unwrap();

        let printed = String::from_utf8(out).unwrap();
        assert_eq!(printed.matches("[>] En cola de espera...").count(), 1);
    }
}
