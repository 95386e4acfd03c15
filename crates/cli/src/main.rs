//! `panel-one` -- command-line client for the Panel One comic generator.
//!
//! # Environment variables
//!
//! | Variable                   | Default                   | Description                        |
//! |----------------------------|---------------------------|------------------------------------|
//! | `PANEL_API_URL`            | `http://localhost:8080`   | Backend HTTP base URL              |
//! | `PANEL_WS_URL`             | derived from the API URL  | Realtime channel base URL          |
//! | `PANEL_PROXY_URL`          | --                        | Image download proxy base URL      |
//! | `PANEL_POLL_INTERVAL_SECS` | `5`                       | Seconds between status checks      |
//! | `PANEL_SESSION_FILE`       | `.panel_one_session.json` | Where the active job id is kept    |

use std::io::Write;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use panel_cli::args::{Cli, Command};
use panel_cli::commands;
use panel_client::JobController;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "panel_cli=info,panel_client=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = commands::client_config(&cli);
    tracing::debug!(api_url = %config.api_url, ws_url = %config.ws_url, "Loaded client configuration");

    let mut stdout = std::io::stdout();

    if let Command::Download { out } = &cli.command {
        let path = commands::download(&config, out).await?;
        writeln!(stdout, "{}", path.display())?;
        return Ok(());
    }

    let mut controller = JobController::from_config(&config);
    match cli.command {
        Command::Start { files, dir, detach } => {
            commands::start(&mut controller, files, dir, detach, &mut stdout).await?
        }
        Command::Watch => commands::watch(&mut controller, &mut stdout).await?,
        Command::Status => commands::status(&mut controller, &mut stdout).await?,
        Command::Reset => commands::reset(&mut controller, &mut stdout).await?,
        Command::Download { .. } => {}
    }
    controller.shutdown().await;

    Ok(())
}
