use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Clone, Debug, PartialEq)]
#[command(author, version, about = "Turn photos into a comic panel")]
pub struct Cli {
    #[arg(
        long = "api-url",
        env = "PANEL_API_URL",
        help = "Backend HTTP base URL (overrides the environment)"
    )]
    pub api_url: Option<String>,

    #[arg(
        long = "session-file",
        env = "PANEL_SESSION_FILE",
        help = "Where the active job id is kept between runs"
    )]
    pub session_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone, Debug, PartialEq)]
pub enum Command {
    /// Upload images and start a new generation.
    Start {
        #[arg(help = "Image files to upload", required_unless_present = "dir")]
        files: Vec<PathBuf>,

        #[arg(short = 'd', long = "dir", help = "Upload every image in this directory")]
        dir: Option<PathBuf>,

        #[arg(long = "detach", help = "Return once the job is created")]
        detach: bool,
    },

    /// Follow the stored job until it finishes.
    Watch,

    /// Show the stored job's current state once.
    Status,

    /// Forget the stored job.
    Reset,

    /// Save the result image of the stored job.
    Download {
        #[arg(short = 'o', long = "out", default_value = ".", help = "Output directory")]
        out: PathBuf,
    },
}
