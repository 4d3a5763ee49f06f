//! sqllab - replays SQL Lab sessions headless.

use std::sync::Arc;

use anyhow::Context;
use sqllab::backend::{RecordingBackend, RecordingStore};
use sqllab::cli::{Cli, Command, OutputFormat};
use sqllab::config::Config;
use sqllab::logging::{get_log_path, init_file_logging, init_stderr_logging};
use sqllab::replay::{load_script, render_json, render_text, run_script};
use sqllab::session::{spawn, Session};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    init_logging(cli.log_file);

    if let Err(e) = run(cli).await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn init_logging(to_file: bool) {
    if !to_file {
        init_stderr_logging();
        return;
    }
    let log_path = get_log_path();
    if let Err(e) = init_file_logging(&log_path) {
        init_stderr_logging();
        warn!("Could not open log file {}: {e}", log_path.display());
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;

    match cli.command {
        Command::Replay {
            script,
            cache,
            output,
        } => {
            config.results.cache |= cache;
            let steps = load_script(&script)
                .with_context(|| format!("Loading script {}", script.display()))?;

            let session = Session::new(
                &config,
                Arc::new(RecordingBackend::new()),
                Arc::new(RecordingStore::new()),
            )?;
            let (handle, task) = spawn(session);
            let reports = run_script(&handle, steps).await.context("Replay failed")?;
            handle.shutdown().await?;
            task.await.context("Session task panicked")?;

            let rendered = match output {
                OutputFormat::Text => render_text(&reports),
                OutputFormat::Json => render_json(&reports)?,
            };
            print!("{rendered}");
            if output == OutputFormat::Json {
                println!();
            }
        }
    }

    Ok(())
}
