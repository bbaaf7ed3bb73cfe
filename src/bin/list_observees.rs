use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use canvas_watch::canvas::CanvasClient;
use canvas_watch::config;

/// Print the students the observer token can see, to find `canvas.student_id`.
#[derive(Parser, Debug)]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::read(Some(&args.config))
        .with_context(|| format!("failed to read {}", args.config.display()))?;
    config::validate_access(&cfg)?;

    let client = CanvasClient::from_config(&cfg)?;
    let observees = client
        .list_observees()
        .await
        .context("failed to list observees")?;
    if observees.is_empty() {
        println!("No observed students for this token.");
    }
    for observee in observees {
        println!("Name: {}, ID: {}", observee.name, observee.id);
    }
    Ok(())
}
