use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

use canvas_watch::aggregate::Aggregator;
use canvas_watch::canvas::CanvasClient;
use canvas_watch::{config, report};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(author, version, about = "Upcoming and missing Canvas assignments for an observed student")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: Format,
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
    let cfg = config::load(Some(&args.config))
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    let client = CanvasClient::from_config(&cfg).context("failed to build Canvas client")?;
    let aggregator = Aggregator::from_config(client, &cfg);

    info!(courses = cfg.courses.ids.len(), "fetching assignments");
    let dashboard = aggregator
        .dashboard(&cfg.courses.ids, chrono::Utc::now())
        .await;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match args.format {
        Format::Text => report::write_text(&mut out, &dashboard)?,
        Format::Json => report::write_json(&mut out, &dashboard)?,
    }
    out.flush()?;
    Ok(())
}
