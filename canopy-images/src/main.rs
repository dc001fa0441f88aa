//! canopy-images - street-tree image acquisition
//!
//! Reads tree records as a JSON array, fetches up to N photographs per unique
//! species identifier from the Encyclopedia of Life, fits them inside a
//! bounding box, and writes the records back with an `images` list.
//!
//! stdout carries data (records, or the outcome log when records go to a
//! file); all logging goes to stderr.

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use canopy_common::config::{resolve_toml_config, NamingPolicy};
use canopy_images::config::{PipelineSettings, SettingsOverrides};
use canopy_images::records::{read_records, write_records};
use canopy_images::services::{ExportFilter, OutcomeLog, OutputLayout};

/// Name used for the config file and log filter
const MODULE_NAME: &str = "canopy-images";

/// Command-line arguments for canopy-images
#[derive(Parser, Debug)]
#[command(name = "canopy-images")]
#[command(about = "Fetch and normalize species photographs for street-tree records")]
#[command(version)]
struct Args {
    /// TOML config file (default: <config dir>/canopy/canopy-images.toml)
    #[arg(short, long, env = "CANOPY_CONFIG")]
    config: Option<PathBuf>,

    /// JSON array of records (default: stdin)
    #[arg(short, long, env = "CANOPY_INPUT")]
    input: Option<PathBuf>,

    /// Enriched records as pretty JSON (default: stdout)
    #[arg(short, long, env = "CANOPY_OUTPUT")]
    output: Option<PathBuf>,

    /// Outcome log CSV (default: stdout when --output is set, else <image dir>/csv/outcomes.csv)
    #[arg(long, env = "CANOPY_OUTCOME_LOG")]
    outcome_log: Option<PathBuf>,

    /// Failures-only outcome log CSV
    #[arg(long, env = "CANOPY_ERROR_LOG")]
    error_log: Option<PathBuf>,

    /// Directory receiving normalized images
    #[arg(long, env = "CANOPY_IMAGE_DIR")]
    image_dir: Option<PathBuf>,

    /// Identifiers fetched simultaneously
    #[arg(short = 'j', long, env = "CANOPY_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Media entries fetched per identifier
    #[arg(long, env = "CANOPY_IMAGES_PER_IDENTIFIER")]
    images_per_identifier: Option<usize>,

    /// Bounding box edge in pixels
    #[arg(long, env = "CANOPY_MAX_DIMENSION")]
    max_dimension: Option<u32>,

    /// File naming policy: identifier | botanical-slug
    #[arg(long, env = "CANOPY_NAMING")]
    naming: Option<NamingPolicy>,

    /// Public base URL images are published under
    #[arg(long, env = "CANOPY_PUBLIC_BASE_URL")]
    public_base_url: Option<String>,

    /// Taxonomy API base URL
    #[arg(long, env = "CANOPY_API_BASE_URL")]
    api_base_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "CANOPY_TIMEOUT")]
    timeout: Option<u64>,
}

impl Args {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            image_dir: self.image_dir.clone(),
            public_base_url: self.public_base_url.clone(),
            api_base_url: self.api_base_url.clone(),
            concurrency: self.concurrency,
            images_per_identifier: self.images_per_identifier,
            max_dimension: self.max_dimension,
            naming: self.naming,
            request_timeout_secs: self.timeout,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (toml_config, config_source) = resolve_toml_config(args.config.as_deref(), MODULE_NAME)
        .context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    info!("Starting {} v{}", MODULE_NAME, env!("CARGO_PKG_VERSION"));
    info!(
        "Build: {} ({}, {})",
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    config_source.log();

    let settings = PipelineSettings::resolve(args.overrides(), &toml_config)
        .context("Invalid configuration")?;
    info!(
        image_dir = %settings.image_dir.display(),
        concurrency = settings.concurrency,
        images_per_identifier = settings.images_per_identifier,
        max_dimension = settings.max_dimension,
        naming = %settings.naming,
        "Settings resolved"
    );

    let records = match &args.input {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
            read_records(BufReader::new(file))
        }
        None => read_records(io::stdin().lock()),
    }
    .context("Failed to read input records")?;

    let cancel_token = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel_token.clone()));

    let runner = canopy_images::build_http_runner(&settings)
        .context("Failed to initialize HTTP transports")?
        .with_cancel_token(cancel_token);

    let report = runner.run(records).await.context("Image acquisition failed")?;

    let written = match &args.output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
            write_records(BufWriter::new(file), &report.records)
        }
        None => write_records(io::stdout().lock(), &report.records),
    };
    written.context("Failed to write records")?;

    let layout = OutputLayout::new(settings.image_dir.clone());
    write_outcome_logs(&args, &layout, &report.outcomes)?;

    info!(
        identifiers = report.identifiers,
        succeeded = report.outcomes.success_count(),
        failed = report.outcomes.failure_count(),
        skipped = report.skipped,
        "Done"
    );
    Ok(())
}

/// Write the outcome log where the arguments direct it
fn write_outcome_logs(args: &Args, layout: &OutputLayout, log: &OutcomeLog) -> Result<()> {
    match (&args.outcome_log, &args.output) {
        (Some(path), _) => write_csv(log, path, ExportFilter::All)?,
        (None, Some(_)) => print!("{}", csv_with_newline(log.to_csv(ExportFilter::All))),
        (None, None) => {
            // stdout already carries the records
            let path = layout.csv_dir().join("outcomes.csv");
            write_csv(log, &path, ExportFilter::All)?;
        }
    }

    if let Some(path) = &args.error_log {
        write_csv(log, path, ExportFilter::FailuresOnly)?;
    }
    Ok(())
}

fn write_csv(log: &OutcomeLog, path: &Path, filter: ExportFilter) -> Result<()> {
    log.write_csv(path, filter)
        .with_context(|| format!("Failed to write outcome log {}", path.display()))?;
    info!("Outcome log written to {}", path.display());
    Ok(())
}

fn csv_with_newline(csv: String) -> String {
    if csv.is_empty() {
        csv
    } else {
        csv + "\n"
    }
}

/// Stop dispatching new identifiers on Ctrl+C; in-flight ones finish
async fn cancel_on_ctrl_c(cancel_token: CancellationToken) {
    match signal::ctrl_c().await {
        Ok(()) => {
            warn!("Received Ctrl+C, finishing in-flight downloads");
            cancel_token.cancel();
        }
        Err(e) => warn!("Failed to install Ctrl+C handler: {}", e),
    }
}
