//! HRRR partial-retrieval downloader.
//!
//! Builds compact, region-clipped HRRR files with:
//! - Discovery of the latest published run (bounded day lookback)
//! - Index-driven byte-range retrieval of selected variables
//! - Stitching of the 18-hour and 48-hour cycles in valid-time order
//! - Upload of the outputs and a manifest to a publish bucket

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use downloader::{handle_event, AppConfig, Pipeline, RunOutcome};
use hrrr_common::Region;

#[derive(Parser, Debug)]
#[command(name = "downloader")]
#[command(about = "HRRR partial retrieval with per-region assembly")]
struct Args {
    /// YAML configuration file (defaults to the public NOAA bucket and built-in regions)
    #[arg(long, env = "HRRR_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for scratch slices and assembled output
    #[arg(long, env = "HRRR_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Region override, repeatable: "name:nw_lat,nw_lon,se_lat,se_lon"
    #[arg(long = "region")]
    regions: Vec<String>,

    /// Assemble one unclipped CONUS file instead of per-region files
    #[arg(long)]
    no_clip: bool,

    /// Leave outputs in the work directory instead of uploading
    #[arg(long)]
    no_publish: bool,

    /// Repeat every N minutes until Ctrl+C (default: run once)
    #[arg(long)]
    interval_minutes: Option<u64>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Port for a Prometheus metrics listener
    #[arg(long, env = "METRICS_PORT")]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting HRRR downloader");

    if let Some(port) = args.metrics_port {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(addr = %addr, "Metrics listener started");
    }

    let config = build_config(&args)?;
    let pipeline = Pipeline::from_config(config).context("Failed to build pipeline")?;

    match args.interval_minutes {
        None => {
            let outcome = handle_event(&pipeline, serde_json::json!({})).await?;
            log_outcome(&outcome);
        }
        Some(minutes) => {
            let interval = Duration::from_secs(minutes.max(1) * 60);
            info!(interval_minutes = minutes, "Starting continuous polling");

            loop {
                match handle_event(&pipeline, serde_json::json!({ "trigger": "interval" })).await {
                    Ok(outcome) => log_outcome(&outcome),
                    Err(e) => error!(error = %e, "Scheduled run failed"),
                }

                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("Received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        // Continue polling
                    }
                }
            }
        }
    }

    Ok(())
}

/// Load the YAML config and apply command-line overrides.
fn build_config(args: &Args) -> Result<AppConfig> {
    let mut config = AppConfig::load_or_default(args.config.as_deref())?;

    if let Some(work_dir) = &args.work_dir {
        config.assembly.work_dir = work_dir.clone();
    }
    if !args.regions.is_empty() {
        config.regions = args
            .regions
            .iter()
            .map(|s| Region::from_arg(s))
            .collect::<Result<Vec<_>, _>>()
            .context("Invalid --region")?;
    }
    if args.no_clip {
        config.clip.enabled = false;
    }
    if args.no_publish {
        config.publish.enabled = false;
    }

    config.validate()?;
    Ok(config)
}

fn log_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::NoData { attempts } => {
            info!(attempts = attempts, "No HRRR data available yet");
        }
        RunOutcome::Completed {
            run,
            report,
            manifest,
        } => {
            for gap in &report.gaps {
                info!(
                    key = %gap.key,
                    forecast_hour = gap.forecast_hour,
                    region = ?gap.region,
                    reason = ?gap.reason,
                    "Gap in output"
                );
            }
            info!(
                day = %run.day,
                long_run_hour = run.long.run_hour,
                short_run_hour = ?run.short.map(|c| c.run_hour),
                outputs = report.outputs.len(),
                published = manifest.as_ref().map_or(0, |m| m.files.len()),
                "Download session complete"
            );
        }
    }
}
