//! satip-detect - Main entry point
//!
//! Runs one SAT>IP discovery pass over all local interfaces and prints the
//! servers found as JSON. Diagnostics go to stderr so stdout stays parseable.

mod config;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use satip_discovery::DiscoveryScanner;
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "satip-detect")]
#[command(about = "Detect SAT>IP servers on the local network")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "satip-detect.toml")]
    config: PathBuf,

    /// Only search on this interface (repeatable)
    #[arg(short, long = "interface", value_name = "NAME")]
    interfaces: Vec<String>,

    /// Idle receive timeout per interface in milliseconds
    #[arg(long, value_name = "MS")]
    receive_timeout_ms: Option<u64>,

    /// Descriptor fetch timeout in milliseconds
    #[arg(long, value_name = "MS")]
    fetch_timeout_ms: Option<u64>,

    /// Abort on the first device whose descriptor cannot be fetched or parsed
    #[arg(long)]
    strict: bool,

    /// Write JSON to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,
}

impl Args {
    /// Apply command line overrides on top of the loaded configuration
    fn apply(&self, config: &mut config::Config) {
        let discovery = &mut config.discovery;
        if !self.interfaces.is_empty() {
            discovery.interfaces = self.interfaces.clone();
        }
        if let Some(ms) = self.receive_timeout_ms {
            discovery.receive_timeout_ms = ms;
        }
        if let Some(ms) = self.fetch_timeout_ms {
            discovery.fetch_timeout_ms = ms;
        }
        if self.strict {
            discovery.strict = true;
        }
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(&args.log_level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    debug!("satip-detect v{}", env!("CARGO_PKG_VERSION"));

    let mut config = config::load_config(&args.config)?;
    args.apply(&mut config);

    let scanner = DiscoveryScanner::new(config.to_scanner_config())
        .context("Failed to create descriptor fetcher")?;
    let devices = scanner.scan_once().await.context("Discovery failed")?;

    output::write_devices(&devices, args.output.as_deref())?;

    Ok(())
}
