//! CLI Command Handlers
//!
//! Operator commands for the valuation engine: validate calibration files,
//! rebuild grids, inspect bands and run one-off assessments.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::json_file::JsonCalibrationRepository;
use crate::application::{RebuildScheduler, ValuationEngine};
use crate::config::{load_config, Config};
use crate::domain::{RiskBand, SymbolCalibration};
use crate::ports::CalibrationRepository;
use crate::strategy::EngineConfig;

/// Risk-to-price valuation engine
#[derive(Parser, Debug)]
#[command(
    name = "valuation-engine",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Risk-to-price valuation engine",
    long_about = "Maps market prices to a normalized [0,1] risk value and back using \
                  per-asset calibrations (log bounds, quartic polynomial or 41-point grid), \
                  and classifies the result into zone, bias and composite score."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE", default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Override the calibration file from the config
    #[arg(long, global = true, value_name = "FILE")]
    pub calibrations: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load and validate every calibration in the calibration file
    Validate(ValidateCmd),

    /// Rebuild 41-point grids and write them back
    Rebuild(RebuildCmd),

    /// Show band coefficients and band price ranges for a symbol
    Bands(BandsCmd),

    /// Assess a price for a symbol
    Assess(AssessCmd),

    /// Run the periodic rebuild loop until Ctrl+C
    Run(RunCmd),
}

/// Validate calibration file
#[derive(Parser, Debug)]
pub struct ValidateCmd {
    /// Only validate this symbol
    #[arg(short, long)]
    pub symbol: Option<String>,
}

/// Rebuild grids
#[derive(Parser, Debug)]
pub struct RebuildCmd {
    /// Only rebuild this symbol
    #[arg(short, long)]
    pub symbol: Option<String>,

    /// Rebuild in memory and report, without writing the file
    #[arg(long)]
    pub dry_run: bool,
}

/// Band report
#[derive(Parser, Debug)]
pub struct BandsCmd {
    /// Asset symbol (e.g. ETH)
    #[arg(value_name = "SYMBOL")]
    pub symbol: String,

    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

/// One-off assessment
#[derive(Parser, Debug)]
pub struct AssessCmd {
    /// Asset symbol (e.g. ETH)
    #[arg(value_name = "SYMBOL")]
    pub symbol: String,

    /// Market price
    #[arg(value_name = "PRICE")]
    pub price: f64,
}

/// Periodic rebuild loop
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Override [rebuild] interval_secs
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,
}

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    let config = load_config(&app.config)
        .with_context(|| format!("Failed to load configuration from {}", app.config.display()))?;

    // Initialize logging based on flags, falling back to the config level
    init_logging(app.verbose, app.debug, &config.logging.level)?;

    let calibration_path = app
        .calibrations
        .clone()
        .unwrap_or_else(|| config.storage.get_calibration_path());
    let repository = Arc::new(JsonCalibrationRepository::new(calibration_path));

    match app.command {
        Command::Validate(cmd) => validate_command(cmd, &repository).await,
        Command::Rebuild(cmd) => rebuild_command(cmd, &config, repository).await,
        Command::Bands(cmd) => bands_command(cmd, &config, &repository).await,
        Command::Assess(cmd) => assess_command(cmd, &config, &repository).await,
        Command::Run(cmd) => run_command(cmd, &config, repository).await,
    }
}

/// Initialize logging system
fn init_logging(verbose: bool, debug: bool, config_level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config_level))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Build an engine seeded from the repository
async fn load_engine(
    config: &Config,
    repository: &JsonCalibrationRepository,
) -> Result<Arc<ValuationEngine>> {
    let engine = ValuationEngine::new(EngineConfig::from(config))
        .context("Invalid engine parameters")?;

    let records = repository.load_all().await.with_context(|| {
        format!("Failed to read calibrations from {}", repository.path().display())
    })?;
    let loaded = engine.seed(records);
    tracing::info!("Loaded {} calibrations from {}", loaded, repository.path().display());

    Ok(Arc::new(engine))
}

/// Handle validate command
async fn validate_command(cmd: ValidateCmd, repository: &JsonCalibrationRepository) -> Result<()> {
    let records = repository.load_all().await.with_context(|| {
        format!("Failed to read calibrations from {}", repository.path().display())
    })?;

    let mut checked = 0;
    let mut invalid = 0;
    for record in records {
        if cmd.symbol.as_deref().is_some_and(|s| s != record.symbol) {
            continue;
        }
        checked += 1;

        let symbol = record.symbol.clone();
        match SymbolCalibration::try_from(record) {
            Ok(calibration) => println!(
                "✓ {:<8} {:<11} v{:<4} {} days of history",
                symbol,
                calibration.method(),
                calibration.version(),
                calibration.band_histogram().total_days()
            ),
            Err(e) => {
                invalid += 1;
                println!("✗ {:<8} {}", symbol, e);
            }
        }
    }

    if let Some(symbol) = cmd.symbol.filter(|_| checked == 0) {
        bail!("No calibration for symbol '{}'", symbol);
    }
    if invalid > 0 {
        bail!("{} of {} calibrations invalid", invalid, checked);
    }

    println!("\n{} calibrations valid", checked);
    Ok(())
}

/// Handle rebuild command
async fn rebuild_command(
    cmd: RebuildCmd,
    config: &Config,
    repository: Arc<JsonCalibrationRepository>,
) -> Result<()> {
    let engine = load_engine(config, &repository).await?;
    let scheduler = RebuildScheduler::new(Arc::clone(&engine), repository).with_dry_run(cmd.dry_run);

    let summary = match cmd.symbol {
        Some(symbol) => {
            engine.store().get(&symbol)?;
            scheduler.rebuild_symbols(&[symbol]).await
        }
        None => scheduler.tick().await,
    };

    if cmd.dry_run {
        println!("Dry run - nothing written");
    }
    println!(
        "Rebuilt {} symbols: {} published, {} unchanged, {} rejected, {} skipped",
        summary.total(),
        summary.published,
        summary.unchanged,
        summary.rejected,
        summary.skipped
    );

    if summary.rejected > 0 {
        bail!("{} rebuilds rejected; see log for details", summary.rejected);
    }
    Ok(())
}

#[derive(Serialize)]
struct BandRow {
    band: RiskBand,
    days: u64,
    coefficient: f64,
    low_price: f64,
    high_price: f64,
}

#[derive(Serialize)]
struct BandReport {
    symbol: String,
    version: u64,
    method: String,
    bands: Vec<BandRow>,
}

/// Handle bands command
async fn bands_command(
    cmd: BandsCmd,
    config: &Config,
    repository: &JsonCalibrationRepository,
) -> Result<()> {
    let engine = load_engine(config, repository).await?;
    let snapshot = engine.store().get(&cmd.symbol)?;
    let coefficients = engine.band_coefficients(&cmd.symbol)?;
    let ranges = engine.band_price_ranges(&cmd.symbol)?;

    let report = BandReport {
        symbol: cmd.symbol.clone(),
        version: snapshot.version(),
        method: snapshot.method().to_string(),
        bands: ranges
            .iter()
            .map(|range| BandRow {
                band: range.band,
                days: snapshot.band_histogram().days(range.band),
                coefficient: coefficients.get(range.band),
                low_price: range.low_price,
                high_price: range.high_price,
            })
            .collect(),
    };

    match cmd.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => {
            println!("{} ({}, v{})", report.symbol, report.method, report.version);
            println!("  {:<9} {:>6} {:>7} {:>14} {:>14}", "band", "days", "coef", "low", "high");
            for row in &report.bands {
                println!(
                    "  {:<9} {:>6} {:>7.3} {:>14.4} {:>14.4}",
                    row.band.label(),
                    row.days,
                    row.coefficient,
                    row.low_price,
                    row.high_price
                );
            }
        }
    }

    Ok(())
}

/// Handle assess command
async fn assess_command(
    cmd: AssessCmd,
    config: &Config,
    repository: &JsonCalibrationRepository,
) -> Result<()> {
    let engine = load_engine(config, repository).await?;
    let assessment = engine.get_assessment(&cmd.symbol, cmd.price)?;
    println!("{}", serde_json::to_string_pretty(&assessment)?);
    Ok(())
}

/// Handle run command
async fn run_command(
    cmd: RunCmd,
    config: &Config,
    repository: Arc<JsonCalibrationRepository>,
) -> Result<()> {
    let engine = load_engine(config, &repository).await?;
    let interval = Duration::from_secs(cmd.interval.unwrap_or(config.rebuild.interval_secs).max(1));

    let scheduler = Arc::new(RebuildScheduler::new(engine, repository).with_interval(interval));
    if !config.rebuild.on_startup {
        // First pass waits one interval
        tokio::time::sleep(interval).await;
    }

    // Setup Ctrl+C handler
    let handle = Arc::clone(&scheduler);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
        handle.stop().await;
    });

    scheduler.run().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        CliApp::command().debug_assert();
    }

    #[test]
    fn test_parse_rebuild() {
        let app = CliApp::parse_from([
            "valuation-engine",
            "rebuild",
            "--symbol",
            "ETH",
            "--dry-run",
            "--config",
            "custom.toml",
        ]);
        assert_eq!(app.config, PathBuf::from("custom.toml"));
        match app.command {
            Command::Rebuild(cmd) => {
                assert_eq!(cmd.symbol.as_deref(), Some("ETH"));
                assert!(cmd.dry_run);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_assess() {
        let app = CliApp::parse_from(["valuation-engine", "--debug", "assess", "ETH", "1994.5"]);
        assert!(app.debug);
        match app.command {
            Command::Assess(cmd) => {
                assert_eq!(cmd.symbol, "ETH");
                assert_eq!(cmd.price, 1994.5);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_bands_defaults() {
        let app = CliApp::parse_from(["valuation-engine", "bands", "SOL"]);
        assert_eq!(app.config, PathBuf::from("config/default.toml"));
        assert!(app.calibrations.is_none());
        match app.command {
            Command::Bands(cmd) => assert_eq!(cmd.format, "text"),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
