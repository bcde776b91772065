//! fact-reporter - periodic fact gathering and reporting agent
//!
//! Runs a configured set of gatherer programs, evaluates a JSON payload
//! template against the facts they print and POSTs the result to one or
//! more HTTP endpoints on a fixed interval.
//!
//! Exit codes:
//!   0 - Success (single cycle finished, or clean shutdown)
//!   1 - Argument or configuration error

mod cli;
mod config;
mod cycle;
mod deliver;
mod expr;
mod gather;
mod models;
mod template;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use cli::Args;
use config::{Config, CONFIG_FILE_NAME};
use cycle::{CycleReport, Reporter};
use models::GatherError;
use std::path::PathBuf;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("fact-reporter v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    // Configuration errors are fatal before any cycle runs
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            eprintln!("\n❌ Configuration error: {:#}", e);
            std::process::exit(1);
        }
    };

    let mut reporter = Reporter::new(config)?;

    if args.try_once {
        let report = reporter.run_cycle().await;
        print_summary(&report);
        return Ok(());
    }

    reporter.run(shutdown_signal()).await;
    Ok(())
}

/// Handle --init-config: generate a default fact-reporter.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    std::fs::write(path, Config::default_toml())
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to configure targets, gatherers and the payload template.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Locate, load and validate the configuration, then apply CLI overrides.
fn load_config(args: &Args) -> Result<Config> {
    let path = match args.config {
        Some(ref config_path) => config_path.clone(),
        None => {
            let exe_dir = executable_dir();
            Config::discover(exe_dir.as_deref())?
        }
    };

    info!("Loading config from: {}", path.display());
    let mut config = Config::load(&path)?;
    config.merge_with_args(args);

    if config.delivery.targets.is_empty() {
        info!("No delivery targets configured; payloads will only be built");
    }

    Ok(config)
}

/// Directory holding the running executable, if it can be determined.
fn executable_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.to_path_buf()))
}

/// Resolves when the process receives Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Print the outcome of a --try run.
fn print_summary(report: &CycleReport) {
    println!("\n📊 Cycle Summary:");
    println!(
        "   Started: {}",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "   Gatherers: {} ok | {} failed",
        report.gatherers.len() - report.gatherers_failed(),
        report.gatherers_failed()
    );
    for gatherer in report.gatherers.iter().filter(|g| !g.is_success()) {
        if let Some(ref e) = gatherer.error {
            println!("   - ⚠️  {}: {}", gatherer.gatherer.display(), e);
            if let GatherError::Exit { stderr, .. } = e {
                if !stderr.is_empty() {
                    println!("        {}", stderr);
                }
            }
        }
    }
    println!("   Facts: {}", report.fact_count);
    println!(
        "   Unresolved expressions: {}",
        report.substitution_failures.len()
    );
    for failure in &report.substitution_failures {
        println!(
            "   - ⚠️  ${{{}}} at {}: {}",
            failure.expression, failure.path, failure.error
        );
    }
    if report.payload.is_none() {
        println!("   Payload: not built");
    }
    println!(
        "   Deliveries: {} ok | {} failed",
        report.deliveries.len() - report.deliveries_failed(),
        report.deliveries_failed()
    );
    for delivery in &report.deliveries {
        match &delivery.result {
            Ok(status) => println!("   - ✅ {} [{}]", delivery.target, status),
            Err(e) => println!("   - ❌ {}", e),
        }
    }
    println!("   Duration: {:.1}s", report.duration.as_secs_f64());
}
