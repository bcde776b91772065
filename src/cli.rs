//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// fact-reporter - periodic fact gathering and reporting agent
///
/// Runs the configured gatherer programs, evaluates the payload template
/// against the facts they print and POSTs the resulting JSON to every
/// configured target, over and over on a fixed interval.
///
/// Examples:
///   fact-reporter --config /etc/fact-reporter.toml
///   fact-reporter --try --config ./fact-reporter.toml
///   fact-reporter --interval 60 --timeout 5
///   fact-reporter --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for fact-reporter.toml in the current
    /// directory, then next to the executable.
    #[arg(short, long, value_name = "FILE", env = "FACT_REPORTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging and print every payload before sending
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Do a single report cycle and exit
    ///
    /// Implies printing the payload before it is sent.
    #[arg(short = 't', long = "try")]
    pub try_once: bool,

    /// Seconds between the end of one cycle and the start of the next
    ///
    /// Overrides the config file setting.
    #[arg(short, long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Per-request delivery timeout in seconds
    ///
    /// Overrides the config file setting.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Generate a default fact-reporter.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.interval == Some(0) {
            return Err("Interval must be at least 1 second".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if let Some(ref config_path) = self.config {
            if !config_path.is_file() {
                return Err(format!(
                    "Config file does not exist: {}",
                    config_path.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
