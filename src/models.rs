//! Data models shared across a report cycle.
//!
//! Facts come out of gatherers, get merged into a single table and are
//! then consumed by the template expander.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Flat fact table: fact name to fact value.
pub type Facts = HashMap<String, String>;

/// Why a single gatherer produced no facts.
#[derive(Debug, Error)]
pub enum GatherError {
    /// The process could not be started at all.
    #[error("failed to launch: {0}")]
    Launch(#[source] std::io::Error),

    /// The process ran but exited unsuccessfully.
    #[error("exited with {}", describe_exit(.code))]
    Exit {
        /// Exit code, `None` when terminated by a signal.
        code: Option<i32>,
        /// Captured standard error, for diagnostics only.
        stderr: String,
    },

    /// The process exceeded the configured bounded wait and was killed.
    #[error("timed out after {limit:?}")]
    TimedOut { limit: Duration },

    /// The worker never reported back (it panicked).
    #[error("worker did not report a result")]
    Lost,
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("non-zero code {}", code),
        None => "termination by signal".to_string(),
    }
}

/// Outcome of one gatherer within one cycle.
///
/// Addressed by `index`, the gatherer's position in the configuration,
/// regardless of when the process actually finished.
#[derive(Debug)]
pub struct GatherResult {
    /// Declaration index of the gatherer.
    pub index: usize,
    /// Path of the gatherer executable.
    pub gatherer: PathBuf,
    /// Facts emitted on stdout; empty when `error` is set.
    pub facts: Facts,
    /// Failure, if any.
    pub error: Option<GatherError>,
}

impl GatherResult {
    /// A successful result carrying parsed facts.
    pub fn success(index: usize, gatherer: PathBuf, facts: Facts) -> Self {
        Self {
            index,
            gatherer,
            facts,
            error: None,
        }
    }

    /// A failed result: facts are always empty.
    pub fn failed(index: usize, gatherer: PathBuf, error: GatherError) -> Self {
        Self {
            index,
            gatherer,
            facts: Facts::new(),
            error: Some(error),
        }
    }

    /// Whether the gatherer completed successfully.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
