//! Concurrent gatherer execution.
//!
//! Every gatherer runs as its own child process on its own task. Workers
//! hand their result to a single channel tagged with their declaration
//! index; the coordinator drains the channel into a fixed-size slot
//! vector, so result order never depends on completion order.

use super::ini::parse_facts;
use crate::config::GatheringConfig;
use crate::models::{GatherError, GatherResult};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Launches gatherers and collects their facts.
#[derive(Debug, Clone)]
pub struct GathererRunner {
    /// Extra environment applied to every gatherer process.
    env: Arc<BTreeMap<String, String>>,
    /// Bounded wait per gatherer; `None` waits indefinitely.
    timeout: Option<Duration>,
}

impl GathererRunner {
    /// Create a runner with a shared environment and optional timeout.
    pub fn new(env: BTreeMap<String, String>, timeout: Option<Duration>) -> Self {
        Self {
            env: Arc::new(env),
            timeout,
        }
    }

    /// Build a runner from the `[gathering]` configuration section.
    pub fn from_config(config: &GatheringConfig) -> Self {
        Self::new(config.env.clone(), config.timeout())
    }

    /// Run all gatherers concurrently and wait for every one of them.
    ///
    /// The returned vector has one entry per gatherer, at the gatherer's
    /// declaration index. Failures are recorded per entry and never abort
    /// the other gatherers.
    pub async fn run(&self, gatherers: &[PathBuf]) -> Vec<GatherResult> {
        if gatherers.is_empty() {
            return Vec::new();
        }

        let (tx, mut rx) = mpsc::channel::<GatherResult>(gatherers.len());

        for (index, gatherer) in gatherers.iter().enumerate() {
            let tx = tx.clone();
            let gatherer = gatherer.clone();
            let env = Arc::clone(&self.env);
            let timeout = self.timeout;

            tokio::spawn(async move {
                let result = execute(index, gatherer, &env, timeout).await;
                let _ = tx.send(result).await;
            });
        }

        // The channel closes once every worker has dropped its sender.
        drop(tx);

        let mut slots: Vec<Option<GatherResult>> = (0..gatherers.len()).map(|_| None).collect();
        while let Some(result) = rx.recv().await {
            let index = result.index;
            slots[index] = Some(result);
        }

        slots
            .into_iter()
            .zip(gatherers)
            .enumerate()
            .map(|(index, (slot, gatherer))| {
                slot.unwrap_or_else(|| {
                    error!("Gatherer {} did not report a result", gatherer.display());
                    GatherResult::failed(index, gatherer.clone(), GatherError::Lost)
                })
            })
            .collect()
    }
}

/// Run one gatherer to completion and parse its stdout.
async fn execute(
    index: usize,
    gatherer: PathBuf,
    env: &BTreeMap<String, String>,
    timeout: Option<Duration>,
) -> GatherResult {
    info!("Executing gatherer: {}", gatherer.display());

    // `kill_on_drop` makes an expired timeout kill the child.
    let mut cmd = Command::new(&gatherer);
    cmd.envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match timeout {
        Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
            Ok(output) => output,
            Err(_elapsed) => {
                let error = GatherError::TimedOut { limit };
                warn!("Gatherer {} {}", gatherer.display(), error);
                return GatherResult::failed(index, gatherer, error);
            }
        },
        None => cmd.output().await,
    };

    let output = match output {
        Ok(output) => output,
        Err(e) => {
            let error = GatherError::Launch(e);
            error!("Gatherer {} {}", gatherer.display(), error);
            return GatherResult::failed(index, gatherer, error);
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !stderr.is_empty() {
            debug!("Gatherer {} stderr: {}", gatherer.display(), stderr);
        }
        let error = GatherError::Exit {
            code: output.status.code(),
            stderr,
        };
        warn!("Gatherer {} {}", gatherer.display(), error);
        return GatherResult::failed(index, gatherer, error);
    }

    let facts = parse_facts(&output.stdout);
    debug!(
        "Gatherer {} reported {} facts",
        gatherer.display(),
        facts.len()
    );

    GatherResult::success(index, gatherer, facts)
}
