//! The report cycle: gather, merge, expand, deliver, repeat.
//!
//! Exactly one cycle runs at a time. The next cycle is scheduled one
//! interval after the previous one *completes*, so a slow cycle delays
//! the next one instead of overlapping it.

use crate::config::Config;
use crate::deliver::{DeliveryOutcome, PayloadDeliverer};
use crate::gather::{self, GathererRunner};
use crate::models::GatherResult;
use crate::template::{self, SubstitutionFailure};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Whether a cycle is currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    InCycle,
}

/// What happened during one cycle.
#[derive(Debug)]
pub struct CycleReport {
    /// When the cycle started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration of the cycle.
    pub duration: Duration,
    /// Per-gatherer results, in declaration order.
    pub gatherers: Vec<GatherResult>,
    /// Number of facts after merging.
    pub fact_count: usize,
    /// Expressions left unresolved in the payload.
    pub substitution_failures: Vec<SubstitutionFailure>,
    /// Expanded payload, `None` if the template could not be expanded.
    pub payload: Option<serde_json::Value>,
    /// Per-target delivery results, in target order.
    pub deliveries: Vec<DeliveryOutcome>,
}

impl CycleReport {
    pub fn gatherers_failed(&self) -> usize {
        self.gatherers.iter().filter(|g| !g.is_success()).count()
    }

    pub fn deliveries_failed(&self) -> usize {
        self.deliveries.iter().filter(|d| !d.is_success()).count()
    }
}

/// Drives report cycles for a loaded configuration.
pub struct Reporter {
    config: Config,
    runner: GathererRunner,
    deliverer: PayloadDeliverer,
    state: CycleState,
}

impl Reporter {
    /// Create a reporter with an HTTP client built from the configuration.
    pub fn new(config: Config) -> Result<Self> {
        let deliverer = PayloadDeliverer::new(config.request_timeout())?;
        Ok(Self::with_deliverer(config, deliverer))
    }

    /// Create a reporter using an existing deliverer.
    pub fn with_deliverer(config: Config, deliverer: PayloadDeliverer) -> Self {
        let runner = GathererRunner::from_config(&config.gathering);
        Self {
            config,
            runner,
            deliverer,
            state: CycleState::Idle,
        }
    }

    /// Current cycle state.
    #[cfg(test)]
    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Run a single gather → merge → expand → deliver pass.
    ///
    /// Never fails as a whole: every error is confined to its gatherer,
    /// expression or target and recorded in the returned report.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.transition(CycleState::InCycle);
        let started_at = Utc::now();
        let start = Instant::now();
        info!("Starting report cycle");

        // Step 1: Run every gatherer
        let gatherers = self.runner.run(&self.config.gathering.gatherers).await;

        // Step 2: Merge facts in declaration order
        let facts = gather::merge(&gatherers);
        debug!("Merged {} facts", facts.len());

        // Step 3: Expand a fresh copy of the template
        let (payload, substitution_failures) = match template::expand(&self.config.payload, &facts)
        {
            Ok(expansion) => {
                for failure in &expansion.failures {
                    warn!(
                        "Cannot expand '${{{}}}' at {}: {}",
                        failure.expression, failure.path, failure.error
                    );
                }
                (Some(expansion.payload), expansion.failures)
            }
            Err(e) => {
                error!("Cannot build payload: {}", e);
                (None, Vec::new())
            }
        };

        // Step 4: Deliver
        let deliveries = match &payload {
            Some(payload) => self.deliver(payload).await,
            None => Vec::new(),
        };

        let report = CycleReport {
            started_at,
            duration: start.elapsed(),
            fact_count: facts.len(),
            gatherers,
            substitution_failures,
            payload,
            deliveries,
        };

        info!(
            "Report cycle finished in {:.2}s: gatherers {} ok / {} failed, {} facts, {} unresolved expressions, deliveries {} ok / {} failed",
            report.duration.as_secs_f64(),
            report.gatherers.len() - report.gatherers_failed(),
            report.gatherers_failed(),
            report.fact_count,
            report.substitution_failures.len(),
            report.deliveries.len() - report.deliveries_failed(),
            report.deliveries_failed(),
        );

        self.transition(CycleState::Idle);
        report
    }

    fn transition(&mut self, next: CycleState) {
        debug!("Cycle state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    async fn deliver(&self, payload: &serde_json::Value) -> Vec<DeliveryOutcome> {
        if self.config.general.verbose {
            match serde_json::to_string_pretty(payload) {
                Ok(pretty) => println!("Payload:\n{}", pretty),
                Err(e) => warn!("Cannot pretty-print payload: {}", e),
            }
        }

        match self
            .deliverer
            .deliver(payload, &self.config.delivery.targets)
            .await
        {
            Ok(outcomes) => outcomes,
            Err(e) => {
                error!("Cannot serialize payload: {}", e);
                Vec::new()
            }
        }
    }

    /// Run cycles until `shutdown` resolves.
    ///
    /// The first cycle starts immediately; each following one starts one
    /// interval after the previous one finished.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) {
        let interval = self.config.interval();
        tokio::pin!(shutdown);

        info!(
            "Reporting every {}s to {} target(s)",
            interval.as_secs(),
            self.config.delivery.targets.len()
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping reporter");
                    break;
                }
                _ = self.run_cycle() => {}
            }

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping reporter");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }

        if self.state != CycleState::Idle {
            self.transition(CycleState::Idle);
        }
    }
}
