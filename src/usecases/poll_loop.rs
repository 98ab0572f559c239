//! Poll Loop - Fixed-Cadence Price Aggregation
//!
//! Each tick:
//! 1. Polls every source concurrently, each under its own timeout
//! 2. Builds a fresh snapshot from the joined results
//! 3. Commits it through every publisher
//! 4. Sleeps for the interval (relative to the end of the work)
//!
//! Source failures cost that source one cycle and never stop the loop.
//! A cycle in which every source failed publishes nothing, so the last
//! good state stays visible. Only cancellation, or repeated failure to
//! commit, ends the loop.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::metrics::{HealthState, MetricsRegistry};
use crate::config::CrawlerConfig;
use crate::domain::{Currency, Snapshot, SnapshotBuilder, SourceError, SourceResult};
use crate::ports::{PriceSource, SnapshotPublisher};

/// Where the loop is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
  Idle,
  Polling,
  Building,
  Publishing,
  Sleeping,
  Stopped,
}

/// Poll loop settings.
#[derive(Debug, Clone)]
pub struct PollLoopConfig {
  /// Sleep after each completed cycle.
  pub interval: Duration,
  /// Upper bound on one source's fetch.
  pub source_timeout: Duration,
  /// Currencies requested from every source.
  pub currencies: Vec<Currency>,
  /// Quote currency.
  pub fiat: Currency,
  /// Consecutive failed commits before giving up.
  pub max_consecutive_publish_failures: u32,
}

impl From<&CrawlerConfig> for PollLoopConfig {
  fn from(config: &CrawlerConfig) -> Self {
    Self {
      interval: config.interval(),
      source_timeout: config.source_timeout(),
      currencies: config.currencies.clone(),
      fiat: config.fiat,
      max_consecutive_publish_failures: config.max_consecutive_publish_failures,
    }
  }
}

/// Outcome of one cycle.
#[derive(Debug)]
pub struct CycleReport {
  /// The snapshot that was committed (or attempted); `None` when no
  /// source answered and the published state was left alone.
  pub snapshot: Option<Snapshot>,
  /// Sources that failed this cycle.
  pub source_failures: Vec<SourceError>,
  /// Publishers that failed to commit.
  pub publish_failures: usize,
}

/// Scheduler driving sources → builder → publishers.
pub struct PollLoop {
  sources: Vec<Arc<dyn PriceSource>>,
  publishers: Vec<Arc<dyn SnapshotPublisher>>,
  builder: SnapshotBuilder,
  config: PollLoopConfig,
  metrics: Arc<MetricsRegistry>,
  health: Arc<HealthState>,
  state_tx: watch::Sender<LoopState>,
  /// Last built snapshot, input to the carry-over policy.
  previous: Option<Snapshot>,
}

impl PollLoop {
  pub fn new(
    sources: Vec<Arc<dyn PriceSource>>,
    publishers: Vec<Arc<dyn SnapshotPublisher>>,
    builder: SnapshotBuilder,
    config: PollLoopConfig,
    metrics: Arc<MetricsRegistry>,
    health: Arc<HealthState>,
  ) -> Self {
    let (state_tx, _) = watch::channel(LoopState::Idle);

    Self {
      sources,
      publishers,
      builder,
      config,
      metrics,
      health,
      state_tx,
      previous: None,
    }
  }

  /// Seed the previous snapshot, e.g. from the file left by the last run.
  #[must_use]
  pub fn with_previous(mut self, previous: Option<Snapshot>) -> Self {
    self.previous = previous;
    self
  }

  /// Watch the loop's state transitions.
  pub fn state(&self) -> watch::Receiver<LoopState> {
    self.state_tx.subscribe()
  }

  /// Run until `cancel` fires or commits keep failing.
  ///
  /// Cancellation is honored at the top of the loop, while polling
  /// (the in-flight requests are dropped and nothing is published)
  /// and while sleeping. A build/publish that has started completes.
  #[instrument(skip(self, cancel), name = "poll_loop")]
  pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
    info!(
      sources = self.sources.len(),
      publishers = self.publishers.len(),
      interval_ms = self.config.interval.as_millis() as u64,
      policy = ?self.builder.policy(),
      "Poll loop started"
    );
    self.health.set_poller_running(true);

    let mut consecutive_publish_failures = 0u32;

    let outcome = loop {
      if cancel.is_cancelled() {
        break Ok(());
      }

      let started = Instant::now();

      self.set_state(LoopState::Polling);
      let results = tokio::select! {
        biased;
        () = cancel.cancelled() => {
          info!("Cancelled while polling, abandoning cycle");
          break Ok(());
        }
        results = self.poll_sources() => results,
      };

      let report = self.commit(&results).await;
      self.metrics.cycle_duration.observe(started.elapsed().as_secs_f64());

      let committed = report.snapshot.is_some();
      if committed && report.publish_failures == 0 {
        consecutive_publish_failures = 0;
      } else if committed {
        consecutive_publish_failures += 1;
        if consecutive_publish_failures >= self.config.max_consecutive_publish_failures {
          error!(
            consecutive = consecutive_publish_failures,
            "Snapshot could not be committed, giving up"
          );
          break Err(anyhow::anyhow!(
            "publishing failed {consecutive_publish_failures} cycles in a row"
          ));
        }
      }

      self.set_state(LoopState::Sleeping);
      tokio::select! {
        biased;
        () = cancel.cancelled() => break Ok(()),
        () = sleep(self.config.interval) => {}
      }
    };

    self.set_state(LoopState::Stopped);
    self.health.set_poller_running(false);
    info!("Poll loop stopped");
    outcome
  }

  /// Run one full cycle without sleeping.
  pub async fn run_cycle(&mut self) -> CycleReport {
    self.set_state(LoopState::Polling);
    let results = self.poll_sources().await;
    self.commit(&results).await
  }

  /// Poll every source concurrently and join the results.
  pub async fn poll_sources(&self) -> BTreeMap<String, SourceResult> {
    let currencies = self.config.currencies.as_slice();
    let fiat = self.config.fiat;
    let limit = self.config.source_timeout;

    let fetches = self.sources.iter().map(|source| async move {
      let name = source.name();
      let result = match timeout(limit, source.fetch(currencies, fiat)).await {
        Ok(result) => result,
        Err(_) => Err(SourceError::transport(
          name,
          format!("timed out after {}ms", limit.as_millis()),
        )),
      };
      (name.to_string(), result)
    });

    join_all(fetches).await.into_iter().collect()
  }

  /// Build a snapshot from `results` and hand it to every publisher.
  async fn commit(&mut self, results: &BTreeMap<String, SourceResult>) -> CycleReport {
    self.set_state(LoopState::Building);

    let source_failures: Vec<SourceError> = results
      .values()
      .filter_map(|result| result.as_ref().err().cloned())
      .collect();

    for failure in &source_failures {
      warn!(
        source = failure.exchange(),
        kind = failure.kind(),
        error = %failure,
        "Source failed this cycle"
      );
      self
        .metrics
        .source_failures
        .with_label_values(&[failure.exchange(), failure.kind()])
        .inc();
    }

    if self.builder.complete_sources(results) == 0 {
      for name in results.keys() {
        self.metrics.source_up.with_label_values(&[name.as_str()]).set(0);
      }
      self.metrics.cycles.inc();
      self.metrics.skipped_cycles.inc();
      warn!(
        failed_sources = source_failures.len(),
        "No source answered, keeping the published snapshot"
      );

      return CycleReport {
        snapshot: None,
        source_failures,
        publish_failures: 0,
      };
    }

    let snapshot = self.builder.build(results, self.previous.as_ref());

    for name in results.keys() {
      let up = i64::from(snapshot.source(name).is_some());
      self.metrics.source_up.with_label_values(&[name.as_str()]).set(up);
    }

    self.set_state(LoopState::Publishing);
    let publish_failures = self.publish(&snapshot).await;

    self.metrics.cycles.inc();
    self.metrics.published_sources.set(snapshot.len() as i64);
    debug!(
      sources = snapshot.len(),
      failed_sources = source_failures.len(),
      publish_failures,
      "Cycle complete"
    );

    self.previous = Some(snapshot.clone());

    CycleReport {
      snapshot: Some(snapshot),
      source_failures,
      publish_failures,
    }
  }

  async fn publish(&self, snapshot: &Snapshot) -> usize {
    let mut failures = 0;

    for publisher in &self.publishers {
      if let Err(e) = publisher.publish(snapshot).await {
        failures += 1;
        warn!(publisher = publisher.name(), error = %e, "Publish failed, keeping previous state");
        self
          .metrics
          .publish_failures
          .with_label_values(&[publisher.name()])
          .inc();
      }
    }

    if failures == 0 {
      if self.health.last_publish().is_none() {
        info!(sources = snapshot.len(), "First snapshot published");
      }
      self.health.record_publish(Utc::now());
    }

    failures
  }

  fn set_state(&self, state: LoopState) {
    self.state_tx.send_replace(state);
  }
}
