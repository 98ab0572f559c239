//! Supervisor - Structured Lifecycle for Poll Loop and File Server
//!
//! Wires the adapters from config, then runs the poll loop and the
//! file server as two tasks under one cancellation token. Either a
//! shutdown signal or one task exiting cancels the token; both tasks
//! are then joined before `run` returns.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::poll_loop::{PollLoop, PollLoopConfig};
use crate::adapters::metrics::{HealthState, MetricsRegistry};
use crate::adapters::publish::{FilePublisher, SnapshotCell};
use crate::adapters::server::{FileServer, ServerState};
use crate::adapters::sources::{coinbase, kraken, CoinbaseSource, KrakenSource, SourceClient};
use crate::config::AppConfig;
use crate::domain::SnapshotBuilder;
use crate::ports::{PriceSource, SnapshotPublisher};

/// Parent scope for the crawler's two units.
pub struct Supervisor {
  config: AppConfig,
}

impl Supervisor {
  pub fn new(config: AppConfig) -> Self {
    Self { config }
  }

  /// Build the enabled price sources.
  pub fn build_sources(config: &AppConfig) -> Result<Vec<Arc<dyn PriceSource>>> {
    let mut sources: Vec<Arc<dyn PriceSource>> = Vec::with_capacity(2);

    if config.sources.kraken.enabled {
      let base = config
        .sources
        .kraken
        .base_url
        .as_deref()
        .unwrap_or(kraken::DEFAULT_BASE_URL);
      let client = SourceClient::new(kraken::NAME, config.http.client_config(base))?;
      sources.push(Arc::new(KrakenSource::new(client)));
    }

    if config.sources.coinbase.enabled {
      let base = config
        .sources
        .coinbase
        .base_url
        .as_deref()
        .unwrap_or(coinbase::DEFAULT_BASE_URL);
      let client = SourceClient::new(coinbase::NAME, config.http.client_config(base))?;
      sources.push(Arc::new(CoinbaseSource::new(client)));
    }

    Ok(sources)
  }

  /// Run both units until `shutdown` resolves or one of them exits.
  ///
  /// Returns an error if either unit failed.
  pub async fn run<S>(self, shutdown: S) -> Result<()>
  where
    S: Future<Output = ()> + Send,
  {
    let config = self.config;
    let cancel = CancellationToken::new();

    let metrics = Arc::new(MetricsRegistry::new().context("Failed to create metrics registry")?);
    let health = Arc::new(HealthState::new());
    let cell = SnapshotCell::new();

    let file_publisher = FilePublisher::new(&config.publish.path)
      .await
      .context("Failed to prepare publish location")?;
    let previous = match file_publisher.load().await {
      Ok(previous) => previous,
      Err(e) => {
        warn!(error = %e, "Ignoring unreadable published snapshot");
        None
      }
    };
    let file_path = file_publisher.path().to_path_buf();

    let publishers: Vec<Arc<dyn SnapshotPublisher>> =
      vec![Arc::new(file_publisher), Arc::new(cell.clone())];

    let builder = SnapshotBuilder::new(
      config.crawler.currencies.iter().copied(),
      config.crawler.failure_policy,
    );

    let poll_loop = PollLoop::new(
      Self::build_sources(&config)?,
      publishers,
      builder,
      PollLoopConfig::from(&config.crawler),
      Arc::clone(&metrics),
      Arc::clone(&health),
    )
    .with_previous(previous);

    // ── File server ─────────────────────────────────────────
    let mut server_handle: Option<JoinHandle<Result<()>>> = if config.server.enabled {
      let state = ServerState {
        file_path,
        cell,
        health: Arc::clone(&health),
        metrics: Arc::clone(&metrics),
      };
      let server = FileServer::bind(&config.server.bind_address(), &config.server.serve_path, state)
        .await
        .context("Failed to start file server")?;
      Some(tokio::spawn(server.run(cancel.child_token())))
    } else {
      info!("File server disabled");
      None
    };

    // ── Poll loop ───────────────────────────────────────────
    let mut poll_handle = tokio::spawn(poll_loop.run(cancel.child_token()));

    info!(name = %config.crawler.name, "All tasks spawned, crawler is running");

    let mut poll_result = None;
    let mut server_result = None;

    tokio::select! {
      () = shutdown => {
        info!("Shutdown requested, stopping poll loop and file server");
      }
      joined = &mut poll_handle => {
        warn!("Poll loop exited, stopping file server");
        poll_result = Some(joined);
      }
      joined = wait_optional(server_handle.as_mut()) => {
        warn!("File server exited, stopping poll loop");
        server_result = Some(joined);
      }
    }

    cancel.cancel();

    let deadline = config.crawler.shutdown_timeout();
    let poll_result = match poll_result {
      Some(joined) => flatten("poll loop", joined),
      None => join_with_timeout("poll loop", poll_handle, deadline).await,
    };
    let server_result = match (server_result, server_handle) {
      (Some(joined), _) => flatten("file server", joined),
      (None, Some(handle)) => join_with_timeout("file server", handle, deadline).await,
      (None, None) => Ok(()),
    };

    info!("Shutdown complete");
    poll_result.and(server_result)
  }
}

/// Await an optional task; never resolves when there is none.
async fn wait_optional(
  handle: Option<&mut JoinHandle<Result<()>>>,
) -> Result<Result<()>, tokio::task::JoinError> {
  match handle {
    Some(handle) => handle.await,
    None => std::future::pending().await,
  }
}

async fn join_with_timeout(
  unit: &'static str,
  handle: JoinHandle<Result<()>>,
  deadline: Duration,
) -> Result<()> {
  let abort = handle.abort_handle();
  match tokio::time::timeout(deadline, handle).await {
    Ok(joined) => flatten(unit, joined),
    Err(_) => {
      abort.abort();
      error!(unit, timeout_ms = deadline.as_millis() as u64, "Task did not stop in time, aborted");
      Err(anyhow::anyhow!("{unit} did not stop within {}ms", deadline.as_millis()))
    }
  }
}

fn flatten(unit: &'static str, joined: Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
  match joined {
    Ok(Ok(())) => {
      info!(unit, "Task stopped cleanly");
      Ok(())
    }
    Ok(Err(e)) => {
      error!(unit, error = %e, "Task failed");
      Err(e.context(format!("{unit} failed")))
    }
    Err(e) => {
      error!(unit, error = %e, "Task panicked or was aborted");
      Err(anyhow::anyhow!("{unit} task join error: {e}"))
    }
  }
}
