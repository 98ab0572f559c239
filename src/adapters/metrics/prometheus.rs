//! Prometheus Metrics Registry - Crawler Observability
//!
//! Registers the poll loop's counters and gauges and renders them in
//! the Prometheus text format for the `/metrics` route.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

/// Centralized Prometheus metrics for the crawler.
///
/// All metrics follow the naming convention `price_crawler_*`.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Completed poll cycles.
    pub cycles: IntCounter,
    /// Cycles with no fresh source, where nothing was published.
    pub skipped_cycles: IntCounter,
    /// Source failures by source and kind (transport / protocol).
    pub source_failures: IntCounterVec,
    /// Publish failures by publisher.
    pub publish_failures: IntCounterVec,
    /// Wall time of one cycle (poll + build + publish), seconds.
    pub cycle_duration: Histogram,
    /// Whether a source made it into the last snapshot (1 = yes).
    pub source_up: IntGaugeVec,
    /// Number of sources in the last published snapshot.
    pub published_sources: IntGauge,
}

impl MetricsRegistry {
    /// Create and register all metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let cycles = IntCounter::new("price_crawler_cycles_total", "Completed poll cycles")?;

        let skipped_cycles = IntCounter::new(
            "price_crawler_skipped_cycles_total",
            "Cycles where every source failed and the published state was kept",
        )?;

        let source_failures = IntCounterVec::new(
            Opts::new("price_crawler_source_failures_total", "Failed source polls"),
            &["source", "kind"],
        )?;

        let publish_failures = IntCounterVec::new(
            Opts::new("price_crawler_publish_failures_total", "Failed snapshot commits"),
            &["publisher"],
        )?;

        let cycle_duration = Histogram::with_opts(
            HistogramOpts::new(
                "price_crawler_cycle_duration_seconds",
                "Poll cycle duration in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;

        let source_up = IntGaugeVec::new(
            Opts::new(
                "price_crawler_source_up",
                "Source present in the last snapshot (1=yes, 0=no)",
            ),
            &["source"],
        )?;

        let published_sources = IntGauge::new(
            "price_crawler_published_sources",
            "Sources in the last published snapshot",
        )?;

        registry.register(Box::new(cycles.clone()))?;
        registry.register(Box::new(skipped_cycles.clone()))?;
        registry.register(Box::new(source_failures.clone()))?;
        registry.register(Box::new(publish_failures.clone()))?;
        registry.register(Box::new(cycle_duration.clone()))?;
        registry.register(Box::new(source_up.clone()))?;
        registry.register(Box::new(published_sources.clone()))?;

        Ok(Self {
            registry,
            cycles,
            skipped_cycles,
            source_failures,
            publish_failures,
            cycle_duration,
            source_up,
            published_sources,
        })
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
