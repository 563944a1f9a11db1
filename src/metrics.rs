use std::sync::Arc;

use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

// ---------------------------------------------------------------------------
// Label types
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RebuildLabels {
    pub outcome: RebuildOutcome,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum RebuildOutcome {
    Rebuilt,
    NoChange,
    SkippedInProgress,
    Failed,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct WebhookLabels {
    pub result: WebhookResult,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum WebhookResult {
    Accepted,
    Ignored,
    Rejected,
    Ping,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct FetchLabels {
    pub result: FetchResult,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum FetchResult {
    Ok,
    Error,
    Timeout,
}

// ---------------------------------------------------------------------------
// Metrics struct
// ---------------------------------------------------------------------------

/// Every Prometheus metric exposed by the sync engine.
pub struct Metrics {
    // -- rebuilds --
    pub rebuild_total: Family<RebuildLabels, Counter>,
    pub rebuild_duration_seconds: Histogram,

    // -- published data --
    pub entries_live: Gauge,
    pub normalization_errors_total: Counter,

    // -- triggers --
    pub webhook_total: Family<WebhookLabels, Counter>,

    // -- upstream --
    pub source_fetch_total: Family<FetchLabels, Counter>,
    pub upstream_rate_limit_remaining: Gauge,
}

impl Metrics {
    /// Create a new [`Metrics`] instance and register every metric with the
    /// supplied `registry`.
    pub fn new(registry: &mut Registry) -> Self {
        let rebuild_total = Family::<RebuildLabels, Counter>::default();
        registry.register(
            "registry_sync_rebuild",
            "Refresh attempts by outcome",
            rebuild_total.clone(),
        );

        let rebuild_duration_seconds = Histogram::new(exponential_buckets(0.01, 2.0, 14));
        registry.register(
            "registry_sync_rebuild_duration_seconds",
            "Duration of refreshes that ran the full pipeline, in seconds",
            rebuild_duration_seconds.clone(),
        );

        let entries_live: Gauge = Gauge::default();
        registry.register(
            "registry_sync_entries_live",
            "Entries in the currently published view set",
            entries_live.clone(),
        );

        let normalization_errors_total = Counter::default();
        registry.register(
            "registry_sync_normalization_errors",
            "Entries dropped by validation or identifier conflicts",
            normalization_errors_total.clone(),
        );

        let webhook_total = Family::<WebhookLabels, Counter>::default();
        registry.register(
            "registry_sync_webhook",
            "Webhook deliveries by result",
            webhook_total.clone(),
        );

        let source_fetch_total = Family::<FetchLabels, Counter>::default();
        registry.register(
            "registry_sync_source_fetch",
            "Source fetch phases by result",
            source_fetch_total.clone(),
        );

        let upstream_rate_limit_remaining: Gauge = Gauge::default();
        registry.register(
            "registry_sync_upstream_rate_limit_remaining",
            "Remaining upstream API calls before rate limit",
            upstream_rate_limit_remaining.clone(),
        );

        Self {
            rebuild_total,
            rebuild_duration_seconds,
            entries_live,
            normalization_errors_total,
            webhook_total,
            source_fetch_total,
            upstream_rate_limit_remaining,
        }
    }

    pub fn record_rebuild(&self, outcome: RebuildOutcome) {
        self.rebuild_total
            .get_or_create(&RebuildLabels { outcome })
            .inc();
    }

    pub fn record_webhook(&self, result: WebhookResult) {
        self.webhook_total
            .get_or_create(&WebhookLabels { result })
            .inc();
    }

    pub fn record_fetch(&self, result: FetchResult) {
        self.source_fetch_total
            .get_or_create(&FetchLabels { result })
            .inc();
    }
}

// ---------------------------------------------------------------------------
// Shared handle
// ---------------------------------------------------------------------------

/// Thread-safe wrapper for the metrics registry, used in `AppState`.
#[derive(Clone)]
pub struct MetricsRegistry {
    pub registry: Arc<Registry>,
    pub metrics: Arc<Metrics>,
}

impl MetricsRegistry {
    /// Build a fresh registry and pre-register all metrics.
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let metrics = Metrics::new(&mut registry);
        Self {
            registry: Arc::new(registry),
            metrics: Arc::new(metrics),
        }
    }

    /// Render the registry in the OpenMetrics text format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buf = String::new();
        prometheus_client::encoding::text::encode(&mut buf, &self.registry)?;
        Ok(buf)
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_exposed_with_total_suffix() {
        let reg = MetricsRegistry::new();
        reg.metrics.record_rebuild(RebuildOutcome::Rebuilt);
        reg.metrics.record_rebuild(RebuildOutcome::SkippedInProgress);
        reg.metrics.record_webhook(WebhookResult::Rejected);
        reg.metrics.entries_live.set(3);

        let text = reg.encode().unwrap();
        assert!(text.contains("registry_sync_rebuild_total{outcome=\"Rebuilt\"} 1"));
        assert!(text.contains("registry_sync_rebuild_total{outcome=\"SkippedInProgress\"} 1"));
        assert!(text.contains("registry_sync_webhook_total{result=\"Rejected\"} 1"));
        assert!(text.contains("registry_sync_entries_live 3"));
    }
}
