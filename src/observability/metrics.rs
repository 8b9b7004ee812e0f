use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the process-wide `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE
        .get_or_init(|| async {
            info!("Initializing Metrics ...");
            Metrics::new()
        })
        .await
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Token cache metrics
    pub token_refresh: IntCounter,
    pub token_refresh_failures: IntCounterVec,
    pub token_cache_hits: IntCounter,
    pub token_expiry_unix: IntGauge,

    // Upstream (metadata api) metrics
    pub upstream_requests: IntCounterVec,
    pub upstream_failures: IntCounterVec,
    pub upstream_duration: HistogramVec,

    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("igdbrelay".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Token cache
            token_refresh: IntCounter::new("token_refresh_total", "Token refresh attempts").unwrap(),
            token_refresh_failures: IntCounterVec::new(Opts::new("token_refresh_failures_total", "Token refresh failures by reason"), &["reason"]).unwrap(),
            token_cache_hits: IntCounter::new("token_cache_hits_total", "Requests served from the cached token").unwrap(),
            token_expiry_unix: IntGauge::new("token_expiry_unix_seconds", "Margin-adjusted expiry of the held token").unwrap(),

            // Upstream
            upstream_requests: IntCounterVec::new(Opts::new("upstream_requests_total", "Metadata api requests by route"), &["route"]).unwrap(),
            upstream_failures: IntCounterVec::new(Opts::new("upstream_failures_total", "Metadata api failures by route and reason"), &["route", "reason"]).unwrap(),
            upstream_duration: HistogramVec::new(HistogramOpts::new("upstream_duration_seconds", "Metadata api request duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]), &["route"]).unwrap(),

            up: IntGauge::new("up", "1 if service is healthy").unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.token_refresh.clone())).unwrap();
        reg.register(Box::new(metrics.token_refresh_failures.clone())).unwrap();
        reg.register(Box::new(metrics.token_cache_hits.clone())).unwrap();
        reg.register(Box::new(metrics.token_expiry_unix.clone())).unwrap();
        reg.register(Box::new(metrics.upstream_requests.clone())).unwrap();
        reg.register(Box::new(metrics.upstream_failures.clone())).unwrap();
        reg.register(Box::new(metrics.upstream_duration.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        metrics
    }
}
