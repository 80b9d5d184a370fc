use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

// Global Prometheus registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

fn service_label() -> String {
    std::env::var("APP_SERVICE").unwrap_or_else(|_| env!("CARGO_PKG_NAME").to_string())
}

pub static CACHE_HITS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::with_opts(
        Opts::new("cache_hits_total", "Total cache hits").const_label("service", service_label()),
    )
    .unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static CACHE_MISSES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::with_opts(
        Opts::new("cache_misses_total", "Total cache misses").const_label("service", service_label()),
    )
    .unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

/// Cache-store failures that were absorbed, by operation (get/set/delete/clear).
pub static CACHE_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("cache_errors_total", "Cache store failures treated as misses or no-ops")
            .const_label("service", service_label()),
        &["op"],
    )
    .unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static CACHE_KEYS_INVALIDATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::with_opts(
        Opts::new("cache_keys_invalidated_total", "Cache keys deleted by invalidation")
            .const_label("service", service_label()),
    )
    .unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

/// Reconciliation passes by outcome.
pub static SYNC_PASSES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("sync_passes_total", "Reconciliation passes by outcome")
            .const_label("service", service_label()),
        &["outcome"],
    )
    .unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static SYNC_PASS_DURATION_MS: Lazy<Histogram> = Lazy::new(|| {
    let buckets = vec![5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0, 15000.0];
    let mut opts = HistogramOpts::new("sync_pass_duration_ms", "Reconciliation pass duration in milliseconds")
        .buckets(buckets);
    opts.common_opts = opts.common_opts.const_label("service", service_label());
    let h = Histogram::with_opts(opts).unwrap();
    REGISTRY.register(Box::new(h.clone())).ok();
    h
});

/// Force registration of every metric so the exposition is complete from the start.
pub fn init() {
    Lazy::force(&CACHE_HITS_TOTAL);
    Lazy::force(&CACHE_MISSES_TOTAL);
    Lazy::force(&CACHE_ERRORS_TOTAL);
    Lazy::force(&CACHE_KEYS_INVALIDATED_TOTAL);
    Lazy::force(&SYNC_PASSES_TOTAL);
    Lazy::force(&SYNC_PASS_DURATION_MS);
}

/// Prometheus text exposition of the registry.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
