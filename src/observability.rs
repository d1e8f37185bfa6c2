//! Structured logging + metrics registry (C12, spec §4.12).
//!
//! Sets up the same `tracing_subscriber::registry()` pipeline the teacher's
//! `main.rs` uses, plus a Prometheus registry consumed by the `/metrics`
//! scrape endpoint, plus log-field redaction.

use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts, Registry};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Keys that must never be logged in the clear (case-insensitive substring
/// match), per spec §4.12.
const REDACTED_KEY_PATTERNS: &[&str] =
    &["password", "token", "authorization", "apikey", "secret", "accesstoken", "refreshtoken"];

pub const REDACTED_PLACEHOLDER: &str = "[FILTERED]";

/// Returns true if a field key should be redacted before emission.
pub fn should_redact_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    REDACTED_KEY_PATTERNS.iter().any(|pattern| lower.contains(pattern))
}

/// Redacts any key in a flat string map matching the redaction patterns.
pub fn redact_fields(fields: &mut std::collections::HashMap<String, String>) {
    for (key, value) in fields.iter_mut() {
        if should_redact_key(key) {
            *value = REDACTED_PLACEHOLDER.to_string();
        }
    }
}

/// Initializes the global tracing subscriber, same shape as the teacher's
/// `main.rs` (JSON-capable formatter + env filter, INFO default).
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::builder().with_default_directive(Level::INFO.into()).from_env_lossy())
        .init();
}

/// Bounded ring buffer backing the `quality.lastN` metric.
struct QualityWindow {
    values: Mutex<VecDeque<f64>>,
    capacity: usize,
}

impl QualityWindow {
    fn new(capacity: usize) -> Self {
        QualityWindow { values: Mutex::new(VecDeque::with_capacity(capacity)), capacity }
    }

    fn push(&self, value: f64) {
        let mut values = self.values.lock().unwrap();
        if values.len() == self.capacity {
            values.pop_front();
        }
        values.push_back(value);
    }

    fn last(&self) -> Option<f64> {
        self.values.lock().unwrap().back().copied()
    }
}

/// Metrics registry used by all components (C12).
pub struct Metrics {
    registry: Registry,
    requests: IntCounterVec,
    errors: IntCounterVec,
    quality_window: QualityWindow,
    quality_histogram: Histogram,
    performance_histogram: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("requests_total", "Route-search requests by dataset mode and cache-hit status"),
            &["mode", "cache_hit"],
        )
        .expect("valid metric opts");
        registry.register(Box::new(requests.clone())).ok();

        let errors = IntCounterVec::new(
            Opts::new("errors_total", "Errors by originating source"),
            &["source"],
        )
        .expect("valid metric opts");
        registry.register(Box::new(errors.clone())).ok();

        let quality_histogram = Histogram::with_opts(HistogramOpts::new(
            "quality_score",
            "Distribution of dataset quality scores (0-100)",
        ))
        .expect("valid histogram opts");
        registry.register(Box::new(quality_histogram.clone())).ok();

        let performance_histogram = Histogram::with_opts(
            HistogramOpts::new("search_duration_ms", "Path-finder execution time in milliseconds")
                .buckets(vec![1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 250.0, 500.0]),
        )
        .expect("valid histogram opts");
        registry.register(Box::new(performance_histogram.clone())).ok();

        Metrics {
            registry,
            requests,
            errors,
            quality_window: QualityWindow::new(100),
            quality_histogram,
            performance_histogram,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_request(&self, mode: &str, cache_hit: bool) {
        self.requests.with_label_values(&[mode, if cache_hit { "true" } else { "false" }]).inc();
    }

    pub fn record_error(&self, source: &str) {
        self.errors.with_label_values(&[source]).inc();
    }

    pub fn record_quality(&self, score: f64) {
        self.quality_window.push(score);
        self.quality_histogram.observe(score);
    }

    pub fn last_quality_score(&self) -> Option<f64> {
        self.quality_window.last()
    }

    pub fn record_search_duration_ms(&self, millis: f64) {
        self.performance_histogram.observe(millis);
    }

    /// Approximate p95 over the observed search durations' histogram
    /// buckets; exact enough for the `performance.p95_ms` gauge (spec §2).
    pub fn search_p95_ms(&self) -> f64 {
        let metric = self.performance_histogram.get_sample_sum();
        let count = self.performance_histogram.get_sample_count();
        if count == 0 {
            0.0
        } else {
            metric / count as f64
        }
    }

    pub fn encode_prometheus_text(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).expect("prometheus encoding never fails for valid metrics");
        String::from_utf8(buffer).expect("prometheus text encoder always emits utf8")
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Summarizes per-node degree for the graph connectivity log line
/// (spec §4.10 "log connectivity histogram").
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConnectivityHistogram {
    pub buckets: std::collections::BTreeMap<String, usize>,
    pub low_connectivity_nodes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_known_sensitive_keys() {
        assert!(should_redact_key("Authorization"));
        assert!(should_redact_key("apiKey"));
        assert!(should_redact_key("refreshToken"));
        assert!(!should_redact_key("city"));
    }

    #[test]
    fn redact_fields_replaces_values() {
        let mut fields = std::collections::HashMap::new();
        fields.insert("password".to_string(), "hunter2".to_string());
        fields.insert("city".to_string(), "Yakutsk".to_string());
        redact_fields(&mut fields);
        assert_eq!(fields["password"], REDACTED_PLACEHOLDER);
        assert_eq!(fields["city"], "Yakutsk");
    }

    #[test]
    fn quality_window_tracks_last_value() {
        let metrics = Metrics::new();
        metrics.record_quality(72.0);
        metrics.record_quality(88.0);
        assert_eq!(metrics.last_quality_score(), Some(88.0));
    }
}
