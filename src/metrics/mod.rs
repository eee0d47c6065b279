//! Metrics collection for observability

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_vec_with_registry, register_histogram_with_registry, Counter, CounterVec,
    Histogram, HistogramVec, Opts, Registry,
};
use std::sync::Arc;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Structuring metrics
    pub documents_structured: CounterVec,
    pub extraction_failures: CounterVec,

    // Context assembly metrics
    pub context_builds: Counter,
    pub context_length_chars: Histogram,

    // Completion metrics
    pub completion_requests: CounterVec,
    pub completion_duration: HistogramVec,
    pub completion_fallbacks: CounterVec,
    pub circuit_open: Counter,

    // Document cache metrics
    pub cache_hits: Counter,
    pub cache_misses: Counter,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let documents_structured = register_counter_vec_with_registry!(
            Opts::new("documents_structured_total", "Total documents structured"),
            &["type"],
            registry
        )?;

        let extraction_failures = register_counter_vec_with_registry!(
            Opts::new("extraction_failures_total", "Total text extraction failures"),
            &["type"],
            registry
        )?;

        let context_builds = register_counter_with_registry!(
            Opts::new("context_builds_total", "Total context strings assembled"),
            registry
        )?;

        let context_length_chars = register_histogram_with_registry!(
            "context_length_chars",
            "Assembled context length in characters",
            vec![100.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0],
            registry
        )?;

        let completion_requests = register_counter_vec_with_registry!(
            Opts::new("completion_requests_total", "Total completion requests"),
            &["mode", "status"],
            registry
        )?;

        let completion_duration = register_histogram_vec_with_registry!(
            "completion_duration_seconds",
            "Completion request duration in seconds",
            &["mode"],
            registry
        )?;

        let completion_fallbacks = register_counter_vec_with_registry!(
            Opts::new("completion_fallbacks_total", "Total offline fallback responses"),
            &["reason"],
            registry
        )?;

        let circuit_open = register_counter_with_registry!(
            Opts::new("completion_circuit_open_total", "Requests rejected by the circuit breaker"),
            registry
        )?;

        let cache_hits = register_counter_with_registry!(
            Opts::new("document_cache_hits_total", "Document cache hits"),
            registry
        )?;

        let cache_misses = register_counter_with_registry!(
            Opts::new("document_cache_misses_total", "Document cache misses"),
            registry
        )?;

        Ok(Self {
            registry,
            documents_structured,
            extraction_failures,
            context_builds,
            context_length_chars,
            completion_requests,
            completion_duration,
            completion_fallbacks,
            circuit_open,
            cache_hits,
            cache_misses,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_document_structured(&self, doc_type: &str) {
        self.documents_structured.with_label_values(&[doc_type]).inc();
    }

    pub fn record_extraction_failure(&self, doc_type: &str) {
        self.extraction_failures.with_label_values(&[doc_type]).inc();
    }

    /// Record an assembled context
    pub fn record_context(&self, length_chars: usize) {
        self.context_builds.inc();
        self.context_length_chars.observe(length_chars as f64);
    }

    /// Record a completion attempt outcome
    pub fn record_completion(&self, mode: &str, success: bool, seconds: f64) {
        let status = if success { "success" } else { "error" };
        self.completion_requests.with_label_values(&[mode, status]).inc();
        self.completion_duration.with_label_values(&[mode]).observe(seconds);
    }

    pub fn record_fallback(&self, reason: &str) {
        self.completion_fallbacks.with_label_values(&[reason]).inc();
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        if hit {
            self.cache_hits.inc();
        } else {
            self.cache_misses.inc();
        }
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        let metrics = Metrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_record_completion() {
        let metrics = Metrics::new().unwrap();
        metrics.record_completion("chat", true, 0.2);
        metrics.record_completion("chat", false, 1.5);
        metrics.record_fallback("network");

        let exported = metrics.export_prometheus();
        assert!(exported.contains("completion_requests_total"));
        assert!(exported.contains("completion_fallbacks_total"));
    }

    #[test]
    fn test_record_context_and_cache() {
        let metrics = Metrics::new().unwrap();
        metrics.record_context(1200);
        metrics.record_cache_lookup(true);
        metrics.record_cache_lookup(false);
        assert_eq!(metrics.cache_hits.get(), 1.0);
        assert_eq!(metrics.cache_misses.get(), 1.0);
        assert_eq!(metrics.context_builds.get(), 1.0);
    }
}
