//! Prometheus metrics for the mock handler.
//!
//! Tracks how requests are routed (mocked or passed through), how URLs are
//! resolved against the registered rules, injected delays and failures.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram, CounterVec, Encoder, Histogram, TextEncoder,
};
use std::time::Duration;
use tracing::warn;

lazy_static! {
    /// Requests seen by the handler
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "conditional_mock_requests_total",
        "Total number of requests seen by the mock handler",
        &["outcome"]  // outcome: intercepted|passthrough
    )
    .unwrap();

    /// Rule resolutions
    pub static ref RESOLUTIONS_TOTAL: CounterVec = register_counter_vec!(
        "conditional_mock_resolutions_total",
        "Total number of URL resolutions against registered rules",
        &["result"]  // result: cache_hit|literal|pattern|miss
    )
    .unwrap();

    /// Failed deliveries
    pub static ref FAILURES_TOTAL: CounterVec = register_counter_vec!(
        "conditional_mock_failures_total",
        "Total number of requests that completed with an error",
        &["kind"]
    )
    .unwrap();

    /// Injected delay in milliseconds
    pub static ref DELAY_MS: Histogram = register_histogram!(
        "conditional_mock_delay_ms",
        "Histogram of delays applied to mocked responses in milliseconds",
        vec![1.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

pub fn record_request(outcome: &str) {
    REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_resolution(result: &str) {
    RESOLUTIONS_TOTAL.with_label_values(&[result]).inc();
}

pub fn record_failure(kind: &str) {
    FAILURES_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_delay(delay: Duration) {
    DELAY_MS.observe(delay.as_secs_f64() * 1000.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collection() {
        record_request("intercepted");
        record_request("passthrough");
        record_resolution("pattern");
        record_resolution("miss");

        let metrics = collect_metrics();
        assert!(metrics.contains("conditional_mock_requests_total"));
        assert!(metrics.contains("conditional_mock_resolutions_total"));
    }

    #[test]
    fn test_failure_and_delay_metrics() {
        record_failure("mocked");
        record_delay(Duration::from_millis(120));

        let metrics = collect_metrics();
        assert!(metrics.contains("conditional_mock_failures_total"));
        assert!(metrics.contains("conditional_mock_delay_ms"));
    }

    #[test]
    fn test_counters_increment() {
        let before = RESOLUTIONS_TOTAL.with_label_values(&["literal"]).get();
        record_resolution("literal");
        record_resolution("literal");
        let after = RESOLUTIONS_TOTAL.with_label_values(&["literal"]).get();
        assert!(after >= before + 2.0);
    }
}
