//! Prometheus text exposition for the CLI.
//!
//! The core crate owns the metric statics; this module only registers them
//! and renders them on request.

use once_cell::sync::Lazy;
use prometheus::{Encoder, Registry, TextEncoder};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    for metric in squeezer_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
    registry
});

/// Encode all metrics in Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use squeezer_core::metrics::{JOBS_FINISHED, JOBS_SUBMITTED, ROLLBACKS};

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        JOBS_SUBMITTED.inc();

        let output = encode_metrics();
        assert!(output.contains("squeezer_jobs_submitted_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_labelled_metrics_appear_once_touched() {
        JOBS_FINISHED.with_label_values(&["succeeded"]).inc();
        ROLLBACKS.with_label_values(&["direct_file", "deleted"]).inc();

        let output = encode_metrics();
        assert!(output.contains("outcome=\"succeeded\""));
        assert!(output.contains("result=\"deleted\""));
    }
}
