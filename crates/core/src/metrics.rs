//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Job controller (submissions, outcomes, durations)
//! - Destination staging (bytes copied, rollbacks)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Controller Metrics
// =============================================================================

/// Jobs accepted by the controller.
pub static JOBS_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("squeezer_jobs_submitted_total", "Total jobs submitted").unwrap()
});

/// Submissions rejected because a job was already active.
pub static JOBS_REJECTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "squeezer_jobs_rejected_total",
        "Total submissions rejected while a job was active",
    )
    .unwrap()
});

/// Jobs finished by outcome.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("squeezer_jobs_finished_total", "Total jobs finished"),
        &["outcome"], // "succeeded", "failed", "cancelled"
    )
    .unwrap()
});

/// Job duration in seconds, from submit to terminal state.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("squeezer_job_duration_seconds", "Duration of compression jobs")
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &["outcome"],
    )
    .unwrap()
});

// =============================================================================
// Staging Metrics
// =============================================================================

/// Bytes copied into staged records.
pub static BYTES_STAGED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "squeezer_bytes_staged_total",
        "Total bytes copied into staged media records",
    )
    .unwrap()
});

/// Destination rollbacks by result.
pub static ROLLBACKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("squeezer_rollbacks_total", "Total destination rollbacks"),
        &["storage", "result"], // result: "deleted", "absent", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Controller
        Box::new(JOBS_SUBMITTED.clone()),
        Box::new(JOBS_REJECTED.clone()),
        Box::new(JOBS_FINISHED.clone()),
        Box::new(JOB_DURATION.clone()),
        // Staging
        Box::new(BYTES_STAGED.clone()),
        Box::new(ROLLBACKS.clone()),
    ]
}
