//! Metrics module
//!
//! Prometheus counters and histograms for object operations, registered in the
//! default registry. [`render`] produces the text exposition format.

use crate::upload::{ApiKind, HitOutcome};
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "ufile_uploads_total",
        "Total number of uploads",
        &["bucket", "status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "ufile_upload_bytes_total",
        "Total bytes uploaded"
    ).unwrap();

    pub static ref OPERATION_DURATION: HistogramVec = register_histogram_vec!(
        "ufile_operation_duration_seconds",
        "Object operation duration in seconds",
        &["bucket", "operation"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 60.0]
    ).unwrap();

    // Dedup metrics
    pub static ref UPLOAD_HIT_TOTAL: CounterVec = register_counter_vec!(
        "ufile_upload_hit_total",
        "Upload-hit lookups by outcome",
        &["bucket", "outcome"]  // "hit" or "miss"
    ).unwrap();

    // Error metrics
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "ufile_errors_total",
        "Total errors",
        &["operation", "type"]
    ).unwrap();
}

/// Record a successful upload
pub fn record_upload_success(bucket: &str, bytes: u64) {
    UPLOADS_TOTAL.with_label_values(&[bucket, "success"]).inc();
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a failed upload
pub fn record_upload_failure(bucket: &str) {
    UPLOADS_TOTAL.with_label_values(&[bucket, "failure"]).inc();
}

/// Record an upload that was satisfied by the store's existing copy
pub fn record_upload_deduplicated(bucket: &str) {
    UPLOADS_TOTAL.with_label_values(&[bucket, "deduplicated"]).inc();
}

pub fn record_operation_duration(bucket: &str, kind: ApiKind, duration_secs: f64) {
    OPERATION_DURATION
        .with_label_values(&[bucket, kind.as_str()])
        .observe(duration_secs);
}

pub fn record_upload_hit(bucket: &str, outcome: HitOutcome) {
    let label = match outcome {
        HitOutcome::Hit => "hit",
        HitOutcome::Miss => "miss",
    };
    UPLOAD_HIT_TOTAL.with_label_values(&[bucket, label]).inc();
}

/// Record an error
pub fn record_error(kind: ApiKind, error_type: &str) {
    ERRORS_TOTAL
        .with_label_values(&[kind.as_str(), error_type])
        .inc();
}

/// Encode every registered metric in the Prometheus text format
pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
