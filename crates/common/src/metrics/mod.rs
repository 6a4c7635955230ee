//! Metrics and observability utilities
//!
//! Prometheus-style metrics for the query path, embeddings and ingestion.
//! Without an installed recorder (e.g. the ingestion CLI) these are no-ops.

use metrics::{counter, describe_counter, describe_histogram, gauge, describe_gauge, histogram, Unit};

/// Metrics prefix for all Prism metrics
pub const METRICS_PREFIX: &str = "prism";

/// Histogram buckets for query latency (in seconds)
///
/// A query spans embedding, search and VLM generation, so the tail is long.
pub const LATENCY_BUCKETS: &[f64] = &[
    0.010,  // 10ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 1m
    120.0,  // 2m
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Query metrics
    describe_counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of RAG queries"
    );

    describe_histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end RAG query latency in seconds"
    );

    describe_gauge!(
        format!("{}_retrieval_results_count", METRICS_PREFIX),
        Unit::Count,
        "Number of chunks returned by the last retrieval"
    );

    // Embedding metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    describe_counter!(
        format!("{}_embedding_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding errors"
    );

    // Ingestion metrics
    describe_counter!(
        format!("{}_files_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Total files ingested"
    );

    describe_counter!(
        format!("{}_files_failed_total", METRICS_PREFIX),
        Unit::Count,
        "Total files that failed ingestion"
    );

    describe_counter!(
        format!("{}_chunks_stored_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks written to the vector store"
    );

    describe_histogram!(
        format!("{}_ingestion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Per-file ingestion latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record query metrics
pub fn record_query(duration_secs: f64, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        "status" => status
    )
    .increment(1);

    histogram!(format!("{}_query_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

/// Helper to record retrieval result counts per modality
pub fn record_retrieval(text_count: usize, image_count: usize) {
    gauge!(
        format!("{}_retrieval_results_count", METRICS_PREFIX),
        "modality" => "text"
    )
    .set(text_count as f64);

    gauge!(
        format!("{}_retrieval_results_count", METRICS_PREFIX),
        "modality" => "image"
    )
    .set(image_count as f64);
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, modality: &'static str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "modality" => modality,
        "status" => status
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string(),
            "modality" => modality
        )
        .record(duration_secs);
    } else {
        counter!(
            format!("{}_embedding_errors_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(1);
    }
}

/// Helper to record ingestion of one file
pub fn record_ingestion(duration_secs: f64, chunks_stored: usize, file_kind: &'static str) {
    counter!(
        format!("{}_files_ingested_total", METRICS_PREFIX),
        "kind" => file_kind
    )
    .increment(1);

    counter!(
        format!("{}_chunks_stored_total", METRICS_PREFIX),
        "kind" => file_kind
    )
    .increment(chunks_stored as u64);

    histogram!(
        format!("{}_ingestion_duration_seconds", METRICS_PREFIX),
        "kind" => file_kind
    )
    .record(duration_secs);
}

/// Helper to record a failed file
pub fn record_ingestion_failure(file_kind: &'static str) {
    counter!(
        format!("{}_files_failed_total", METRICS_PREFIX),
        "kind" => file_kind
    )
    .increment(1);
}
