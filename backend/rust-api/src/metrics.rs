use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder, HistogramVec,
    IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Pipeline Metrics
    //
    // Stages shell out to external systems and run for seconds to minutes,
    // hence the wide buckets.
    pub static ref PIPELINE_STAGES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "pipeline_stages_total",
        "Total number of quiz pipeline stage executions",
        &["stage", "status"]
    )
    .unwrap();

    pub static ref PIPELINE_STAGE_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "pipeline_stage_duration_seconds",
        "Quiz pipeline stage duration in seconds",
        &["stage"],
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
    )
    .unwrap();

    // Business Metrics
    pub static ref QUIZZES_GENERATED_TOTAL: IntCounter = register_int_counter!(
        "quizzes_generated_total",
        "Total number of quizzes generated and persisted"
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: run one pipeline stage with counting and timing
pub async fn track_pipeline_stage<F, T, E>(stage: &str, future: F) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    PIPELINE_STAGES_TOTAL
        .with_label_values(&[stage, status])
        .inc();

    PIPELINE_STAGE_DURATION_SECONDS
        .with_label_values(&[stage])
        .observe(duration);

    result
}
