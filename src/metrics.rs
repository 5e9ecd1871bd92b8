use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics exporter
///
/// Installs the global recorder, so this can only succeed once per process.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    init_metric_descriptions();

    Ok(handle)
}

/// Initialize metric descriptions (can be called multiple times safely)
fn init_metric_descriptions() {
    describe_counter!(
        "log_viewer_calls_total",
        "Total number of calls run through the call logger"
    );
    describe_histogram!(
        "log_viewer_call_duration_seconds",
        "Call duration in seconds"
    );
    describe_counter!(
        "log_viewer_swept_events_total",
        "Total number of events removed by the retention sweep"
    );
    describe_gauge!(
        "log_viewer_store_size_kb",
        "Log store size measured before the last sweep"
    );
    describe_gauge!(
        "log_viewer_info",
        "Log viewer version information"
    );

    gauge!("log_viewer_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Record a finished call
///
/// `outcome` is one of "ok", "error", "panic", "cancelled", "store_error".
pub fn record_call(endpoint: &str, outcome: &'static str, duration: Duration) {
    counter!(
        "log_viewer_calls_total",
        "endpoint" => endpoint.to_string(),
        "outcome" => outcome,
    )
    .increment(1);

    histogram!(
        "log_viewer_call_duration_seconds",
        "endpoint" => endpoint.to_string(),
    )
    .record(duration.as_secs_f64());
}

/// Record a completed retention sweep
pub fn record_sweep(removed: u64, size_kb: u64) {
    counter!("log_viewer_swept_events_total").increment(removed);
    gauge!("log_viewer_store_size_kb").set(size_kb as f64);
}
