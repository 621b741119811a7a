//! Prometheus metrics for collection runs
//!
//! Counters are emitted through the `metrics` facade and are no-ops until
//! [`init_metrics`] installs the Prometheus exporter, so library users pay
//! nothing unless they opt in.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, info};

static METRICS_INITIALIZED: OnceCell<SocketAddr> = OnceCell::new();

/// Install the Prometheus exporter on `addr`
///
/// Must be called from within a tokio runtime. Idempotent: later calls are
/// ignored once an exporter is installed.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    if let Some(existing) = METRICS_INITIALIZED.get() {
        debug!(%existing, "Metrics already initialized, skipping");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "fac_requests_total",
        Unit::Count,
        "HTTP requests issued to the FAC API, by endpoint and status"
    );
    describe_counter!(
        "fac_rate_limited_total",
        Unit::Count,
        "HTTP 429 responses received"
    );
    describe_histogram!(
        "fac_rate_limit_wait_seconds",
        Unit::Seconds,
        "Server-requested waits honoured after HTTP 429"
    );
    describe_counter!(
        "fac_batch_retries_total",
        Unit::Count,
        "Batch attempts retried after a network failure"
    );
    describe_counter!(
        "fac_batches_failed_total",
        Unit::Count,
        "Batches recorded as failed"
    );
    describe_counter!(
        "fac_partitions_failed_total",
        Unit::Count,
        "Year/jurisdiction partitions skipped after an error"
    );

    let _ = METRICS_INITIALIZED.set(addr);
    info!(%addr, "Metrics exporter listening");
    Ok(())
}

/// Count one completed HTTP exchange (`status` is a code or `network_error`)
pub fn record_request(endpoint: &str, status: &str) {
    counter!(
        "fac_requests_total",
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Count a 429 and the wait that will be honoured, if any
pub fn record_rate_limited(endpoint: &str, wait: Option<Duration>) {
    counter!("fac_rate_limited_total", "endpoint" => endpoint.to_string()).increment(1);
    if let Some(wait) = wait {
        histogram!("fac_rate_limit_wait_seconds").record(wait.as_secs_f64());
    }
}

/// Count a batch retry
pub fn record_batch_retry(attempt: u32) {
    counter!("fac_batch_retries_total", "attempt" => attempt.to_string()).increment(1);
}

/// Count a batch given up on
pub fn record_batch_failed() {
    counter!("fac_batches_failed_total").increment(1);
}

/// Count a skipped sweep partition
pub fn record_partition_failed() {
    counter!("fac_partitions_failed_total").increment(1);
}
