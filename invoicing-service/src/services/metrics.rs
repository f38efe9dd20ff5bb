//! Prometheus metrics for invoicing-service.
//!
//! Domain counters live in the default `prometheus` registry. HTTP request
//! metrics are recorded through the `metrics` facade by the shared middleware
//! and rendered from the exporter handle.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    HistogramVec, TextEncoder,
};
use std::sync::OnceLock;
use tracing::warn;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Invoice lifecycle counter.
pub static INVOICES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_invoices_total",
        "Total number of invoice lifecycle events",
        &["event"] // created, updated, deleted, paid
    )
    .expect("Failed to register invoices_total")
});

/// Sum of all recorded payment amounts.
pub static PAYMENT_AMOUNT_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "invoicing_payment_amount_total",
        "Total amount recorded by payment transactions"
    )
    .expect("Failed to register payment_amount_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "invoicing_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Install the HTTP metrics recorder and force the domain metrics.
///
/// Safe to call more than once; only the first call installs a recorder.
pub fn init_metrics() {
    METRICS_HANDLE.get_or_init(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => handle,
        Err(e) => {
            warn!(error = %e, "Prometheus recorder already installed, using detached handle");
            PrometheusBuilder::new().build_recorder().handle()
        }
    });

    Lazy::force(&INVOICES_TOTAL);
    Lazy::force(&PAYMENT_AMOUNT_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    output.push_str(
        &encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default(),
    );
    output
}
