//! Prometheus exporter for the diagnostic surface. The `/metrics` route is
//! only mounted when `APP_TUNING` is set; the recorder itself is cheap and
//! installed unconditionally at startup.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

pub fn init_metrics() {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = PROMETHEUS_HANDLE.set(handle);

            // Initialize the main series with zero values.
            counter!("typoscout_lookup_total", "query_type" => "unknown").absolute(0);
            counter!("typoscout_bulk_results_total", "bucket" => "taken").absolute(0);
            counter!("typoscout_bulk_results_total", "bucket" => "free").absolute(0);
            counter!("typoscout_bulk_results_total", "bucket" => "error").absolute(0);
            histogram!("typoscout_lookup_duration_seconds").record(0.0);
        }
        Err(err) => {
            eprintln!("Failed to install metrics recorder: {err}");
        }
    }
}

pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Metrics not initialized".to_string(),
        ),
    }
}
