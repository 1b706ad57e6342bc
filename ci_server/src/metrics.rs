//! Prometheus metrics for the deploy console.

use metrics::{counter, gauge};

/// Install the Prometheus exporter (default listener, port 9000).
pub fn init_metrics() {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    if let Err(e) = builder.install() {
        tracing::warn!("Failed to install Prometheus exporter: {}", e);
    }
}

pub fn webhook_received(source: &str) {
    counter!("deploy_webhooks_received_total", "source" => source.to_string()).increment(1);
}

/// A job definition was created; `kind` is `deploy` or `scan`.
pub fn job_created(kind: &'static str) {
    counter!("deploy_jobs_created_total", "kind" => kind).increment(1);
}

pub fn build_triggered() {
    counter!("deploy_builds_triggered_total").increment(1);
}

pub fn log_session_opened() {
    gauge!("deploy_log_sessions_active").increment(1.0);
}

pub fn log_session_closed() {
    gauge!("deploy_log_sessions_active").decrement(1.0);
}

pub fn upstream_failure(operation: &'static str) {
    counter!("deploy_upstream_failures_total", "operation" => operation).increment(1);
}
