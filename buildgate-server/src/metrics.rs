//! Prometheus metrics for the gate

use buildgate_core::Disposition;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::net::SocketAddr;

/// Initialize all metric descriptions
pub fn init_metrics() {
    describe_counter!("buildgate_requests_total", "Total number of validated build requests by outcome");
    describe_counter!("buildgate_rejections_total", "Total number of requests rejected before a decision");
    describe_histogram!("buildgate_decision_latency_seconds", "Time from request to decision in seconds");
    describe_gauge!("buildgate_policy_entries", "Number of authors in the policy table");
}

/// Metric label for a disposition
pub fn outcome_label(disposition: Disposition) -> &'static str {
    match disposition {
        Disposition::AutoBuild => "auto_build",
        Disposition::NoBuild => "no_build",
        Disposition::SkipBuild => "skip_build",
        Disposition::ManualBuild => "manual_build",
    }
}

/// Record a policy decision
pub fn record_decision(disposition: Disposition, latency_seconds: f64) {
    counter!("buildgate_requests_total", 1, "outcome" => outcome_label(disposition));
    histogram!("buildgate_decision_latency_seconds", latency_seconds);
}

/// Record a request rejected by a gate
pub fn record_rejection(reason: &'static str) {
    counter!("buildgate_requests_total", 1, "outcome" => "rejected");
    counter!("buildgate_rejections_total", 1, "reason" => reason);
}

/// Publish the policy table size
pub fn set_policy_entries(count: usize) {
    gauge!("buildgate_policy_entries", count as f64);
}

/// Install the Prometheus recorder with its own HTTP listener
///
/// Must be called from within a tokio runtime.
pub fn init_prometheus(address: SocketAddr) -> anyhow::Result<()> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(address)
        .install()?;
    Ok(())
}
