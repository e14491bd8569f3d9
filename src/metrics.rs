//! Metrics collection for the gateway
//!
//! Counters are plain atomics so request handlers never contend on a lock.
//! [`format_prometheus_metrics`] renders a snapshot in the Prometheus text
//! exposition format for the `/metrics` route.

use crate::error::ErrorKind;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const KIND_COUNT: usize = ErrorKind::ALL.len();

/// Metrics collector for the gateway
///
/// All operations are thread-safe using atomic operations.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    total_requests: AtomicU64,
    successful_transfers: AtomicU64,
    failures: [AtomicU64; KIND_COUNT],
    bytes_to_client: AtomicU64,
    total_request_duration_us: AtomicU64,
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_transfers: u64,
    pub failures: Vec<(ErrorKind, u64)>,
    pub bytes_to_client: u64,
    pub total_request_duration_us: u64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an inbound request on a media route
    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed transfer and its size
    pub fn record_success(&self, bytes: u64, request_duration: Duration) {
        self.successful_transfers.fetch_add(1, Ordering::Relaxed);
        self.bytes_to_client.fetch_add(bytes, Ordering::Relaxed);
        self.total_request_duration_us
            .fetch_add(request_duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record a rejected or failed request
    pub fn record_failure(&self, kind: ErrorKind) {
        self.failures[kind.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Failures recorded for one kind
    pub fn failures_of(&self, kind: ErrorKind) -> u64 {
        self.failures[kind.index()].load(Ordering::Relaxed)
    }

    /// Get a snapshot of current metrics
    ///
    /// Fields are read independently, so a snapshot taken under load may be
    /// slightly inconsistent across counters.
    pub fn get_stats(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_transfers: self.successful_transfers.load(Ordering::Relaxed),
            failures: ErrorKind::ALL
                .iter()
                .map(|kind| (*kind, self.failures_of(*kind)))
                .collect(),
            bytes_to_client: self.bytes_to_client.load(Ordering::Relaxed),
            total_request_duration_us: self.total_request_duration_us.load(Ordering::Relaxed),
        }
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.successful_transfers.store(0, Ordering::Relaxed);
        for counter in &self.failures {
            counter.store(0, Ordering::Relaxed);
        }
        self.bytes_to_client.store(0, Ordering::Relaxed);
        self.total_request_duration_us.store(0, Ordering::Relaxed);
    }
}

impl MetricsSnapshot {
    pub fn total_failures(&self) -> u64 {
        self.failures.iter().map(|(_, n)| n).sum()
    }

    /// Average end-to-end duration of successful media requests
    pub fn avg_request_duration_ms(&self) -> f64 {
        if self.successful_transfers == 0 {
            0.0
        } else {
            (self.total_request_duration_us as f64 / self.successful_transfers as f64) / 1000.0
        }
    }
}

/// Format metrics in Prometheus exposition format
pub fn format_prometheus_metrics(snapshot: &MetricsSnapshot) -> String {
    let mut output = String::new();

    output.push_str("# HELP media_gate_requests_total Total number of media requests received\n");
    output.push_str("# TYPE media_gate_requests_total counter\n");
    output.push_str(&format!("media_gate_requests_total {}\n\n", snapshot.total_requests));

    output.push_str("# HELP media_gate_transfers_total Number of media payloads delivered\n");
    output.push_str("# TYPE media_gate_transfers_total counter\n");
    output.push_str(&format!("media_gate_transfers_total {}\n\n", snapshot.successful_transfers));

    output.push_str("# HELP media_gate_failures_total Number of failed requests by kind\n");
    output.push_str("# TYPE media_gate_failures_total counter\n");
    for (kind, count) in &snapshot.failures {
        output.push_str(&format!(
            "media_gate_failures_total{{kind=\"{}\"}} {}\n",
            kind.as_str(),
            count
        ));
    }
    output.push('\n');

    output.push_str("# HELP media_gate_bytes_to_client_total Total bytes sent to clients\n");
    output.push_str("# TYPE media_gate_bytes_to_client_total counter\n");
    output.push_str(&format!("media_gate_bytes_to_client_total {}\n\n", snapshot.bytes_to_client));

    output.push_str("# HELP media_gate_request_duration_ms_avg Average duration of successful media requests in milliseconds\n");
    output.push_str("# TYPE media_gate_request_duration_ms_avg gauge\n");
    output.push_str(&format!(
        "media_gate_request_duration_ms_avg {:.2}\n",
        snapshot.avg_request_duration_ms()
    ));

    output
}
