//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ledger_tx_committed_total` (counter): commits by detection channel
//! - `ledger_tx_rejected_total` (counter): rejections by detection channel
//! - `ledger_tx_timed_out_total` (counter): confirmation timeouts
//! - `ledger_tx_resends_total` (counter): resends of signed bytes
//! - `ledger_status_query_errors_total` (counter): transient poll failures
//! - `ledger_tx_confirmation_seconds` (histogram): submit-to-commit latency
//! - `ledger_batch_transactions_total` (counter): transactions issued by batches
//! - `ledger_batch_committed_total` (counter): batch transactions that committed

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

use crate::observability::events::Detection;

/// Install the Prometheus exporter listening on `addr`. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_committed(detection: Detection, elapsed: Duration) {
    counter!("ledger_tx_committed_total", "via" => detection.as_str()).increment(1);
    histogram!("ledger_tx_confirmation_seconds").record(elapsed.as_secs_f64());
}

pub fn record_rejected(detection: Detection) {
    counter!("ledger_tx_rejected_total", "via" => detection.as_str()).increment(1);
}

pub fn record_timed_out() {
    counter!("ledger_tx_timed_out_total").increment(1);
}

pub fn record_resend() {
    counter!("ledger_tx_resends_total").increment(1);
}

pub fn record_transient_query_error() {
    counter!("ledger_status_query_errors_total").increment(1);
}

pub fn record_batch(issued: usize, committed: usize) {
    counter!("ledger_batch_transactions_total").increment(issued as u64);
    counter!("ledger_batch_committed_total").increment(committed as u64);
}
