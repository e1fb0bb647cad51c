//! Structured transaction lifecycle events.
//!
//! Components receive an `Arc<dyn EventSink>` and report what happens to each
//! transaction through it. `TracingSink` is the production sink: it renders
//! every event as a `tracing` event and updates the `ledger_*` metrics.

use std::fmt;
use std::time::Duration;

use crate::batch::ExecutionPolicy;
use crate::ledger::types::TxId;
use crate::observability::metrics;

/// Where a transaction's fate was learned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Detection {
    /// Node answered the initial send with an error.
    Send,
    /// Push subscription notification.
    Push,
    /// Status poll.
    Poll,
}

impl Detection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Detection::Send => "send",
            Detection::Push => "push",
            Detection::Poll => "poll",
        }
    }
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TxEvent {
    Sent { id: TxId },
    /// Initial send failed in transport; treated like a dropped packet.
    SendFailed { id: TxId, error: String },
    Resent { id: TxId, attempt: u32 },
    ResendFailed { id: TxId, attempt: u32, error: String },
    SubscriptionFailed { id: TxId, error: String },
    UnsubscribeFailed { id: TxId, error: String },
    StatusPending { id: TxId },
    AwaitingConfirmations { id: TxId, slot: u64 },
    TransientQueryError { id: TxId, error: String },
    Committed { id: TxId, slot: u64, detection: Detection, elapsed: Duration },
    Rejected { id: TxId, reason: String, detection: Detection },
    TimedOut { id: TxId, elapsed: Duration },
    SimulatedError { id: TxId, message: String },
    SimulationInconclusive { id: TxId, error: String },
    BatchStarted { transactions: usize, policy: ExecutionPolicy },
    BatchHalted { index: usize, issued: usize },
    BatchFinished { issued: usize, committed: usize },
}

/// Receiver of lifecycle events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: TxEvent);
}

/// Renders events through `tracing` and records metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: TxEvent) {
        match event {
            TxEvent::Sent { id } => tracing::debug!(tx = %id, "Transaction sent"),
            TxEvent::SendFailed { id, error } => {
                tracing::warn!(tx = %id, error = %error, "Initial send failed, relying on resend")
            }
            TxEvent::Resent { id, attempt } => {
                metrics::record_resend();
                tracing::trace!(tx = %id, attempt, "Transaction resent")
            }
            TxEvent::ResendFailed { id, attempt, error } => {
                tracing::debug!(tx = %id, attempt, error = %error, "Resend failed")
            }
            TxEvent::SubscriptionFailed { id, error } => {
                tracing::warn!(tx = %id, error = %error, "Signature subscription failed, polling only")
            }
            TxEvent::UnsubscribeFailed { id, error } => {
                tracing::warn!(tx = %id, error = %error, "Failed to remove signature listener")
            }
            TxEvent::StatusPending { id } => {
                tracing::debug!(tx = %id, "No status for transaction yet")
            }
            TxEvent::AwaitingConfirmations { id, slot } => {
                tracing::debug!(tx = %id, slot, "Transaction processed, awaiting confirmations")
            }
            TxEvent::TransientQueryError { id, error } => {
                metrics::record_transient_query_error();
                tracing::debug!(tx = %id, error = %error, "Status query failed, retrying next tick")
            }
            TxEvent::Committed { id, slot, detection, elapsed } => {
                metrics::record_committed(detection, elapsed);
                tracing::info!(
                    tx = %id,
                    slot,
                    via = %detection,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Transaction committed"
                )
            }
            TxEvent::Rejected { id, reason, detection } => {
                metrics::record_rejected(detection);
                tracing::warn!(tx = %id, via = %detection, reason = %reason, "Transaction rejected")
            }
            TxEvent::TimedOut { id, elapsed } => {
                metrics::record_timed_out();
                tracing::warn!(
                    tx = %id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Timed out awaiting confirmation"
                )
            }
            TxEvent::SimulatedError { id, message } => {
                tracing::warn!(tx = %id, message = %message, "Simulation reports program error")
            }
            TxEvent::SimulationInconclusive { id, error } => {
                tracing::warn!(tx = %id, error = %error, "Simulation inconclusive")
            }
            TxEvent::BatchStarted { transactions, policy } => {
                tracing::info!(transactions, policy = %policy, "Batch started")
            }
            TxEvent::BatchHalted { index, issued } => {
                tracing::warn!(index, issued, "Batch halted on failure")
            }
            TxEvent::BatchFinished { issued, committed } => {
                metrics::record_batch(issued, committed);
                tracing::info!(issued, committed, "Batch finished")
            }
        }
    }
}
