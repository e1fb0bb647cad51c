//! Send-and-confirm for one signed transaction.
//!
//! # Flow
//! ```text
//! submit(raw)
//!     → send once (preflight skipped)
//!     → spawn resend loop (same bytes every resend_interval)
//!     → ConfirmationTracker::await_confirmation
//!     → cancel resend loop
//!     → on TimedOut: Simulator for a diagnostic
//! ```
//!
//! Resending byte-identical transactions is safe: the ledger's replay
//! protection drops duplicates.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::clock::Deadline;
use crate::config::SubmissionConfig;
use crate::ledger::client::LedgerClient;
use crate::ledger::types::{CommitmentLevel, LedgerError, LedgerResult, SendOptions, TxId};
use crate::observability::{Detection, EventSink, TxEvent};
use crate::submission::outcome::{
    Confirmation, SubmissionOutcome, SubmissionReceipt, TimeoutDiagnostic,
};
use crate::submission::simulator::Simulator;
use crate::submission::tracker::ConfirmationTracker;

pub struct Submitter {
    client: Arc<dyn LedgerClient>,
    tracker: ConfirmationTracker,
    simulator: Simulator,
    config: SubmissionConfig,
    sink: Arc<dyn EventSink>,
}

impl Submitter {
    pub fn new(
        client: Arc<dyn LedgerClient>,
        config: SubmissionConfig,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            tracker: ConfirmationTracker::new(client.clone(), config.poll_interval(), sink.clone()),
            simulator: Simulator::new(client.clone()),
            client,
            config,
            sink,
        }
    }

    pub fn config(&self) -> &SubmissionConfig {
        &self.config
    }

    /// Submit raw signed bytes and wait for a definitive outcome.
    ///
    /// Only undecodable input is an error; every ledger-side result is a
    /// `SubmissionOutcome`.
    pub async fn submit(
        &self,
        raw: &[u8],
        timeout: Duration,
        commitment: CommitmentLevel,
    ) -> LedgerResult<SubmissionReceipt> {
        let id = TxId::from_wire(raw)?;
        let raw: Arc<[u8]> = Arc::from(raw);
        let deadline = Deadline::after(timeout);

        match self
            .client
            .send_raw_transaction(&raw, SendOptions::skip_preflight())
            .await
        {
            Ok(_) => self.sink.emit(TxEvent::Sent { id }),
            Err(LedgerError::RpcResponse { code, message }) => {
                let reason = format!("{} (code {})", message, code);
                self.sink.emit(TxEvent::Rejected {
                    id,
                    reason: reason.clone(),
                    detection: Detection::Send,
                });
                return Ok(SubmissionReceipt {
                    id,
                    outcome: SubmissionOutcome::Rejected { reason },
                });
            }
            Err(e) => self.sink.emit(TxEvent::SendFailed {
                id,
                error: e.to_string(),
            }),
        }

        let resend = CancellationToken::new();
        let _stop_resend = resend.clone().drop_guard();
        tokio::spawn(resend_until_cancelled(
            self.client.clone(),
            raw.clone(),
            id,
            self.config.resend_interval(),
            deadline,
            resend.clone(),
            self.sink.clone(),
        ));

        let confirmation = self
            .tracker
            .await_confirmation(&id, deadline.remaining(), commitment)
            .await;
        resend.cancel();

        let outcome = match confirmation {
            Confirmation::Committed { slot } => SubmissionOutcome::Committed { slot },
            Confirmation::Rejected { reason } => SubmissionOutcome::Rejected { reason },
            Confirmation::TimedOut => SubmissionOutcome::TimedOut {
                diagnostic: self.diagnose(&id, &raw, commitment).await,
            },
        };
        Ok(SubmissionReceipt { id, outcome })
    }

    async fn diagnose(
        &self,
        id: &TxId,
        raw: &[u8],
        commitment: CommitmentLevel,
    ) -> TimeoutDiagnostic {
        if !self.config.simulate_on_timeout {
            return TimeoutDiagnostic::NotSimulated;
        }

        match self.simulator.simulate(raw, commitment).await {
            Ok(Some(message)) => {
                self.sink.emit(TxEvent::SimulatedError {
                    id: *id,
                    message: message.clone(),
                });
                TimeoutDiagnostic::ProgramError(message)
            }
            Ok(None) => TimeoutDiagnostic::Clean,
            Err(e) => {
                self.sink.emit(TxEvent::SimulationInconclusive {
                    id: *id,
                    error: e.to_string(),
                });
                TimeoutDiagnostic::Inconclusive(e.to_string())
            }
        }
    }
}

async fn resend_until_cancelled(
    client: Arc<dyn LedgerClient>,
    raw: Arc<[u8]>,
    id: TxId,
    interval: Duration,
    deadline: Deadline,
    cancel: CancellationToken,
    sink: Arc<dyn EventSink>,
) {
    let mut attempt = 0u32;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = sleep(interval) => {}
        }
        if cancel.is_cancelled() || deadline.is_expired() {
            return;
        }

        attempt += 1;
        match client
            .send_raw_transaction(&raw, SendOptions::skip_preflight())
            .await
        {
            Ok(_) => sink.emit(TxEvent::Resent { id, attempt }),
            Err(e) => sink.emit(TxEvent::ResendFailed {
                id,
                attempt,
                error: e.to_string(),
            }),
        }
    }
}
