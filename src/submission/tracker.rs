//! Confirmation tracking for a single transaction id.
//!
//! # State Machine
//! ```text
//! push:    subscribe error    → keep waiting (poll and timeout decide)
//!          notification(err)  → Rejected
//!          notification(ok)   → Committed{slot}
//! poll:    no status          → keep polling
//!          status with err    → Rejected
//!          no confirmations   → keep polling
//!          confirmations      → Committed{slot}
//!          query error        → keep polling
//! timeout: deadline reached   → TimedOut
//! ```
//!
//! All three branches start together. Subscribing is part of the push
//! branch, so a slow websocket never holds back polling or the deadline.
//! The first branch to finish decides; the others are dropped. On a tie
//! push wins over poll and both win over the deadline. A listener that was
//! acknowledged is removed after the race no matter which branch won.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};

use crate::ledger::client::LedgerClient;
use crate::ledger::types::{CommitmentLevel, SignatureNotification, SubscriptionId, TxId};
use crate::observability::{Detection, EventSink, TxEvent};
use crate::submission::outcome::Confirmation;

pub struct ConfirmationTracker {
    client: Arc<dyn LedgerClient>,
    poll_interval: Duration,
    sink: Arc<dyn EventSink>,
}

impl ConfirmationTracker {
    pub fn new(
        client: Arc<dyn LedgerClient>,
        poll_interval: Duration,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            client,
            poll_interval,
            sink,
        }
    }

    /// Wait until `id` is committed or rejected, or `timeout` elapses.
    pub async fn await_confirmation(
        &self,
        id: &TxId,
        timeout: Duration,
        commitment: CommitmentLevel,
    ) -> Confirmation {
        let started = Instant::now();
        let deadline = started + timeout;

        let mut handle = None;
        let resolved = tokio::select! {
            biased;
            resolved = self.push_branch(id, commitment, &mut handle) => Some(resolved),
            resolved = self.poll_branch(id) => Some(resolved),
            _ = sleep_until(deadline) => None,
        };

        if let Some(handle) = handle {
            if let Err(e) = self.client.remove_signature_listener(handle).await {
                self.sink.emit(TxEvent::UnsubscribeFailed {
                    id: *id,
                    error: e.to_string(),
                });
            }
        }

        match resolved {
            Some((confirmation, detection)) => {
                match &confirmation {
                    Confirmation::Committed { slot } => self.sink.emit(TxEvent::Committed {
                        id: *id,
                        slot: *slot,
                        detection,
                        elapsed: started.elapsed(),
                    }),
                    Confirmation::Rejected { reason } => self.sink.emit(TxEvent::Rejected {
                        id: *id,
                        reason: reason.clone(),
                        detection,
                    }),
                    Confirmation::TimedOut => {}
                }
                confirmation
            }
            None => {
                self.sink.emit(TxEvent::TimedOut {
                    id: *id,
                    elapsed: started.elapsed(),
                });
                Confirmation::TimedOut
            }
        }
    }

    async fn poll_branch(&self, id: &TxId) -> (Confirmation, Detection) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let statuses = match self
                .client
                .get_signature_statuses(std::slice::from_ref(id))
                .await
            {
                Ok(statuses) => statuses,
                Err(e) => {
                    self.sink.emit(TxEvent::TransientQueryError {
                        id: *id,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let Some(status) = statuses.into_iter().next().flatten() else {
                self.sink.emit(TxEvent::StatusPending { id: *id });
                continue;
            };

            if let Some(err) = status.err {
                return (
                    Confirmation::Rejected {
                        reason: err.to_string(),
                    },
                    Detection::Poll,
                );
            }
            if status.is_committed() {
                return (Confirmation::Committed { slot: status.slot }, Detection::Poll);
            }
            self.sink.emit(TxEvent::AwaitingConfirmations {
                id: *id,
                slot: status.slot,
            });
        }
    }

    /// Subscribe, then wait for the notification. The subscription id is
    /// written to `handle` as soon as the node acknowledges it.
    async fn push_branch(
        &self,
        id: &TxId,
        commitment: CommitmentLevel,
        handle: &mut Option<SubscriptionId>,
    ) -> (Confirmation, Detection) {
        let notification = match self.client.subscribe_signature(id, commitment).await {
            Ok(subscription) => {
                *handle = Some(subscription.id);
                subscription.notification
            }
            Err(e) => {
                self.sink.emit(TxEvent::SubscriptionFailed {
                    id: *id,
                    error: e.to_string(),
                });
                return std::future::pending().await;
            }
        };

        match notification.await {
            Ok(SignatureNotification { err: Some(err), .. }) => (
                Confirmation::Rejected {
                    reason: err.to_string(),
                },
                Detection::Push,
            ),
            Ok(SignatureNotification { slot, err: None }) => {
                (Confirmation::Committed { slot }, Detection::Push)
            }
            // Listener dropped (connection lost); poll and timeout still decide.
            Err(_) => std::future::pending().await,
        }
    }
}
