//! Terminal results of tracking and submitting one transaction.

use serde::Serialize;

use crate::ledger::types::{LedgerError, LedgerResult, TxId};

/// What the confirmation tracker decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    Committed { slot: u64 },
    Rejected { reason: String },
    TimedOut,
}

/// Extra context gathered by simulating a transaction that timed out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum TimeoutDiagnostic {
    /// Simulation disabled.
    NotSimulated,
    /// Simulation ran and reported no error.
    Clean,
    /// Program error extracted from simulation logs or the raw error.
    ProgramError(String),
    /// Simulation itself could not be executed.
    Inconclusive(String),
}

/// Lifecycle result of one transaction. Never revised once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Committed { slot: u64 },
    Rejected { reason: String },
    /// The transaction may still land; retrying is the caller's decision.
    TimedOut { diagnostic: TimeoutDiagnostic },
}

impl SubmissionOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, SubmissionOutcome::Committed { .. })
    }

    pub fn slot(&self) -> Option<u64> {
        match self {
            SubmissionOutcome::Committed { slot } => Some(*slot),
            _ => None,
        }
    }

    pub fn into_result(self) -> LedgerResult<u64> {
        match self {
            SubmissionOutcome::Committed { slot } => Ok(slot),
            SubmissionOutcome::Rejected { reason } => Err(LedgerError::LedgerRejected(reason)),
            SubmissionOutcome::TimedOut { .. } => Err(LedgerError::TimedOut),
        }
    }
}

/// A transaction id paired with its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionReceipt {
    pub id: TxId,
    #[serde(flatten)]
    pub outcome: SubmissionOutcome,
}
