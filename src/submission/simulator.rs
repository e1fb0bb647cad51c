//! Dry-run diagnostics for transactions whose fate is unknown.

use std::sync::Arc;

use crate::ledger::client::LedgerClient;
use crate::ledger::types::{CommitmentLevel, LedgerError, LedgerResult, SimulationResult};

/// Prefix the runtime puts on messages emitted by programs.
pub const PROGRAM_LOG_MARKER: &str = "Program log: ";

pub struct Simulator {
    client: Arc<dyn LedgerClient>,
}

impl Simulator {
    pub fn new(client: Arc<dyn LedgerClient>) -> Self {
        Self { client }
    }

    /// Simulate raw signed bytes against current state.
    ///
    /// `Ok(None)` means the simulation succeeded. A failure to run the
    /// simulation at all is reported as `SimulationInconclusive`.
    pub async fn simulate(
        &self,
        raw: &[u8],
        commitment: CommitmentLevel,
    ) -> LedgerResult<Option<String>> {
        let result = self
            .client
            .simulate_transaction(raw, commitment)
            .await
            .map_err(|e| LedgerError::SimulationInconclusive(e.to_string()))?;
        Ok(program_error(&result))
    }
}

/// The most specific error message in a failed simulation.
///
/// The last program log line is the closest to the failure, so logs are
/// scanned backwards. Without a matching line the raw error is returned.
pub fn program_error(result: &SimulationResult) -> Option<String> {
    let err = result.err.as_ref()?;
    let logged = result
        .logs
        .iter()
        .flatten()
        .rev()
        .find_map(|line| line.strip_prefix(PROGRAM_LOG_MARKER));

    Some(match logged {
        Some(message) => message.to_string(),
        None => err.to_string(),
    })
}
