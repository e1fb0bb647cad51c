//! Batch sequencing: build, sign and drive many transactions.
//!
//! # Flow
//! ```text
//! instruction groups + co-signer groups
//!     → one shared BlockhashReference
//!     → build per non-empty group (fee payer = wallet), co-sign locally
//!     → before ++ built ++ after
//!     → partition: already fully signed | needs wallet signature
//!     → one batched wallet signing call
//!     → fully signed ++ newly signed
//!     → Submitter per policy
//! ```

use futures_util::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::batch::policy::ExecutionPolicy;
use crate::config::SubmissionConfig;
use crate::ledger::client::LedgerClient;
use crate::ledger::transaction::{Instruction, Keypair, Transaction};
use crate::ledger::types::{
    BlockhashReference, CommitmentLevel, LedgerError, LedgerResult, Pubkey, TxId,
};
use crate::ledger::wallet::WalletSigner;
use crate::observability::{EventSink, TxEvent};
use crate::submission::{SubmissionOutcome, SubmissionReceipt, Submitter};

/// Everything a batch run needs besides the wallet and callbacks.
#[derive(Debug, Default)]
pub struct BatchRequest {
    pub instruction_groups: Vec<Vec<Instruction>>,
    /// Co-signers per instruction group, matched by index.
    pub signer_groups: Vec<Vec<Keypair>>,
    /// Pre-built transactions placed before the built ones.
    pub before: Vec<Transaction>,
    /// Pre-built transactions placed after the built ones.
    pub after: Vec<Transaction>,
    /// Shared blockhash; fetched once when absent.
    pub blockhash: Option<BlockhashReference>,
}

impl BatchRequest {
    pub fn new(instruction_groups: Vec<Vec<Instruction>>, signer_groups: Vec<Vec<Keypair>>) -> Self {
        Self {
            instruction_groups,
            signer_groups,
            ..Default::default()
        }
    }

    pub fn with_before(mut self, before: Vec<Transaction>) -> Self {
        self.before = before;
        self
    }

    pub fn with_after(mut self, after: Vec<Transaction>) -> Self {
        self.after = after;
        self
    }

    pub fn with_blockhash(mut self, blockhash: BlockhashReference) -> Self {
        self.blockhash = Some(blockhash);
        self
    }
}

/// Transactions actually issued and their outcomes, in issue order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceResult {
    pub number: usize,
    pub outcomes: Vec<SubmissionReceipt>,
}

impl SequenceResult {
    pub fn committed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|r| r.outcome.is_committed())
            .count()
    }
}

pub struct BatchSequencer {
    client: Arc<dyn LedgerClient>,
    submitter: Submitter,
    sink: Arc<dyn EventSink>,
}

impl BatchSequencer {
    pub fn new(
        client: Arc<dyn LedgerClient>,
        config: SubmissionConfig,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            submitter: Submitter::new(client.clone(), config, sink.clone()),
            client,
            sink,
        }
    }

    pub fn submitter(&self) -> &Submitter {
        &self.submitter
    }

    /// Build, sign and submit a batch under `policy`.
    ///
    /// `on_success(id, index)` fires on commit and `on_failure(raw, index)` on
    /// any other outcome, for the sequential policies only. The return value of
    /// `on_failure` is reserved and currently ignored.
    pub async fn run<S, F>(
        &self,
        wallet: &dyn WalletSigner,
        request: BatchRequest,
        policy: ExecutionPolicy,
        commitment: CommitmentLevel,
        mut on_success: S,
        mut on_failure: F,
    ) -> LedgerResult<SequenceResult>
    where
        S: FnMut(&TxId, usize),
        F: FnMut(&[u8], usize) -> bool,
    {
        let fee_payer = wallet.public_key().ok_or(LedgerError::NotConnected)?;
        let blockhash = match request.blockhash {
            Some(blockhash) => blockhash,
            None => self.client.get_latest_blockhash(commitment).await?,
        };

        let mut transactions = request.before;
        for (i, instructions) in request.instruction_groups.into_iter().enumerate() {
            if instructions.is_empty() {
                continue;
            }
            let co_signers = request.signer_groups.get(i).map(Vec::as_slice).unwrap_or(&[]);
            transactions.push(build_transaction(instructions, fee_payer, co_signers, &blockhash)?);
        }
        transactions.extend(request.after);

        let signed = sign_pending(wallet, &fee_payer, transactions).await?;
        let prepared = signed
            .iter()
            .map(|tx| -> LedgerResult<(TxId, Vec<u8>)> {
                let raw = tx.serialize()?;
                Ok((TxId::from_wire(&raw)?, raw))
            })
            .collect::<LedgerResult<Vec<_>>>()?;

        self.sink.emit(TxEvent::BatchStarted {
            transactions: prepared.len(),
            policy,
        });
        let timeout = self.submitter.config().confirm_timeout();

        let result = match policy {
            ExecutionPolicy::Parallel => {
                let outcomes = join_all(
                    prepared
                        .iter()
                        .map(|(id, raw)| self.issue(*id, raw, timeout, commitment)),
                )
                .await;
                SequenceResult {
                    number: outcomes.len(),
                    outcomes,
                }
            }
            ExecutionPolicy::Sequential | ExecutionPolicy::StopOnFailure => {
                let mut outcomes = Vec::with_capacity(prepared.len());
                for (index, (id, raw)) in prepared.iter().enumerate() {
                    let receipt = self.issue(*id, raw, timeout, commitment).await;
                    let committed = receipt.outcome.is_committed();
                    if committed {
                        on_success(&receipt.id, index);
                    } else {
                        let _ = on_failure(raw.as_slice(), index);
                    }
                    outcomes.push(receipt);

                    if !committed && policy == ExecutionPolicy::StopOnFailure {
                        self.sink.emit(TxEvent::BatchHalted {
                            index,
                            issued: outcomes.len(),
                        });
                        break;
                    }
                }
                SequenceResult {
                    number: outcomes.len(),
                    outcomes,
                }
            }
        };

        self.sink.emit(TxEvent::BatchFinished {
            issued: result.number,
            committed: result.committed(),
        });
        Ok(result)
    }

    /// Build one transaction, co-sign it locally, have the wallet sign it and submit it.
    pub async fn send_with_wallet(
        &self,
        wallet: &dyn WalletSigner,
        instructions: Vec<Instruction>,
        co_signers: &[Keypair],
        commitment: CommitmentLevel,
        blockhash: Option<BlockhashReference>,
    ) -> LedgerResult<SubmissionReceipt> {
        let fee_payer = wallet.public_key().ok_or(LedgerError::NotConnected)?;
        if instructions.is_empty() {
            return Err(LedgerError::Transaction("No instructions to send".to_string()));
        }
        let blockhash = match blockhash {
            Some(blockhash) => blockhash,
            None => self.client.get_latest_blockhash(commitment).await?,
        };

        let tx = build_transaction(instructions, fee_payer, co_signers, &blockhash)?;
        let tx = wallet.sign_transaction(tx).await?;
        let raw = tx.serialize()?;
        self.submitter
            .submit(&raw, self.submitter.config().confirm_timeout(), commitment)
            .await
    }

    async fn issue(
        &self,
        id: TxId,
        raw: &[u8],
        timeout: Duration,
        commitment: CommitmentLevel,
    ) -> SubmissionReceipt {
        match self.submitter.submit(raw, timeout, commitment).await {
            Ok(receipt) => receipt,
            Err(e) => SubmissionReceipt {
                id,
                outcome: SubmissionOutcome::Rejected {
                    reason: e.to_string(),
                },
            },
        }
    }
}

fn build_transaction(
    instructions: Vec<Instruction>,
    fee_payer: Pubkey,
    co_signers: &[Keypair],
    blockhash: &BlockhashReference,
) -> LedgerResult<Transaction> {
    let mut tx = Transaction::new(instructions).with_recent_blockhash(blockhash.blockhash);
    tx.set_fee_payer(fee_payer);
    let keys: Vec<Pubkey> = co_signers.iter().map(Keypair::pubkey).collect();
    tx.set_co_signers(&keys);
    if !co_signers.is_empty() {
        let refs: Vec<&Keypair> = co_signers.iter().collect();
        tx.partial_sign(&refs)?;
    }
    Ok(tx)
}

/// Fully signed transactions first, then the wallet-signed ones in input order.
async fn sign_pending(
    wallet: &dyn WalletSigner,
    fee_payer: &Pubkey,
    transactions: Vec<Transaction>,
) -> LedgerResult<Vec<Transaction>> {
    let (pending, mut ready): (Vec<Transaction>, Vec<Transaction>) = transactions
        .into_iter()
        .partition(|tx| tx.needs_signature_from(fee_payer));

    if pending.is_empty() {
        return Ok(ready);
    }

    let expected = pending.len();
    let signed = wallet.sign_all_transactions(pending).await?;
    if signed.len() != expected {
        return Err(LedgerError::Wallet(format!(
            "Wallet returned {} transactions for {} requested",
            signed.len(),
            expected
        )));
    }
    ready.extend(signed);
    Ok(ready)
}
