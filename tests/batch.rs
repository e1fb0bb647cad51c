//! Batch sequencing tests against the scripted ledger.

use std::sync::Arc;
use std::time::Duration;

use ledger_submit::batch::{BatchRequest, BatchSequencer, ExecutionPolicy};
use ledger_submit::ledger::{
    BlockhashReference, CommitmentLevel, Keypair, LedgerError, LocalWallet, Transaction, TxId,
};
use ledger_submit::observability::TxEvent;
use ledger_submit::submission::SubmissionOutcome;

mod common;
use common::{marked, Behavior, DisconnectedWallet, MockLedger, RecordingSink};

const TIMEOUT: Duration = Duration::from_secs(5);

fn sequencer(ledger: &Arc<MockLedger>, sink: &Arc<RecordingSink>) -> BatchSequencer {
    BatchSequencer::new(ledger.clone(), common::config(TIMEOUT), sink.clone())
}

/// Five single-instruction groups, markers 0..5, with group 2 rejected.
fn five_groups_one_rejected(ledger: &MockLedger) -> BatchRequest {
    for marker in 0..5u8 {
        let behavior = if marker == 2 {
            Behavior::reject_by_poll(Duration::ZERO, "custom program error: 0x7")
        } else {
            Behavior::commit_by_push(Duration::from_millis(50))
        };
        ledger.script(marker, behavior);
    }
    BatchRequest::new((0..5u8).map(|m| vec![marked(m)]).collect(), Vec::new())
}

#[tokio::test(start_paused = true)]
async fn test_stop_on_failure_halts_after_first_failure() {
    let ledger = MockLedger::new();
    let sink = RecordingSink::new();
    let wallet = LocalWallet::new(Keypair::generate());
    let request = five_groups_one_rejected(&ledger);

    let mut successes = Vec::new();
    let mut failures = Vec::new();
    let result = sequencer(&ledger, &sink)
        .run(
            &wallet,
            request,
            ExecutionPolicy::StopOnFailure,
            CommitmentLevel::Confirmed,
            |_id: &TxId, index| successes.push(index),
            |_raw: &[u8], index| {
                failures.push(index);
                true
            },
        )
        .await
        .unwrap();

    assert_eq!(result.number, 3);
    assert_eq!(result.outcomes.len(), 3);
    assert!(matches!(result.outcomes[2].outcome, SubmissionOutcome::Rejected { .. }));
    assert_eq!(successes, vec![0, 1]);
    assert_eq!(failures, vec![2]);

    let sent = ledger.distinct_sent();
    assert!(!sent.contains(&3));
    assert!(!sent.contains(&4));
    assert_eq!(sink.count(|e| matches!(e, TxEvent::BatchHalted { index: 2, issued: 3 })), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sequential_continues_past_failures() {
    let ledger = MockLedger::new();
    let sink = RecordingSink::new();
    let wallet = LocalWallet::new(Keypair::generate());
    let request = five_groups_one_rejected(&ledger);

    let mut successes = Vec::new();
    let mut failures = Vec::new();
    let result = sequencer(&ledger, &sink)
        .run(
            &wallet,
            request,
            ExecutionPolicy::Sequential,
            CommitmentLevel::Confirmed,
            |_id: &TxId, index| successes.push(index),
            |_raw: &[u8], index| {
                failures.push(index);
                false
            },
        )
        .await
        .unwrap();

    assert_eq!(result.number, 5);
    assert_eq!(result.committed(), 4);
    assert_eq!(successes, vec![0, 1, 3, 4]);
    assert_eq!(failures, vec![2]);

    // Issued strictly in order: each marker first appears after its predecessor.
    let mut first_seen = Vec::new();
    for marker in ledger.sent_markers() {
        if !first_seen.contains(&marker) {
            first_seen.push(marker);
        }
    }
    assert_eq!(first_seen, vec![0, 1, 2, 3, 4]);
}

#[tokio::test(start_paused = true)]
async fn test_success_callback_receives_committed_ids() {
    let ledger = MockLedger::new();
    let sink = RecordingSink::new();
    let wallet = LocalWallet::new(Keypair::generate());
    for marker in 0..3u8 {
        ledger.script(marker, Behavior::commit_by_poll(Duration::ZERO));
    }
    let request = BatchRequest::new((0..3u8).map(|m| vec![marked(m)]).collect(), Vec::new());

    let mut ids = Vec::new();
    let result = sequencer(&ledger, &sink)
        .run(
            &wallet,
            request,
            ExecutionPolicy::Sequential,
            CommitmentLevel::Confirmed,
            |id: &TxId, _index| ids.push(*id),
            |_raw: &[u8], _index| true,
        )
        .await
        .unwrap();

    let receipt_ids: Vec<TxId> = result.outcomes.iter().map(|r| r.id).collect();
    assert_eq!(ids, receipt_ids);
}

#[tokio::test(start_paused = true)]
async fn test_parallel_issues_everything_without_callbacks() {
    let ledger = MockLedger::new();
    let sink = RecordingSink::new();
    let wallet = LocalWallet::new(Keypair::generate());
    let request = five_groups_one_rejected(&ledger);

    let mut callbacks = 0;
    let result = sequencer(&ledger, &sink)
        .run(
            &wallet,
            request,
            ExecutionPolicy::Parallel,
            CommitmentLevel::Confirmed,
            |_id: &TxId, _index| callbacks += 1,
            |_raw: &[u8], _index| true,
        )
        .await
        .unwrap();

    assert_eq!(result.number, 5);
    assert_eq!(result.committed(), 4);
    assert_eq!(ledger.distinct_sent().len(), 5);
    assert_eq!(callbacks, 0);
}

#[tokio::test(start_paused = true)]
async fn test_empty_groups_are_skipped() {
    let ledger = MockLedger::new();
    let sink = RecordingSink::new();
    let wallet = LocalWallet::new(Keypair::generate());
    ledger.script(1, Behavior::commit_by_push(Duration::ZERO));
    ledger.script(3, Behavior::commit_by_push(Duration::ZERO));

    let request = BatchRequest::new(
        vec![vec![marked(1)], Vec::new(), vec![marked(3)]],
        Vec::new(),
    );
    let result = sequencer(&ledger, &sink)
        .run(
            &wallet,
            request,
            ExecutionPolicy::Sequential,
            CommitmentLevel::Confirmed,
            |_id: &TxId, _index| {},
            |_raw: &[u8], _index| true,
        )
        .await
        .unwrap();

    assert_eq!(result.number, 2);
    assert_eq!(ledger.blockhash_fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_co_signers_and_presigned_transactions() {
    let ledger = MockLedger::new();
    let sink = RecordingSink::new();
    let wallet = LocalWallet::new(Keypair::generate());
    for marker in [1u8, 2, 9] {
        ledger.script(marker, Behavior::commit_by_push(Duration::ZERO));
    }

    // Fully signed by its own payer: issued before anything the wallet signs.
    let presigned = common::signed_transaction(9, &Keypair::generate());
    let co_signer = Keypair::generate();
    let request = BatchRequest::new(
        vec![vec![marked(1)], vec![marked(2)]],
        vec![vec![co_signer], Vec::new()],
    )
    .with_after(vec![presigned]);

    let result = sequencer(&ledger, &sink)
        .run(
            &wallet,
            request,
            ExecutionPolicy::Sequential,
            CommitmentLevel::Confirmed,
            |_id: &TxId, _index| {},
            |_raw: &[u8], _index| true,
        )
        .await
        .unwrap();

    assert_eq!(result.committed(), 3);
    assert_eq!(ledger.sent_markers(), vec![9, 1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_disconnected_wallet_touches_nothing() {
    let ledger = MockLedger::new();
    let sink = RecordingSink::new();
    let request = BatchRequest::new(vec![vec![marked(1)]], Vec::new());

    let result = sequencer(&ledger, &sink)
        .run(
            &DisconnectedWallet,
            request,
            ExecutionPolicy::Sequential,
            CommitmentLevel::Confirmed,
            |_id: &TxId, _index| {},
            |_raw: &[u8], _index| true,
        )
        .await;

    assert!(matches!(result, Err(LedgerError::NotConnected)));
    assert_eq!(ledger.total_calls(), 0);
    assert!(sink.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_send_with_wallet_submits_one_transaction() {
    let ledger = MockLedger::new();
    let sink = RecordingSink::new();
    let wallet = LocalWallet::new(Keypair::generate());
    ledger.script(4, Behavior::commit_by_poll(Duration::from_millis(300)));

    let receipt = sequencer(&ledger, &sink)
        .send_with_wallet(&wallet, vec![marked(4)], &[], CommitmentLevel::Confirmed, None)
        .await
        .unwrap();

    assert!(receipt.outcome.is_committed());
    assert_eq!(ledger.blockhash_fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unsigned_supplied_transaction_fails_before_any_send() {
    let ledger = MockLedger::new();
    let sink = RecordingSink::new();
    let wallet = LocalWallet::new(Keypair::generate());
    ledger.script(1, Behavior::commit_by_push(Duration::ZERO));

    // Owned by a payer nobody here can sign for.
    let mut unsigned = Transaction::new(vec![marked(7)]).with_recent_blockhash(common::BLOCKHASH);
    unsigned.set_fee_payer(Keypair::generate().pubkey());

    let request = BatchRequest::new(vec![vec![marked(1)]], Vec::new())
        .with_before(vec![unsigned])
        .with_blockhash(BlockhashReference {
            blockhash: common::BLOCKHASH,
            last_valid_block_height: 500,
        });
    let result = sequencer(&ledger, &sink)
        .run(
            &wallet,
            request,
            ExecutionPolicy::Parallel,
            CommitmentLevel::Confirmed,
            |_id: &TxId, _index| {},
            |_raw: &[u8], _index| true,
        )
        .await;

    assert!(matches!(result, Err(LedgerError::Transaction(_))));
    assert_eq!(ledger.total_calls(), 0);
}
