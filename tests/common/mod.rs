//! Shared utilities for integration testing: a scripted in-memory ledger,
//! a recording event sink, wallets and a JSON-RPC backend.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::{sleep, Instant};

use ledger_submit::config::SubmissionConfig;
use ledger_submit::ledger::{
    Blockhash, BlockhashReference, CommitmentLevel, Instruction, Keypair, LedgerClient,
    LedgerError, LedgerResult, Pubkey, SendOptions, SignatureNotification, SignatureStatus,
    SignatureSubscription, SimulationResult, SubscriptionId, Transaction, TxId, WalletSigner,
};
use ledger_submit::observability::{EventSink, TxEvent};

pub const BLOCKHASH: Blockhash = Blockhash([7u8; 32]);
pub const COMMIT_SLOT: u64 = 4_242;

/// Terminal signal the scripted ledger produces for a transaction.
#[derive(Debug, Clone)]
pub enum Scripted {
    Commit,
    Reject(String),
}

/// How the ledger treats transactions whose first instruction carries a given marker byte.
#[derive(Debug, Clone)]
pub struct Behavior {
    /// Answer every send with an RPC error object.
    pub reject_on_send: Option<String>,
    /// Fail this many sends in transport before one lands.
    pub dropped_sends: usize,
    /// Notification delivered this long after subscribing.
    pub push: Option<(Duration, Scripted)>,
    /// Status visible this long after the transaction landed.
    pub poll: Option<(Duration, Scripted)>,
    /// Fail this many status queries before answering.
    pub poll_errors: usize,
    /// Subscribe calls take this long before answering.
    pub subscribe_delay: Duration,
    pub subscribe_fails: bool,
    pub simulation: Result<SimulationResult, String>,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            reject_on_send: None,
            dropped_sends: 0,
            push: None,
            poll: None,
            poll_errors: 0,
            subscribe_delay: Duration::ZERO,
            subscribe_fails: false,
            simulation: Ok(SimulationResult::default()),
        }
    }
}

impl Behavior {
    /// Lands but never produces a terminal signal.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn commit_by_push(delay: Duration) -> Self {
        Self {
            push: Some((delay, Scripted::Commit)),
            ..Default::default()
        }
    }

    pub fn commit_by_poll(delay: Duration) -> Self {
        Self {
            poll: Some((delay, Scripted::Commit)),
            ..Default::default()
        }
    }

    pub fn reject_by_push(delay: Duration, reason: &str) -> Self {
        Self {
            push: Some((delay, Scripted::Reject(reason.to_string()))),
            ..Default::default()
        }
    }

    pub fn reject_by_poll(delay: Duration, reason: &str) -> Self {
        Self {
            poll: Some((delay, Scripted::Reject(reason.to_string()))),
            ..Default::default()
        }
    }

    pub fn reject_on_send(message: &str) -> Self {
        Self {
            reject_on_send: Some(message.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Default)]
struct LedgerState {
    behaviors: HashMap<u8, Behavior>,
    markers: HashMap<TxId, u8>,
    send_attempts: HashMap<TxId, usize>,
    landed: HashMap<TxId, Instant>,
    poll_failures: HashMap<TxId, usize>,
    sent_markers: Vec<u8>,
    committed: HashSet<TxId>,
}

/// In-memory ledger driven by per-marker scripts. Counts every call.
#[derive(Default)]
pub struct MockLedger {
    state: Mutex<LedgerState>,
    next_subscription: AtomicU64,
    pub sends: AtomicUsize,
    pub subscribes: AtomicUsize,
    pub unsubscribes: AtomicUsize,
    pub status_queries: AtomicUsize,
    pub simulations: AtomicUsize,
    pub blockhash_fetches: AtomicUsize,
}

impl MockLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, marker: u8, behavior: Behavior) {
        self.state.lock().unwrap().behaviors.insert(marker, behavior);
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn sends(&self) -> usize {
        Self::count(&self.sends)
    }

    pub fn subscribes(&self) -> usize {
        Self::count(&self.subscribes)
    }

    pub fn unsubscribes(&self) -> usize {
        Self::count(&self.unsubscribes)
    }

    pub fn simulations(&self) -> usize {
        Self::count(&self.simulations)
    }

    pub fn blockhash_fetches(&self) -> usize {
        Self::count(&self.blockhash_fetches)
    }

    pub fn total_calls(&self) -> usize {
        self.sends()
            + self.subscribes()
            + self.unsubscribes()
            + Self::count(&self.status_queries)
            + self.simulations()
            + self.blockhash_fetches()
    }

    /// Marker of every send attempt, in call order.
    pub fn sent_markers(&self) -> Vec<u8> {
        self.state.lock().unwrap().sent_markers.clone()
    }

    /// Distinct markers that reached the ledger at least once.
    pub fn distinct_sent(&self) -> HashSet<u8> {
        self.sent_markers().into_iter().collect()
    }

    /// Transactions observed committed, counted once each.
    pub fn committed(&self) -> usize {
        self.state.lock().unwrap().committed.len()
    }

    fn behavior_for(&self, id: &TxId) -> Behavior {
        let state = self.state.lock().unwrap();
        state
            .markers
            .get(id)
            .and_then(|marker| state.behaviors.get(marker))
            .cloned()
            .unwrap_or_default()
    }
}

pub fn marker_of(raw: &[u8]) -> u8 {
    Transaction::deserialize(raw)
        .ok()
        .and_then(|tx| tx.instructions().first().and_then(|ix| ix.data.first().copied()))
        .unwrap_or(0)
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn send_raw_transaction(&self, raw: &[u8], _options: SendOptions) -> LedgerResult<TxId> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        let id = TxId::from_wire(raw)?;
        let marker = marker_of(raw);

        let mut state = self.state.lock().unwrap();
        state.markers.insert(id, marker);
        state.sent_markers.push(marker);
        let behavior = state.behaviors.get(&marker).cloned().unwrap_or_default();

        if let Some(message) = behavior.reject_on_send {
            return Err(LedgerError::RpcResponse {
                code: -32002,
                message,
            });
        }

        let attempts = state.send_attempts.entry(id).or_insert(0);
        *attempts += 1;
        if *attempts <= behavior.dropped_sends {
            return Err(LedgerError::Rpc("connection reset".to_string()));
        }

        state.landed.entry(id).or_insert_with(Instant::now);
        Ok(id)
    }

    async fn subscribe_signature(
        &self,
        id: &TxId,
        _commitment: CommitmentLevel,
    ) -> LedgerResult<SignatureSubscription> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior_for(id);
        if !behavior.subscribe_delay.is_zero() {
            sleep(behavior.subscribe_delay).await;
        }
        if behavior.subscribe_fails {
            return Err(LedgerError::Subscription("socket closed".to_string()));
        }

        let (tx, rx) = oneshot::channel();
        if let Some((delay, scripted)) = behavior.push {
            tokio::spawn(async move {
                sleep(delay).await;
                let err = match scripted {
                    Scripted::Commit => None,
                    Scripted::Reject(reason) => Some(json!(reason)),
                };
                let _ = tx.send(SignatureNotification {
                    slot: COMMIT_SLOT,
                    err,
                });
            });
        } else {
            // Keep the sender alive so the listener stays registered.
            tokio::spawn(async move {
                let mut tx = tx;
                tx.closed().await;
            });
        }

        Ok(SignatureSubscription {
            id: SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst)),
            notification: rx,
        })
    }

    async fn remove_signature_listener(&self, _subscription: SubscriptionId) -> LedgerResult<()> {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_signature_statuses(
        &self,
        ids: &[TxId],
    ) -> LedgerResult<Vec<Option<SignatureStatus>>> {
        self.status_queries.fetch_add(1, Ordering::SeqCst);

        let mut statuses = Vec::with_capacity(ids.len());
        for id in ids {
            let behavior = self.behavior_for(id);
            let mut state = self.state.lock().unwrap();

            let failures = state.poll_failures.entry(*id).or_insert(0);
            if *failures < behavior.poll_errors {
                *failures += 1;
                return Err(LedgerError::Rpc("node overloaded".to_string()));
            }

            let visible = match (behavior.poll, state.landed.get(id)) {
                (Some((delay, scripted)), Some(landed)) if landed.elapsed() >= delay => {
                    Some(scripted)
                }
                _ => None,
            };
            let status = visible.map(|scripted| match scripted {
                Scripted::Commit => {
                    state.committed.insert(*id);
                    SignatureStatus {
                        slot: COMMIT_SLOT,
                        confirmations: Some(1),
                        err: None,
                        confirmation_status: Some(CommitmentLevel::Confirmed),
                    }
                }
                Scripted::Reject(reason) => SignatureStatus {
                    slot: COMMIT_SLOT,
                    confirmations: Some(0),
                    err: Some(json!(reason)),
                    confirmation_status: Some(CommitmentLevel::Processed),
                },
            });
            statuses.push(status);
        }
        Ok(statuses)
    }

    async fn get_latest_blockhash(
        &self,
        _commitment: CommitmentLevel,
    ) -> LedgerResult<BlockhashReference> {
        self.blockhash_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(BlockhashReference {
            blockhash: BLOCKHASH,
            last_valid_block_height: 10_000,
        })
    }

    async fn simulate_transaction(
        &self,
        raw: &[u8],
        _commitment: CommitmentLevel,
    ) -> LedgerResult<SimulationResult> {
        self.simulations.fetch_add(1, Ordering::SeqCst);
        let id = TxId::from_wire(raw)?;
        self.behavior_for(&id)
            .simulation
            .map_err(LedgerError::Rpc)
    }
}

/// Sink that keeps every event for later assertions.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TxEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<TxEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count<F: Fn(&TxEvent) -> bool>(&self, predicate: F) -> usize {
        self.events.lock().unwrap().iter().filter(|e| predicate(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: TxEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Wallet with no connected identity.
pub struct DisconnectedWallet;

#[async_trait]
impl WalletSigner for DisconnectedWallet {
    fn public_key(&self) -> Option<Pubkey> {
        None
    }

    async fn sign_transaction(&self, _tx: Transaction) -> LedgerResult<Transaction> {
        Err(LedgerError::NotConnected)
    }
}

pub fn config(timeout: Duration) -> SubmissionConfig {
    SubmissionConfig {
        confirm_timeout_ms: timeout.as_millis() as u64,
        resend_interval_ms: 500,
        poll_interval_ms: 200,
        commitment: CommitmentLevel::Confirmed,
        simulate_on_timeout: true,
    }
}

pub fn marked(marker: u8) -> Instruction {
    Instruction::new(Pubkey([9u8; 32]), Vec::new(), vec![marker])
}

/// A fully signed transaction whose first instruction carries `marker`.
pub fn signed_tx(marker: u8, payer: &Keypair) -> Vec<u8> {
    signed_transaction(marker, payer).serialize().unwrap()
}

pub fn signed_transaction(marker: u8, payer: &Keypair) -> Transaction {
    let mut tx = Transaction::new(vec![marked(marker)]).with_recent_blockhash(BLOCKHASH);
    tx.set_fee_payer(payer.pubkey());
    tx.partial_sign(&[payer]).unwrap();
    tx
}

/// Start a JSON-RPC backend on an ephemeral port; `handler` maps a request body to (status, body).
pub async fn start_rpc_backend<F>(handler: F) -> SocketAddr
where
    F: Fn(Value) -> (u16, Value) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let handler = handler.clone();
            tokio::spawn(async move {
                let Some(request) = read_json_body(&mut socket).await else {
                    return;
                };
                let (status, body) = handler(request);
                let status_text = match status {
                    200 => "200 OK",
                    503 => "503 Service Unavailable",
                    _ => "500 Internal Server Error",
                };
                let body = body.to_string();
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

async fn read_json_body(socket: &mut TcpStream) -> Option<Value> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&buf[..end]).to_lowercase();
        let length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let body_start = end + 4;
        while buf.len() < body_start + length {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        return serde_json::from_slice(&buf[body_start..body_start + length]).ok();
    }
}
