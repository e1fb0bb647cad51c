//! Websocket signature subscriptions.
//!
//! One connection carries every subscription. A writer task drains an
//! outbound queue; a reader task answers pending subscribe requests and
//! delivers notifications to registered listeners. When the socket dies all
//! pending requests and listeners are dropped, which their receivers observe
//! as a closed channel.

use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::ledger::types::{
    CommitmentLevel, LedgerError, LedgerResult, SignatureNotification, SignatureSubscription,
    SubscriptionId, TxId,
};

struct PendingSubscribe {
    reply: oneshot::Sender<Result<u64, String>>,
    listener: oneshot::Sender<SignatureNotification>,
}

struct Shared {
    outbound: mpsc::UnboundedSender<String>,
    /// Subscribe requests awaiting the node's subscription id, by request id.
    requests: DashMap<u64, PendingSubscribe>,
    /// Live listeners, by subscription id.
    listeners: DashMap<u64, oneshot::Sender<SignatureNotification>>,
    next_request_id: AtomicU64,
    closed: AtomicBool,
}

impl Shared {
    fn new(outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            outbound,
            requests: DashMap::new(),
            listeners: DashMap::new(),
            next_request_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.outbound.is_closed()
    }

    fn request_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Drop the listener and tell the node to forget the subscription.
    fn unsubscribe(&self, subscription: u64) -> LedgerResult<()> {
        self.listeners.remove(&subscription);
        if self.is_closed() {
            // The node forgot every subscription along with the connection.
            return Ok(());
        }

        let request = json!({
            "jsonrpc": "2.0",
            "id": self.request_id(),
            "method": "signatureUnsubscribe",
            "params": [subscription],
        });
        self.outbound
            .send(request.to_string())
            .map_err(|_| LedgerError::Subscription("Websocket connection closed".to_string()))
    }

    fn dispatch(&self, text: &str) {
        let value: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring undecodable websocket frame");
                return;
            }
        };

        if let Some(request_id) = value.get("id").and_then(Value::as_u64) {
            // Unsubscribe acknowledgements have no pending entry and fall through here.
            if let Some((_, pending)) = self.requests.remove(&request_id) {
                match value.get("result").and_then(Value::as_u64) {
                    Some(subscription) => {
                        // Register before replying so an immediate notification is not lost.
                        self.listeners.insert(subscription, pending.listener);
                        if pending.reply.send(Ok(subscription)).is_err() {
                            tracing::debug!(subscription, "Subscriber gone before ack, unsubscribing");
                            let _ = self.unsubscribe(subscription);
                        }
                    }
                    None => {
                        let message = value
                            .get("error")
                            .map(|e| e.to_string())
                            .unwrap_or_else(|| "missing subscription id".to_string());
                        let _ = pending.reply.send(Err(message));
                    }
                }
            }
            return;
        }

        if value.get("method").and_then(Value::as_str) != Some("signatureNotification") {
            return;
        }
        let params = &value["params"];
        let Some(subscription) = params["subscription"].as_u64() else {
            return;
        };
        let notification = SignatureNotification {
            slot: params["result"]["context"]["slot"].as_u64().unwrap_or_default(),
            err: match &params["result"]["value"]["err"] {
                Value::Null => None,
                err => Some(err.clone()),
            },
        };
        // Signature subscriptions fire once; the node drops them after notifying.
        if let Some((_, listener)) = self.listeners.remove(&subscription) {
            let _ = listener.send(notification);
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.requests.clear();
        self.listeners.clear();
    }
}

/// Multiplexed websocket subscription client.
pub struct PubsubClient {
    shared: Arc<Shared>,
}

impl PubsubClient {
    /// Open the websocket and start the reader and writer tasks.
    pub async fn connect(url: &Url, connect_timeout: Duration) -> LedgerResult<Self> {
        let (socket, _) = timeout(connect_timeout, tokio_tungstenite::connect_async(url.as_str()))
            .await
            .map_err(|_| LedgerError::Timeout(connect_timeout.as_secs()))?
            .map_err(|e| LedgerError::Subscription(format!("Websocket connect to {} failed: {}", url, e)))?;

        let (mut sink, mut stream) = socket.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let shared = Arc::new(Shared::new(outbound));

        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    tracing::warn!(error = %e, "Websocket write failed");
                    break;
                }
            }
        });

        let reader_shared = shared.clone();
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => reader_shared.dispatch(text.as_str()),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "Websocket read failed");
                        break;
                    }
                }
            }
            reader_shared.close();
        });

        tracing::info!(ws_url = %url, "Websocket connected");

        Ok(Self { shared })
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    pub async fn subscribe_signature(
        &self,
        id: &TxId,
        commitment: CommitmentLevel,
        reply_timeout: Duration,
    ) -> LedgerResult<SignatureSubscription> {
        if self.is_closed() {
            return Err(LedgerError::Subscription("Websocket connection closed".to_string()));
        }

        let request_id = self.shared.request_id();
        let (reply, reply_rx) = oneshot::channel();
        let (listener, notification) = oneshot::channel();
        self.shared
            .requests
            .insert(request_id, PendingSubscribe { reply, listener });
        let mut awaiting = AwaitingAck {
            shared: &self.shared,
            request_id,
            reply: reply_rx,
        };

        let request = json!({
            "jsonrpc": "2.0",
            "id": request_id,
            "method": "signatureSubscribe",
            "params": [id.to_string(), { "commitment": commitment.as_str() }],
        });
        if self.shared.outbound.send(request.to_string()).is_err() {
            return Err(LedgerError::Subscription("Websocket connection closed".to_string()));
        }

        match timeout(reply_timeout, &mut awaiting.reply).await {
            Ok(Ok(Ok(subscription))) => Ok(SignatureSubscription {
                id: SubscriptionId(subscription),
                notification,
            }),
            Ok(Ok(Err(message))) => Err(LedgerError::Subscription(message)),
            Ok(Err(_)) => Err(LedgerError::Subscription(
                "Websocket closed before subscription was acknowledged".to_string(),
            )),
            Err(_) => Err(LedgerError::Timeout(reply_timeout.as_secs())),
        }
    }

    pub fn unsubscribe(&self, subscription: SubscriptionId) -> LedgerResult<()> {
        self.shared.unsubscribe(subscription.0)
    }
}

/// Cleans up a subscribe request whose caller stopped waiting, whether it
/// timed out or its future was dropped mid-flight.
struct AwaitingAck<'a> {
    shared: &'a Shared,
    request_id: u64,
    reply: oneshot::Receiver<Result<u64, String>>,
}

impl Drop for AwaitingAck<'_> {
    fn drop(&mut self) {
        self.shared.requests.remove(&self.request_id);
        // Acked but never read: nobody holds the id, so release it here.
        if let Ok(Ok(subscription)) = self.reply.try_recv() {
            let _ = self.shared.unsubscribe(subscription);
        }
    }
}
