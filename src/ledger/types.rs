//! Ledger identities, node response shapes and error definitions.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tokio::sync::oneshot;

/// Errors that can occur while talking to the ledger or preparing transactions.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Transport-level failure (connection refused, bad payload, all providers down).
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The node answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    RpcResponse { code: i64, message: String },

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// No signing identity is available.
    #[error("Wallet not connected")]
    NotConnected,

    /// The network explicitly reported a transaction error.
    #[error("Transaction rejected by ledger: {0}")]
    LedgerRejected(String),

    /// Neither confirmation channel produced a terminal signal in time.
    #[error("Timed out awaiting confirmation on transaction")]
    TimedOut,

    /// Simulation could not be executed while diagnosing a timeout.
    #[error("Simulation inconclusive: {0}")]
    SimulationInconclusive(String),

    /// A single status query failed; recovered locally by the tracker.
    #[error("Transient status query error: {0}")]
    TransientQuery(String),

    /// Malformed, unsigned or otherwise unusable transaction.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Signing capability failed.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Push subscription could not be registered.
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Base58/base64/bincode encoding problem.
    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

fn decode_base58<const N: usize>(s: &str, what: &str) -> LedgerResult<[u8; N]> {
    let bytes = bs58::decode(s)
        .into_vec()
        .map_err(|e| LedgerError::Encoding(format!("Invalid {} '{}': {}", what, s, e)))?;
    bytes.try_into().map_err(|b: Vec<u8>| {
        LedgerError::Encoding(format!("Invalid {} length: expected {}, got {}", what, N, b.len()))
    })
}

/// Ed25519 public key identifying an account or signer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Pubkey(pub [u8; 32]);

impl Pubkey {
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({})", self)
    }
}

impl FromStr for Pubkey {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_base58(s, "public key").map(Self)
    }
}

/// Ed25519 signature over a transaction message.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    pub fn to_bytes(&self) -> [u8; 64] {
        self.0
    }

    pub fn from_slice(bytes: &[u8]) -> LedgerResult<Self> {
        let arr: [u8; 64] = bytes.try_into().map_err(|_| {
            LedgerError::Encoding(format!("Invalid signature length: {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }

    /// Check this signature against a public key and message.
    pub fn verify(&self, pubkey: &Pubkey, message: &[u8]) -> bool {
        use ed25519_dalek::Verifier;

        let Ok(key) = ed25519_dalek::VerifyingKey::from_bytes(&pubkey.0) else {
            return false;
        };
        key.verify(message, &ed25519_dalek::Signature::from_bytes(&self.0))
            .is_ok()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self)
    }
}

/// Transaction id: the fee payer's signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxId(pub Signature);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({})", self.0)
    }
}

impl FromStr for TxId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_base58(s, "transaction id").map(|b| Self(Signature(b)))
    }
}

impl Serialize for TxId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TxId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Recent ledger-state token used to bound a transaction's lifetime.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Blockhash(pub [u8; 32]);

impl fmt::Display for Blockhash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Blockhash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blockhash({})", self)
    }
}

impl FromStr for Blockhash {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_base58(s, "blockhash").map(Self)
    }
}

/// A blockhash together with the last block height at which it is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockhashReference {
    pub blockhash: Blockhash,
    pub last_valid_block_height: u64,
}

impl BlockhashReference {
    /// Whether transactions built on this reference can still land at `block_height`.
    pub fn is_valid_at(&self, block_height: u64) -> bool {
        block_height <= self.last_valid_block_height
    }
}

/// Commitment level requested from the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CommitmentLevel {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl CommitmentLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitmentLevel::Processed => "processed",
            CommitmentLevel::Confirmed => "confirmed",
            CommitmentLevel::Finalized => "finalized",
        }
    }
}

impl fmt::Display for CommitmentLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommitmentLevel {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processed" => Ok(CommitmentLevel::Processed),
            "confirmed" => Ok(CommitmentLevel::Confirmed),
            "finalized" => Ok(CommitmentLevel::Finalized),
            other => Err(LedgerError::Encoding(format!("Unknown commitment level '{}'", other))),
        }
    }
}

/// Options for `sendTransaction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    pub skip_preflight: bool,
}

impl SendOptions {
    /// The engine trusts local signature checks and skips node-side preflight.
    pub fn skip_preflight() -> Self {
        Self { skip_preflight: true }
    }
}

/// Status of a transaction as reported by `getSignatureStatuses`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    pub slot: u64,
    /// Blocks built on top of the transaction's block; `None` once rooted.
    pub confirmations: Option<u64>,
    pub err: Option<serde_json::Value>,
    #[serde(default)]
    pub confirmation_status: Option<CommitmentLevel>,
}

impl SignatureStatus {
    pub fn is_committed(&self) -> bool {
        self.confirmations.is_some()
            || self.confirmation_status == Some(CommitmentLevel::Finalized)
    }
}

/// Payload of a `signatureNotification`.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureNotification {
    pub slot: u64,
    pub err: Option<serde_json::Value>,
}

/// Handle identifying a live signature subscription on the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// A registered signature subscription and the channel its single notification arrives on.
#[derive(Debug)]
pub struct SignatureSubscription {
    pub id: SubscriptionId,
    pub notification: oneshot::Receiver<SignatureNotification>,
}

/// Result of `simulateTransaction`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimulationResult {
    pub err: Option<serde_json::Value>,
    pub logs: Option<Vec<String>>,
}
