//! Ledger integration subsystem.
//!
//! # Data Flow
//! ```text
//! Instructions + co-signer keypairs
//!     → transaction.rs (build, co-sign, serialize)
//!     → wallet.rs (fee-payer signature)
//!     → client.rs (JSON-RPC: send, statuses, blockhash, simulate)
//!     → pubsub.rs (websocket signature notifications)
//! ```
//!
//! # Security Constraints
//! - Secret keys ONLY from environment variables or caller-held bytes
//! - Never log secret keys
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod pubsub;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::{LedgerClient, RpcClient};
pub use transaction::{AccountMeta, Instruction, Keypair, Transaction};
pub use types::{
    Blockhash, BlockhashReference, CommitmentLevel, LedgerError, LedgerResult, Pubkey,
    SendOptions, Signature, SignatureNotification, SignatureStatus, SignatureSubscription,
    SimulationResult, SubscriptionId, TxId,
};
pub use wallet::{LocalWallet, WalletSigner};
