//! Wallet signing capability.
//!
//! # Security
//! - Secret keys are loaded ONLY from environment variables or caller-held bytes
//! - Keys are never logged or serialized

use async_trait::async_trait;
use std::sync::Arc;

use crate::ledger::transaction::{Keypair, Transaction};
use crate::ledger::types::{LedgerError, LedgerResult, Pubkey};

/// Environment variable holding the base58 secret key of the local wallet.
pub const WALLET_SECRET_ENV_VAR: &str = "LEDGER_WALLET_SECRET_KEY";

/// Fee-payer signing capability.
///
/// Not assumed safe for concurrent use; callers batch requests instead.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// `None` when no identity is connected.
    fn public_key(&self) -> Option<Pubkey>;

    async fn sign_transaction(&self, tx: Transaction) -> LedgerResult<Transaction>;

    async fn sign_all_transactions(&self, txs: Vec<Transaction>) -> LedgerResult<Vec<Transaction>> {
        let mut signed = Vec::with_capacity(txs.len());
        for tx in txs {
            signed.push(self.sign_transaction(tx).await?);
        }
        Ok(signed)
    }
}

/// Wallet backed by a keypair held in process memory.
#[derive(Debug, Clone)]
pub struct LocalWallet {
    keypair: Arc<Keypair>,
}

impl LocalWallet {
    pub fn new(keypair: Keypair) -> Self {
        tracing::info!(pubkey = %keypair.pubkey(), "Wallet initialized");
        Self {
            keypair: Arc::new(keypair),
        }
    }

    pub fn from_secret_key(secret_base58: &str) -> LedgerResult<Self> {
        Ok(Self::new(Keypair::from_base58(secret_base58)?))
    }

    /// Load the wallet from `LEDGER_WALLET_SECRET_KEY`.
    pub fn from_env() -> LedgerResult<Self> {
        let secret = std::env::var(WALLET_SECRET_ENV_VAR).map_err(|_| {
            LedgerError::Wallet(format!(
                "Environment variable {} not set",
                WALLET_SECRET_ENV_VAR
            ))
        })?;
        Self::from_secret_key(&secret)
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }
}

#[async_trait]
impl WalletSigner for LocalWallet {
    fn public_key(&self) -> Option<Pubkey> {
        Some(self.keypair.pubkey())
    }

    async fn sign_transaction(&self, mut tx: Transaction) -> LedgerResult<Transaction> {
        tx.partial_sign(&[self.keypair.as_ref()])
            .map_err(|e| LedgerError::Wallet(format!("Signing failed: {}", e)))?;
        Ok(tx)
    }
}
