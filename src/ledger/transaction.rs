//! Transaction construction, local signing and wire encoding.
//!
//! # Responsibilities
//! - Hold instructions, blockhash, fee payer and co-signers
//! - Apply local co-signer signatures and verify externally supplied ones
//! - Refuse to serialize until every required signer has signed

use ed25519_dalek::{Signer as _, SigningKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ledger::types::{Blockhash, LedgerError, LedgerResult, Pubkey, Signature, TxId};

/// Account referenced by an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

/// Opaque payload addressed to a program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

impl Instruction {
    pub fn new(program_id: Pubkey, accounts: Vec<AccountMeta>, data: Vec<u8>) -> Self {
        Self {
            program_id,
            accounts,
            data,
        }
    }
}

/// The signed portion of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub fee_payer: Pubkey,
    /// Required signers, fee payer first.
    pub signers: Vec<Pubkey>,
    pub recent_blockhash: Blockhash,
    pub instructions: Vec<Instruction>,
}

#[derive(Serialize, Deserialize)]
struct WireTransaction {
    signatures: Vec<Vec<u8>>,
    message: Message,
}

/// Local ed25519 signing key.
pub struct Keypair(SigningKey);

impl Keypair {
    pub fn generate() -> Self {
        Self(SigningKey::generate(&mut OsRng))
    }

    /// Accepts a 32-byte secret or a 64-byte secret||public pair.
    pub fn from_secret_bytes(bytes: &[u8]) -> LedgerResult<Self> {
        let secret: [u8; 32] = match bytes.len() {
            32 | 64 => bytes[..32]
                .try_into()
                .map_err(|_| LedgerError::Wallet("Invalid secret key".to_string()))?,
            n => {
                return Err(LedgerError::Wallet(format!(
                    "Invalid secret key length: {}",
                    n
                )))
            }
        };
        Ok(Self(SigningKey::from_bytes(&secret)))
    }

    pub fn from_base58(secret: &str) -> LedgerResult<Self> {
        let bytes = bs58::decode(secret.trim())
            .into_vec()
            .map_err(|e| LedgerError::Wallet(format!("Invalid secret key format: {}", e)))?;
        Self::from_secret_bytes(&bytes)
    }

    pub fn pubkey(&self) -> Pubkey {
        Pubkey(self.0.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.0.sign(message).to_bytes())
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("pubkey", &self.pubkey())
            .finish()
    }
}

/// A transaction under construction or ready to send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    instructions: Vec<Instruction>,
    recent_blockhash: Option<Blockhash>,
    fee_payer: Option<Pubkey>,
    co_signers: Vec<Pubkey>,
    signatures: HashMap<Pubkey, Signature>,
}

impl Transaction {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self {
            instructions,
            ..Default::default()
        }
    }

    pub fn with_recent_blockhash(mut self, blockhash: Blockhash) -> Self {
        self.set_recent_blockhash(blockhash);
        self
    }

    // Any change to the message invalidates collected signatures.
    pub fn set_recent_blockhash(&mut self, blockhash: Blockhash) {
        self.recent_blockhash = Some(blockhash);
        self.signatures.clear();
    }

    pub fn set_fee_payer(&mut self, fee_payer: Pubkey) {
        self.fee_payer = Some(fee_payer);
        self.signatures.clear();
    }

    pub fn set_co_signers(&mut self, co_signers: &[Pubkey]) {
        self.co_signers = co_signers.to_vec();
        self.signatures.clear();
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn fee_payer(&self) -> Option<Pubkey> {
        self.fee_payer
    }

    pub fn recent_blockhash(&self) -> Option<Blockhash> {
        self.recent_blockhash
    }

    /// Fee payer first, then co-signers in insertion order, without duplicates.
    pub fn required_signers(&self) -> Vec<Pubkey> {
        let mut signers: Vec<Pubkey> = Vec::with_capacity(1 + self.co_signers.len());
        for key in self.fee_payer.iter().chain(self.co_signers.iter()) {
            if !signers.contains(key) {
                signers.push(*key);
            }
        }
        signers
    }

    pub fn message(&self) -> LedgerResult<Message> {
        let fee_payer = self
            .fee_payer
            .ok_or_else(|| LedgerError::Transaction("Fee payer not set".to_string()))?;
        let recent_blockhash = self
            .recent_blockhash
            .ok_or_else(|| LedgerError::Transaction("Recent blockhash not set".to_string()))?;

        Ok(Message {
            fee_payer,
            signers: self.required_signers(),
            recent_blockhash,
            instructions: self.instructions.clone(),
        })
    }

    pub fn message_bytes(&self) -> LedgerResult<Vec<u8>> {
        bincode::serialize(&self.message()?)
            .map_err(|e| LedgerError::Encoding(format!("Message encoding failed: {}", e)))
    }

    /// Sign with locally held keys; every key must be a required signer.
    pub fn partial_sign(&mut self, keypairs: &[&Keypair]) -> LedgerResult<()> {
        let message = self.message_bytes()?;
        let required = self.required_signers();

        for keypair in keypairs {
            let pubkey = keypair.pubkey();
            if !required.contains(&pubkey) {
                return Err(LedgerError::Transaction(format!(
                    "{} is not a required signer",
                    pubkey
                )));
            }
            self.signatures.insert(pubkey, keypair.sign(&message));
        }
        Ok(())
    }

    /// Attach a signature produced elsewhere, verifying it first.
    pub fn add_signature(&mut self, pubkey: Pubkey, signature: Signature) -> LedgerResult<()> {
        if !self.required_signers().contains(&pubkey) {
            return Err(LedgerError::Transaction(format!(
                "{} is not a required signer",
                pubkey
            )));
        }
        let message = self.message_bytes()?;
        if !signature.verify(&pubkey, &message) {
            return Err(LedgerError::Transaction(format!(
                "Invalid signature for {}",
                pubkey
            )));
        }
        self.signatures.insert(pubkey, signature);
        Ok(())
    }

    pub fn signature_of(&self, pubkey: &Pubkey) -> Option<&Signature> {
        self.signatures.get(pubkey)
    }

    pub fn missing_signers(&self) -> Vec<Pubkey> {
        self.required_signers()
            .into_iter()
            .filter(|key| !self.signatures.contains_key(key))
            .collect()
    }

    pub fn is_fully_signed(&self) -> bool {
        self.fee_payer.is_some() && self.missing_signers().is_empty()
    }

    pub fn needs_signature_from(&self, pubkey: &Pubkey) -> bool {
        self.required_signers().contains(pubkey) && !self.signatures.contains_key(pubkey)
    }

    /// The fee payer's signature, once present.
    pub fn id(&self) -> Option<TxId> {
        self.fee_payer
            .and_then(|payer| self.signatures.get(&payer))
            .map(|sig| TxId(*sig))
    }

    pub fn serialize(&self) -> LedgerResult<Vec<u8>> {
        let message = self.message()?;
        let mut signatures = Vec::with_capacity(message.signers.len());
        for key in &message.signers {
            let signature = self.signatures.get(key).ok_or_else(|| {
                LedgerError::Transaction(format!("Missing signature for {}", key))
            })?;
            signatures.push(signature.to_bytes().to_vec());
        }

        bincode::serialize(&WireTransaction {
            signatures,
            message,
        })
        .map_err(|e| LedgerError::Encoding(format!("Transaction encoding failed: {}", e)))
    }

    pub fn deserialize(bytes: &[u8]) -> LedgerResult<Self> {
        let wire = decode_wire(bytes)?;
        let message = wire.message;
        if message.signers.first() != Some(&message.fee_payer) {
            return Err(LedgerError::Transaction(
                "First signer must be the fee payer".to_string(),
            ));
        }

        let mut tx = Transaction::new(message.instructions);
        tx.recent_blockhash = Some(message.recent_blockhash);
        tx.fee_payer = Some(message.fee_payer);
        tx.co_signers = message.signers[1..].to_vec();

        for (key, raw) in message.signers.iter().zip(wire.signatures.iter()) {
            tx.add_signature(*key, Signature::from_slice(raw)?)?;
        }
        Ok(tx)
    }
}

fn decode_wire(bytes: &[u8]) -> LedgerResult<WireTransaction> {
    let wire: WireTransaction = bincode::deserialize(bytes)
        .map_err(|e| LedgerError::Encoding(format!("Transaction decoding failed: {}", e)))?;
    if wire.signatures.len() != wire.message.signers.len() {
        return Err(LedgerError::Transaction(format!(
            "Expected {} signatures, found {}",
            wire.message.signers.len(),
            wire.signatures.len()
        )));
    }
    Ok(wire)
}

impl TxId {
    /// Recover the transaction id from raw signed bytes.
    pub fn from_wire(bytes: &[u8]) -> LedgerResult<Self> {
        let wire = decode_wire(bytes)?;
        let first = wire
            .signatures
            .first()
            .ok_or_else(|| LedgerError::Transaction("Transaction has no signatures".to_string()))?;
        Ok(TxId(Signature::from_slice(first)?))
    }
}
