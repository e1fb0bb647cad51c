//! Batch sequencing subsystem.
//!
//! # Data Flow
//! ```text
//! BatchRequest
//!     → sequencer.rs (build, co-sign, batched wallet signing)
//!     → policy.rs (sequential | parallel | stop-on-failure)
//!     → Submitter per transaction
//!     → SequenceResult
//! ```
//!
//! # Design Decisions
//! - One blockhash per batch; every transaction shares its expiry window
//! - Wallet signing is a single batched call, never concurrent requests
//! - Parallel fan-out is unbounded

pub mod policy;
pub mod sequencer;

pub use policy::ExecutionPolicy;
pub use sequencer::{BatchRequest, BatchSequencer, SequenceResult};
