//! Ledger transaction submission and confirmation engine.

pub mod batch;
pub mod clock;
pub mod config;
pub mod ledger;
pub mod observability;
pub mod submission;

pub use batch::{BatchRequest, BatchSequencer, ExecutionPolicy, SequenceResult};
pub use config::schema::EngineConfig;
pub use ledger::{LedgerClient, RpcClient};
pub use submission::{SubmissionOutcome, SubmissionReceipt, Submitter};
