//! Submission and confirmation engine.
//!
//! # Data Flow
//! ```text
//! raw signed bytes
//!     → submitter.rs (send, resend loop)
//!     → tracker.rs (push ∥ poll ∥ timeout, first result wins)
//!     → simulator.rs (only when the tracker timed out)
//!     → outcome.rs (SubmissionReceipt)
//! ```
//!
//! # Design Decisions
//! - Transient status query failures never end tracking
//! - Rejection stops the resend loop immediately
//! - Timeout is the only cancellation trigger
//! - A timed-out transaction may still land; callers decide whether to rebuild

pub mod outcome;
pub mod simulator;
pub mod submitter;
pub mod tracker;

pub use outcome::{Confirmation, SubmissionOutcome, SubmissionReceipt, TimeoutDiagnostic};
pub use simulator::Simulator;
pub use submitter::Submitter;
pub use tracker::ConfirmationTracker;
