//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Submitter / Tracker / Simulator / Sequencer
//!     → events.rs (typed TxEvent into an injected EventSink)
//!     → TracingSink
//!         → logging.rs (structured log events)
//!         → metrics.rs (counters, histograms)
//! ```
//!
//! # Design Decisions
//! - The core never logs through ambient state; sinks are passed in
//! - Metrics are cheap (atomic increments), exporter is opt-in

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{Detection, EventSink, TracingSink, TxEvent};
