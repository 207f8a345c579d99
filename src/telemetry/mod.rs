//! Live Telemetry Core
//!
//! The shared "latest reading", the mode that decides who may write it,
//! the mock generator and the publisher message handling.
//!
//! ## Components
//!
//! - **SharedState**: current reading + mode, one critical section for both
//! - **MockGenerator**: periodic synthetic readings, published every tick
//! - **PublisherHandler**: applies device readings and mode commands
//! - **BackgroundTask**: owned, cancellable task handle

pub mod generator;
pub mod ingest;
pub mod reading;
pub mod state;
pub mod task;

pub use generator::{MockGenerator, DEFAULT_INTERVAL};
pub use ingest::{
    IgnoreReason, IngestError, Ingress, PublishOutcome, PublishReply, PublisherHandler,
    PublisherMessage, ReadingFields, ReplyStatus,
};
pub use reading::{Mode, Reading};
pub use state::{SharedState, Snapshot};
pub use task::{BackgroundTask, TaskOutcome};
