//! Worker pipeline for the semantic event pipeline.
//!
//! One sequential loop per process:
//! - pop a raw event from the queue
//! - enrich it into a semantic record
//! - buffer it until the batch is full or old enough
//! - commit the batch atomically, or move it to the dead-letter queue

pub mod buffer;
pub mod config;
pub mod dead_letter;
pub mod enrichment;
pub mod pipeline;
pub mod shutdown;

pub use buffer::BatchBuffer;
pub use config::WorkerConfig;
pub use dead_letter::{DeadLetterOutcome, DeadLetterRouter};
pub use enrichment::enrich;
pub use pipeline::*;
pub use shutdown::{Shutdown, ShutdownSignal};
