//! Bulk load progress reporting.
//!
//! The loader emits one event when the resume point is known, one per flushed
//! batch and one at the end. Reporters must not fail the run.

use tracing::info;

/// A single progress event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Resume point resolved; `skipped` rows are already in the collection.
    Resumed {
        /// Target collection
        collection: String,
        /// Rows skipped
        skipped: u64,
    },
    /// One batch was accepted by the service (or counted, in a dry run).
    BatchFlushed {
        /// One-based batch number
        batch: u64,
        /// Documents in this batch
        documents: usize,
        /// Documents sent so far in this run
        total_sent: u64,
    },
    /// The source is exhausted or the row limit was reached.
    Finished {
        /// Documents sent in this run
        documents_sent: u64,
        /// Batches flushed in this run
        batches: u64,
    },
}

/// Receives progress events from a running load
pub trait ProgressReporter: Send + Sync {
    /// Handle one event. Must not panic.
    fn report(&self, event: &ProgressEvent);
}

/// Reports through `tracing` at info level
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Resumed {
                collection,
                skipped,
            } => info!(collection = %collection, skipped, "resuming bulk load"),
            ProgressEvent::BatchFlushed {
                batch,
                documents,
                total_sent,
            } => info!(batch, documents, total_sent, "batch inserted"),
            ProgressEvent::Finished {
                documents_sent,
                batches,
            } => info!(documents_sent, batches, "bulk load finished"),
        }
    }
}

/// No-op reporter
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: &ProgressEvent) {}
}
