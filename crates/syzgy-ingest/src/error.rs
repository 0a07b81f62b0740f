//! Error types for bulk ingestion

use syzgy_client::SyzgyError;
use thiserror::Error;

/// Ingestion error type
#[derive(Error, Debug)]
pub enum IngestError {
    /// A client call other than an insert failed.
    #[error("client error: {0}")]
    Client(#[from] SyzgyError),

    /// Malformed CSV
    #[error("csv error: {0}")]
    Source(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A row could not be turned into a document.
    #[error("row {row}: {message}")]
    Row {
        /// Zero-based data row
        row: u64,
        /// What was wrong with it
        message: String,
    },

    /// Inserting a batch failed; the run stops here.
    #[error("batch {batch} (first id {first_id}) failed: {source}")]
    Insert {
        /// One-based batch number in this run
        batch: u64,
        /// Id of the first document in the batch
        first_id: u64,
        /// Error from the final attempt
        source: SyzgyError,
    },

    /// Settings that cannot produce a load
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl IngestError {
    pub(crate) fn row(row: u64, message: impl Into<String>) -> Self {
        Self::Row {
            row,
            message: message.into(),
        }
    }
}

/// Result type for ingestion
pub type IngestResult<T> = Result<T, IngestError>;
