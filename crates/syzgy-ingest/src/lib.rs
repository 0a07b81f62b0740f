//! Syzgy Ingest - resumable CSV bulk loading into SyzgyDB
//!
//! This crate provides:
//! - `CsvSource`, a streaming row reader
//! - `RowMapper`, turning rows into documents
//! - `BulkLoader`, which resumes from the collection's document count and
//!   inserts the remaining rows in batches
//! - Progress reporting and bounded retry for failed batches

pub mod config;
pub mod error;
pub mod loader;
pub mod mapper;
pub mod progress;
pub mod retry;
pub mod source;

pub use config::{
    CollectionSpec, ColumnRef, CsvOptions, IdSource, IngestConfig, MappingConfig,
    MetadataColumns, DEFAULT_BATCH_SIZE,
};
pub use error::{IngestError, IngestResult};
pub use loader::{BulkLoader, IngestReport, IngestState};
pub use mapper::RowMapper;
pub use progress::{LogProgress, NoProgress, ProgressEvent, ProgressReporter};
pub use retry::RetryConfig;
pub use source::{CsvSource, Row};
