//! Resumable bulk loader
//!
//! The number of documents already in the target collection is taken as the
//! number of source rows already loaded. Those rows are skipped unread, the rest
//! are mapped and inserted in fixed-size batches. A failed batch stops the run;
//! running again resumes from the collection's new document count.
//!
//! This only holds while the source yields rows in the same order every time
//! and nobody else writes to the collection during a run.

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use syzgy_client::{Document, SyzgyClient, SyzgyError, Transport};
use tracing::{debug, info, warn};

use crate::config::IngestConfig;
use crate::error::{IngestError, IngestResult};
use crate::mapper::RowMapper;
use crate::progress::{NoProgress, ProgressEvent, ProgressReporter};
use crate::retry::with_retry;
use crate::source::CsvSource;

/// Loader lifecycle. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    /// Constructed, not yet run
    Idle,
    /// Looking up the resume point and skipping loaded rows
    Resuming,
    /// Mapping rows and inserting batches
    Streaming,
    /// Every remaining row was sent
    Done,
    /// Stopped on an error; rerun with a new loader to resume
    Failed,
}

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    /// Target collection
    pub collection: String,
    /// Rows skipped because the collection already held them
    pub skipped: u64,
    /// Rows read and mapped in this run
    pub rows_read: u64,
    /// Documents inserted (or that would have been, in a dry run)
    pub documents_sent: u64,
    /// Batches flushed, retries not counted
    pub batches: u64,
    /// Whether inserts were skipped
    pub dry_run: bool,
    /// When `run` was called
    pub started_at: DateTime<Utc>,
    /// When the last batch was flushed
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Counters {
    rows_read: u64,
    documents_sent: u64,
    batches: u64,
}

/// Streams CSV rows into one collection
pub struct BulkLoader<'a, T> {
    client: &'a SyzgyClient<T>,
    config: IngestConfig,
    reporter: Box<dyn ProgressReporter>,
    state: IngestState,
}

impl<'a, T: Transport> BulkLoader<'a, T> {
    /// Loader with a validated configuration and no progress output
    pub fn new(client: &'a SyzgyClient<T>, config: IngestConfig) -> IngestResult<Self> {
        config.validate()?;
        Ok(Self {
            client,
            config,
            reporter: Box::new(NoProgress),
            state: IngestState::Idle,
        })
    }

    /// Send progress events to `reporter`
    #[must_use]
    pub fn with_reporter(mut self, reporter: impl ProgressReporter + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> IngestState {
        self.state
    }

    /// Configuration the loader was built with
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Run the load to completion. A loader runs at most once.
    pub async fn run<R: Read>(&mut self, source: &mut CsvSource<R>) -> IngestResult<IngestReport> {
        if self.state != IngestState::Idle {
            return Err(IngestError::Config(format!(
                "loader already ran (state {:?})",
                self.state
            )));
        }

        let started_at = Utc::now();
        let result = self.load(source, started_at).await;
        self.state = match &result {
            Ok(_) => IngestState::Done,
            Err(err) => {
                warn!(collection = %self.config.collection, error = %err, "bulk load failed");
                IngestState::Failed
            }
        };
        result
    }

    /// Open `path` with the configured CSV options and run the load
    pub async fn run_file(&mut self, path: impl AsRef<Path>) -> IngestResult<IngestReport> {
        let path = path.as_ref();
        let mut source = match CsvSource::open(path, self.config.csv) {
            Ok(source) => source,
            Err(err) if self.state == IngestState::Idle => {
                warn!(path = %path.display(), error = %err, "cannot open source");
                self.state = IngestState::Failed;
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        self.run(&mut source).await
    }

    async fn load<R: Read>(
        &mut self,
        source: &mut CsvSource<R>,
        started_at: DateTime<Utc>,
    ) -> IngestResult<IngestReport> {
        self.state = IngestState::Resuming;
        let resume_at = self.resume_point().await?;
        let skipped = source.skip_rows(resume_at)?;
        if skipped < resume_at {
            warn!(
                collection = %self.config.collection,
                document_count = resume_at,
                rows = skipped,
                "collection holds more documents than the source has rows"
            );
        }
        self.reporter.report(&ProgressEvent::Resumed {
            collection: self.config.collection.clone(),
            skipped,
        });

        let mapper = RowMapper::new(&self.config.mapping, source.headers())?;
        self.state = IngestState::Streaming;

        let mut counters = Counters::default();
        let mut batch = Vec::with_capacity(self.config.batch_size);
        loop {
            if self.config.limit.is_some_and(|limit| counters.rows_read >= limit) {
                debug!(rows_read = counters.rows_read, "row limit reached");
                break;
            }
            let Some(row) = source.next_row()? else {
                break;
            };
            counters.rows_read += 1;
            batch.push(mapper.map(&row)?);

            if batch.len() >= self.config.batch_size {
                self.flush(&mut batch, &mut counters).await?;
            }
        }
        if !batch.is_empty() {
            self.flush(&mut batch, &mut counters).await?;
        }

        self.reporter.report(&ProgressEvent::Finished {
            documents_sent: counters.documents_sent,
            batches: counters.batches,
        });

        Ok(IngestReport {
            collection: self.config.collection.clone(),
            skipped,
            rows_read: counters.rows_read,
            documents_sent: counters.documents_sent,
            batches: counters.batches,
            dry_run: self.config.dry_run,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn resume_point(&self) -> IngestResult<u64> {
        let name = self.config.collection.as_str();
        match self.client.get_collection(name).await {
            Ok(collection) => Ok(collection.document_count),
            Err(err) if err.is_not_found() => {
                let Some(spec) = self.config.create else {
                    return Err(err.into());
                };
                if self.config.dry_run {
                    info!(collection = %name, "collection missing, dry run will not create it");
                } else {
                    self.client
                        .create_collection(
                            name,
                            spec.vector_size,
                            spec.quantization,
                            spec.distance_function,
                        )
                        .await?;
                }
                Ok(0)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn flush(&self, batch: &mut Vec<Document>, counters: &mut Counters) -> IngestResult<()> {
        let number = counters.batches + 1;
        let first_id = batch.first().map_or(0, |document| document.id);

        if !self.config.dry_run {
            let client = self.client;
            let collection = self.config.collection.as_str();
            let documents = batch.as_slice();
            with_retry(
                || client.insert_documents(collection, documents),
                &self.config.retry,
                SyzgyError::is_retryable,
            )
            .await
            .map_err(|source| IngestError::Insert {
                batch: number,
                first_id,
                source,
            })?;
        }

        counters.batches = number;
        counters.documents_sent += batch.len() as u64;
        self.reporter.report(&ProgressEvent::BatchFlushed {
            batch: number,
            documents: batch.len(),
            total_sent: counters.documents_sent,
        });
        batch.clear();
        Ok(())
    }
}
