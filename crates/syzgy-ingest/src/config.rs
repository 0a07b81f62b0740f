//! Bulk load configuration

use std::fmt;
use std::str::FromStr;

use syzgy_client::DistanceFunction;

use crate::error::{IngestError, IngestResult};
use crate::retry::RetryConfig;

/// Default number of documents per insert request
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// A CSV column, by zero-based position or by header name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    /// Zero-based position
    Index(usize),
    /// Header name
    Name(String),
}

impl ColumnRef {
    /// Resolve to a position. Names need a header row.
    pub fn resolve(&self, headers: Option<&[String]>) -> IngestResult<usize> {
        match self {
            Self::Index(index) => Ok(*index),
            Self::Name(name) => {
                let headers = headers.ok_or_else(|| {
                    IngestError::Config(format!(
                        "column `{name}` is referenced by name but the source has no header row"
                    ))
                })?;
                headers
                    .iter()
                    .position(|header| header == name)
                    .ok_or_else(|| IngestError::Config(format!("no column named `{name}`")))
            }
        }
    }
}

impl FromStr for ColumnRef {
    type Err = IngestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() {
            return Err(IngestError::Config("empty column reference".to_string()));
        }
        Ok(value
            .parse::<usize>()
            .map_or_else(|_| Self::Name(value.to_string()), Self::Index))
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "#{index}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// Where a document id comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdSource {
    /// Zero-based data row number plus `offset`
    RowNumber {
        /// Added to every row number
        offset: u64,
    },
    /// An integer column
    Column(ColumnRef),
}

impl Default for IdSource {
    fn default() -> Self {
        Self::RowNumber { offset: 0 }
    }
}

/// Which columns become metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MetadataColumns {
    /// Every column not used for the id, text or vector
    #[default]
    Remaining,
    /// Exactly these columns
    Columns(Vec<ColumnRef>),
    /// No metadata at all
    Omit,
}

/// Row to document mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingConfig {
    /// Document id source
    pub id: IdSource,
    /// Required document text
    pub text_column: ColumnRef,
    /// Column holding a JSON array of numbers
    pub vector_column: Option<ColumnRef>,
    /// Columns copied into metadata
    pub metadata: MetadataColumns,
}

impl MappingConfig {
    /// Text from `text_column`, ids from row numbers, remaining columns as metadata
    pub fn new(text_column: ColumnRef) -> Self {
        Self {
            id: IdSource::default(),
            text_column,
            vector_column: None,
            metadata: MetadataColumns::default(),
        }
    }
}

/// CSV dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    /// Field separator byte
    pub delimiter: u8,
    /// First record holds column names
    pub has_headers: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_headers: true,
        }
    }
}

/// Parameters for creating the target collection when it does not exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSpec {
    /// Vector dimensionality
    pub vector_size: usize,
    /// Quantization bits
    pub quantization: u32,
    /// Similarity metric
    pub distance_function: DistanceFunction,
}

/// Everything a bulk load needs besides the client and the source
#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    /// Target collection
    pub collection: String,
    /// Documents per insert request
    pub batch_size: usize,
    /// Row to document mapping
    pub mapping: MappingConfig,
    /// Dialect used by [`BulkLoader::run_file`](crate::BulkLoader::run_file)
    pub csv: CsvOptions,
    /// Stop after this many rows have been read in this run
    pub limit: Option<u64>,
    /// Resolve the resume point and map rows but send nothing
    pub dry_run: bool,
    /// Create the collection with these parameters if it is missing
    pub create: Option<CollectionSpec>,
    /// Backoff for failed batches
    pub retry: RetryConfig,
}

impl IngestConfig {
    /// Configuration with defaults for everything but the target and the text column
    pub fn new(collection: impl Into<String>, mapping: MappingConfig) -> Self {
        Self {
            collection: collection.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            mapping,
            csv: CsvOptions::default(),
            limit: None,
            dry_run: false,
            create: None,
            retry: RetryConfig::default(),
        }
    }

    /// Set batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set CSV dialect
    pub fn with_csv(mut self, csv: CsvOptions) -> Self {
        self.csv = csv;
        self
    }

    /// Set row limit
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Enable dry run
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Create the collection when missing
    pub fn create_if_missing(mut self, spec: CollectionSpec) -> Self {
        self.create = Some(spec);
        self
    }

    /// Set retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Reject settings that cannot produce a load
    pub fn validate(&self) -> IngestResult<()> {
        if self.collection.trim().is_empty() {
            return Err(IngestError::Config("collection name cannot be empty".to_string()));
        }
        if self.batch_size == 0 {
            return Err(IngestError::Config("batch_size must be > 0".to_string()));
        }
        if let Some(spec) = &self.create {
            if spec.vector_size == 0 {
                return Err(IngestError::Config("vector_size must be > 0".to_string()));
            }
        }
        if self.retry.multiplier < 1.0 {
            return Err(IngestError::Config("retry multiplier must be >= 1.0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> Vec<String> {
        ["id", "date", "user", "text"].iter().map(|h| h.to_string()).collect()
    }

    #[test]
    fn column_refs_parse_as_index_or_name() {
        assert_eq!("5".parse::<ColumnRef>().unwrap(), ColumnRef::Index(5));
        assert_eq!(
            " text ".parse::<ColumnRef>().unwrap(),
            ColumnRef::Name("text".to_string())
        );
        assert!("".parse::<ColumnRef>().is_err());
    }

    #[test]
    fn names_resolve_against_headers() {
        let headers = headers();
        assert_eq!(
            ColumnRef::Name("user".into()).resolve(Some(headers.as_slice())).unwrap(),
            2
        );
        assert!(ColumnRef::Name("missing".into()).resolve(Some(headers.as_slice())).is_err());
        assert!(ColumnRef::Name("user".into()).resolve(None).is_err());
        assert_eq!(ColumnRef::Index(9).resolve(None).unwrap(), 9);
    }

    #[test]
    fn validate_rejects_zero_batch() {
        let config = IngestConfig::new("tweets", MappingConfig::new(ColumnRef::Index(5)))
            .with_batch_size(0);
        assert!(matches!(config.validate(), Err(IngestError::Config(_))));
    }

    #[test]
    fn defaults() {
        let config = IngestConfig::new("tweets", MappingConfig::new(ColumnRef::Index(5)));
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.mapping.id, IdSource::RowNumber { offset: 0 });
        assert_eq!(config.mapping.metadata, MetadataColumns::Remaining);
        assert_eq!(config.retry.max_retries, 0);
        assert!(config.csv.has_headers);
        assert!(config.validate().is_ok());
    }
}
