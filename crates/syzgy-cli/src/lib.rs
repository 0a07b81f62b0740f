//! Command line front end for SyzgyDB: one subcommand per service operation,
//! plus resumable CSV ingestion and a quickstart demo.

use std::fmt::Write as _;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use syzgy_client::{
    Acknowledgement, ClientConfig, Collection, DistanceFunction, Document, Metadata, SearchQuery,
    SearchResult, SyzgyClient, SyzgyError,
};
use syzgy_ingest::{
    BulkLoader, CollectionSpec, ColumnRef, CsvOptions, IdSource, IngestConfig,
    IngestError, IngestReport, LogProgress, MappingConfig, MetadataColumns, RetryConfig,
    DEFAULT_BATCH_SIZE,
};
use thiserror::Error;
use tracing::info;

/// Top-level arguments
#[derive(Debug, Clone, Parser)]
#[command(
    name = "syzgy",
    version,
    about = "SyzgyDB command line client",
    long_about = "SyzgyDB command line client for managing collections, inserting and searching documents, and bulk loading CSV files"
)]
pub struct Cli {
    /// Overrides `SYZGY_URL`
    #[arg(
        long,
        global = true,
        help = "SyzgyDB base HTTP URL [env: SYZGY_URL] [default: http://localhost:8080]"
    )]
    pub server: Option<String>,
    /// Overrides `SYZGY_TIMEOUT_SECS`
    #[arg(
        long,
        global = true,
        help = "Request timeout in seconds [env: SYZGY_TIMEOUT_SECS] [default: 30]"
    )]
    pub timeout_secs: Option<u64>,
    /// Print raw JSON instead of text
    #[arg(long, global = true, help = "Print results as JSON")]
    pub json: bool,
    /// Operation to run
    #[command(subcommand)]
    pub command: Commands,
}

/// One subcommand per service operation, plus `ingest-csv` and `demo`
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    #[command(about = "Create a collection")]
    CreateCollection {
        #[arg(help = "Collection name")]
        name: String,
        #[arg(long, help = "Vector dimensionality")]
        vector_size: usize,
        #[arg(long, default_value_t = 64, help = "Quantization bits")]
        quantization: u32,
        #[arg(long, default_value = "cosine", help = "cosine or euclidean")]
        distance: DistanceFunction,
    },
    #[command(about = "List all collections")]
    ListCollections,
    #[command(about = "Show one collection")]
    GetCollection {
        #[arg(help = "Collection name")]
        name: String,
    },
    #[command(about = "Delete a collection and its documents")]
    DeleteCollection {
        #[arg(help = "Collection name")]
        name: String,
    },
    #[command(about = "Insert a single document")]
    Insert {
        #[arg(help = "Collection name")]
        collection: String,
        #[arg(long, help = "Document id")]
        id: u64,
        #[arg(long, help = "Text for the server to embed")]
        text: Option<String>,
        #[arg(
            long,
            value_delimiter = ',',
            allow_hyphen_values = true,
            help = "Comma separated vector, e.g. 0.1,0.2,0.3"
        )]
        vector: Option<Vec<f32>>,
        #[arg(long, help = "Metadata as a JSON object")]
        metadata: Option<String>,
    },
    #[command(about = "Replace a document's metadata")]
    UpdateMetadata {
        #[arg(help = "Collection name")]
        collection: String,
        #[arg(help = "Document id")]
        id: u64,
        #[arg(help = "Metadata as a JSON object")]
        metadata: String,
    },
    #[command(about = "Delete a single document")]
    DeleteDocument {
        #[arg(help = "Collection name")]
        collection: String,
        #[arg(help = "Document id")]
        id: u64,
    },
    #[command(about = "Search a collection by vector or text")]
    Search {
        #[arg(help = "Collection name")]
        collection: String,
        #[arg(long, help = "Query text")]
        text: Option<String>,
        #[arg(
            long,
            value_delimiter = ',',
            allow_hyphen_values = true,
            help = "Comma separated query vector"
        )]
        vector: Option<Vec<f32>>,
        #[arg(long, help = "Number of nearest neighbours")]
        k: Option<u32>,
        #[arg(long, help = "Maximum distance")]
        radius: Option<f64>,
        #[arg(long, help = "Maximum number of results")]
        limit: Option<u32>,
        #[arg(long, help = "Results to skip")]
        offset: Option<u32>,
        #[arg(long, help = "Search precision, e.g. exact")]
        precision: Option<String>,
        #[arg(long, help = "Metadata filter expression")]
        filter: Option<String>,
    },
    #[command(about = "List document ids in a collection")]
    Ids {
        #[arg(help = "Collection name")]
        collection: String,
    },
    #[command(about = "Bulk load a CSV file, resuming after rows already loaded")]
    IngestCsv {
        #[arg(help = "Collection name")]
        collection: String,
        #[arg(help = "CSV file")]
        file: PathBuf,
        #[arg(long, help = "Text column, by position or header name")]
        text_column: ColumnRef,
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, help = "Documents per insert request")]
        batch_size: usize,
        #[arg(long, help = "Integer id column; row numbers are used otherwise")]
        id_column: Option<ColumnRef>,
        #[arg(long, default_value_t = 0, conflicts_with = "id_column", help = "Added to row numbers to form ids")]
        id_offset: u64,
        #[arg(long, value_delimiter = ',', help = "Metadata columns; all other columns by default")]
        metadata_columns: Option<Vec<ColumnRef>>,
        #[arg(long, conflicts_with = "metadata_columns", help = "Send no metadata")]
        no_metadata: bool,
        #[arg(long, help = "Column holding a JSON array vector")]
        vector_column: Option<ColumnRef>,
        #[arg(long, default_value_t = ',', help = "Field delimiter")]
        delimiter: char,
        #[arg(long, help = "The file has no header row")]
        no_headers: bool,
        #[arg(long, help = "Read at most this many rows")]
        limit: Option<u64>,
        #[arg(long, default_value_t = 0, help = "Retries per batch on 429, 5xx or connection errors")]
        max_retries: usize,
        #[arg(long, requires = "vector_size", help = "Create the collection if it does not exist")]
        create: bool,
        #[arg(long, help = "Vector size for --create")]
        vector_size: Option<usize>,
        #[arg(long, default_value_t = 64, help = "Quantization for --create")]
        quantization: u32,
        #[arg(long, default_value = "cosine", help = "Distance function for --create")]
        distance: DistanceFunction,
        #[arg(long, help = "Map rows without sending anything")]
        dry_run: bool,
    },
    #[command(about = "Recreate a collection, insert three documents and search them")]
    Demo {
        #[arg(long, default_value = "pycollection", help = "Collection name")]
        collection: String,
    },
}

/// Anything that makes a command fail
#[derive(Debug, Error)]
pub enum CliError {
    /// Bad flag value caught before any request
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Service or transport failure
    #[error(transparent)]
    Client(#[from] SyzgyError),
    /// Bulk load failure
    #[error(transparent)]
    Ingest(#[from] IngestError),
    /// Output could not be rendered as JSON
    #[error("json encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Execute one command and return the text to print
pub async fn run(cli: Cli) -> Result<String, CliError> {
    let client = SyzgyClient::from_config(&client_config(&cli))?;
    let json = cli.json;

    match cli.command {
        Commands::CreateCollection {
            name,
            vector_size,
            quantization,
            distance,
        } => {
            let created = client
                .create_collection(&name, vector_size, quantization, distance)
                .await?;
            render(json, &created, |c| {
                format!(
                    "collection created: {} (vector_size {}, quantization {}, {})",
                    c.name, c.dimension_count, c.quantization, c.distance_function
                )
            })
        }
        Commands::ListCollections => {
            let collections = client.list_collections().await?;
            render(json, &collections, |collections| {
                if collections.is_empty() {
                    return "no collections".to_string();
                }
                collections
                    .iter()
                    .map(collection_line)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        Commands::GetCollection { name } => {
            let collection = client.get_collection(&name).await?;
            render(json, &collection, collection_details)
        }
        Commands::DeleteCollection { name } => {
            let ack = client.delete_collection(&name).await?;
            render(json, &ack, |ack| {
                acknowledged(ack, &format!("collection deleted: {name}"))
            })
        }
        Commands::Insert {
            collection,
            id,
            text,
            vector,
            metadata,
        } => {
            let mut document = Document::new(id);
            if let Some(text) = text {
                document = document.with_text(text);
            }
            if let Some(vector) = vector {
                document = document.with_vector(vector);
            }
            if let Some(raw) = metadata {
                document = document.with_metadata(parse_metadata(&raw)?);
            }
            let ack = client.insert_documents(&collection, &[document]).await?;
            render(json, &ack, |ack| {
                acknowledged(ack, &format!("document {id} inserted"))
            })
        }
        Commands::UpdateMetadata {
            collection,
            id,
            metadata,
        } => {
            let metadata = parse_metadata(&metadata)?;
            let ack = client
                .update_document_metadata(&collection, id, &metadata)
                .await?;
            render(json, &ack, |ack| {
                acknowledged(ack, &format!("metadata updated for document {id}"))
            })
        }
        Commands::DeleteDocument { collection, id } => {
            let ack = client.delete_document(&collection, id).await?;
            render(json, &ack, |ack| {
                acknowledged(ack, &format!("document {id} deleted"))
            })
        }
        Commands::Search {
            collection,
            text,
            vector,
            k,
            radius,
            limit,
            offset,
            precision,
            filter,
        } => {
            let query = SearchQuery {
                vector,
                text,
                k,
                radius,
                limit,
                offset,
                precision,
                filter,
            };
            if query.vector.is_none() && query.text.is_none() {
                return Err(CliError::InvalidArgument(
                    "search needs --text or --vector".to_string(),
                ));
            }
            let results = client.search(&collection, &query).await?;
            render(json, &results, |results| search_lines(results))
        }
        Commands::Ids { collection } => {
            let ids = client.list_document_ids(&collection).await?;
            render(json, &ids, |ids| {
                ids.iter()
                    .map(u64::to_string)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        Commands::IngestCsv {
            collection,
            file,
            text_column,
            batch_size,
            id_column,
            id_offset,
            metadata_columns,
            no_metadata,
            vector_column,
            delimiter,
            no_headers,
            limit,
            max_retries,
            create,
            vector_size,
            quantization,
            distance,
            dry_run,
        } => {
            let mut mapping = MappingConfig::new(text_column);
            mapping.id = match id_column {
                Some(column) => IdSource::Column(column),
                None => IdSource::RowNumber { offset: id_offset },
            };
            mapping.vector_column = vector_column;
            mapping.metadata = match (no_metadata, metadata_columns) {
                (true, _) => MetadataColumns::Omit,
                (false, Some(columns)) => MetadataColumns::Columns(columns),
                (false, None) => MetadataColumns::Remaining,
            };

            let delimiter = u8::try_from(delimiter).map_err(|_| {
                CliError::InvalidArgument(format!("delimiter `{delimiter}` is not a single byte"))
            })?;
            let mut config = IngestConfig::new(collection, mapping)
                .with_batch_size(batch_size)
                .with_csv(CsvOptions {
                    delimiter,
                    has_headers: !no_headers,
                })
                .dry_run(dry_run)
                .with_retry(RetryConfig::default().with_max_retries(max_retries));
            if let Some(limit) = limit {
                config = config.with_limit(limit);
            }
            if create {
                let vector_size = vector_size.ok_or_else(|| {
                    CliError::InvalidArgument("--create requires --vector-size".to_string())
                })?;
                config = config.create_if_missing(CollectionSpec {
                    vector_size,
                    quantization,
                    distance_function: distance,
                });
            }

            let mut loader = BulkLoader::new(&client, config)?.with_reporter(LogProgress);
            let report = loader.run_file(&file).await?;
            render(json, &report, ingest_summary)
        }
        Commands::Demo { collection } => {
            let results = demo(&client, &collection).await?;
            render(json, &results, |results| search_lines(results))
        }
    }
}

/// Connection settings from the environment, overridden by explicit flags
pub fn client_config(cli: &Cli) -> ClientConfig {
    let mut config = ClientConfig::from_env();
    if let Some(server) = &cli.server {
        config.base_url.clone_from(server);
    }
    if let Some(timeout_secs) = cli.timeout_secs {
        config = config.with_timeout(timeout_secs);
    }
    config
}

/// Recreate `collection` with 384 dimensions, insert three text documents
/// and search them.
pub async fn demo(
    client: &SyzgyClient,
    collection: &str,
) -> Result<Vec<SearchResult>, CliError> {
    match client.delete_collection(collection).await {
        Ok(_) => info!(collection, "deleted existing collection"),
        Err(err) if err.is_not_found() => {}
        Err(err) => return Err(err.into()),
    }
    client
        .create_collection(collection, 384, 64, DistanceFunction::Cosine)
        .await?;

    let documents: Vec<Document> = ["first", "second", "third"]
        .iter()
        .zip(1u64..)
        .map(|(ordinal, id)| {
            Document::new(id)
                .with_text(format!("This is the {ordinal} test record"))
                .with_metadata_entry("category", "test")
        })
        .collect();
    let handle = client.collection(collection);
    handle.insert(&documents).await?;

    Ok(handle
        .search(&SearchQuery::by_text("test record").with_k(2))
        .await?)
}

fn render<T, F>(json: bool, value: &T, human: F) -> Result<String, CliError>
where
    T: Serialize + ?Sized,
    F: FnOnce(&T) -> String,
{
    if json {
        Ok(serde_json::to_string_pretty(value)?)
    } else {
        Ok(human(value))
    }
}

fn parse_metadata(raw: &str) -> Result<Metadata, CliError> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(metadata)) => Ok(metadata),
        Ok(_) => Err(CliError::InvalidArgument(
            "metadata must be a JSON object".to_string(),
        )),
        Err(err) => Err(CliError::InvalidArgument(format!(
            "metadata is not valid JSON: {err}"
        ))),
    }
}

fn acknowledged(ack: &Acknowledgement, fallback: &str) -> String {
    ack.message.clone().unwrap_or_else(|| fallback.to_string())
}

fn collection_line(collection: &Collection) -> String {
    format!(
        "{}\t{} documents\t{} dims\t{}",
        collection.name,
        collection.document_count,
        collection.dimension_count,
        collection.distance_function
    )
}

fn collection_details(collection: &Collection) -> String {
    format!(
        "name: {}\ndocuments: {}\nvector size: {}\nquantization: {}\ndistance: {}",
        collection.name,
        collection.document_count,
        collection.dimension_count,
        collection.quantization,
        collection.distance_function
    )
}

fn search_lines(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No results found.".to_string();
    }
    let mut output = String::new();
    for (i, result) in results.iter().enumerate() {
        let _ = write!(
            output,
            "{}. id {} [distance: {:.4}]",
            i + 1,
            result.id,
            result.distance
        );
        if !result.metadata.is_empty() {
            let _ = write!(output, " {}", Value::Object(result.metadata.clone()));
        }
        output.push('\n');
    }
    let _ = write!(output, "Total: {} results", results.len());
    output
}

fn ingest_summary(report: &IngestReport) -> String {
    let verb = if report.dry_run { "would load" } else { "loaded" };
    format!(
        "{verb} {} documents into {} in {} batches (skipped {} rows already present)",
        report.documents_sent, report.collection, report.batches, report.skipped
    )
}
