//! Client facade: one method per service endpoint

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{SyzgyError, SyzgyResult};
use crate::transport::{HttpTransport, Method, Transport};
use crate::types::{
    Acknowledgement, Collection, CollectionInfo, CreateCollection, DistanceFunction, Document,
    IdsResponse, Metadata, SearchQuery, SearchResponse, SearchResult,
};

const COLLECTIONS_PATH: &str = "/api/v1/collections";

/// Bytes escaped in a collection name so it stays one path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Stateless proxy for the SyzgyDB REST API.
///
/// Every method issues exactly one request and waits for its response.
/// Nothing is cached between calls.
#[derive(Debug, Clone)]
pub struct SyzgyClient<T = HttpTransport> {
    transport: T,
}

impl SyzgyClient<HttpTransport> {
    /// Client for `base_url` with default timeouts
    pub fn new(base_url: impl Into<String>) -> SyzgyResult<Self> {
        Self::from_config(&ClientConfig::new(base_url))
    }

    /// Client from explicit configuration
    pub fn from_config(config: &ClientConfig) -> SyzgyResult<Self> {
        Ok(Self::with_transport(HttpTransport::new(config)?))
    }
}

impl<T: Transport> SyzgyClient<T> {
    /// Client over any transport
    pub fn with_transport(transport: T) -> Self {
        Self { transport }
    }

    /// Underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Handle scoped to one collection
    pub fn collection(&self, name: impl Into<String>) -> CollectionRef<'_, T> {
        CollectionRef {
            client: self,
            name: name.into(),
        }
    }

    /// Create a collection.
    ///
    /// The service rejects existing names and invalid parameters with a
    /// [`SyzgyError::Service`].
    pub async fn create_collection(
        &self,
        name: &str,
        vector_size: usize,
        quantization: u32,
        distance_function: DistanceFunction,
    ) -> SyzgyResult<Collection> {
        collection_path(name)?;
        if vector_size == 0 {
            return Err(SyzgyError::InvalidArgument(
                "vector_size must be greater than zero".to_string(),
            ));
        }

        let request = CreateCollection {
            name: name.to_string(),
            vector_size,
            quantization,
            distance_function,
        };
        let body = serde_json::to_value(&request)?;
        let info: CollectionInfo = self.call(Method::POST, COLLECTIONS_PATH, Some(body)).await?;
        let collection = info.into_collection(Some(&request))?;

        info!(
            collection = %collection.name,
            dimension = collection.dimension_count,
            distance = %collection.distance_function,
            "collection created"
        );
        Ok(collection)
    }

    /// List every collection
    pub async fn list_collections(&self) -> SyzgyResult<Vec<Collection>> {
        let infos: Vec<CollectionInfo> = self.call(Method::GET, COLLECTIONS_PATH, None).await?;
        infos
            .into_iter()
            .map(|info| info.into_collection(None))
            .collect()
    }

    /// Describe one collection; unknown names fail with a 404 service error.
    pub async fn get_collection(&self, name: &str) -> SyzgyResult<Collection> {
        let path = collection_path(name)?;
        let info: CollectionInfo = self.call(Method::GET, &path, None).await?;
        info.into_collection(None)
    }

    /// Delete a collection. A second delete is passed to the server as is.
    pub async fn delete_collection(&self, name: &str) -> SyzgyResult<Acknowledgement> {
        let path = collection_path(name)?;
        let ack = self.acknowledge(Method::DELETE, &path, None).await?;
        info!(collection = %name, "collection deleted");
        Ok(ack)
    }

    /// Insert a batch of documents in a single request.
    ///
    /// Whatever the server reports for a partially failed batch is returned
    /// as is; the batch is never split.
    pub async fn insert_documents(
        &self,
        collection: &str,
        documents: &[Document],
    ) -> SyzgyResult<Acknowledgement> {
        let path = format!("{}/records", collection_path(collection)?);
        if documents.is_empty() {
            return Err(SyzgyError::InvalidArgument("no documents to insert".to_string()));
        }

        let body = serde_json::to_value(documents)?;
        debug!(collection, documents = documents.len(), "inserting documents");
        self.acknowledge(Method::POST, &path, Some(body)).await
    }

    /// Replace a document's metadata wholesale
    pub async fn update_document_metadata(
        &self,
        collection: &str,
        document_id: u64,
        metadata: &Metadata,
    ) -> SyzgyResult<Acknowledgement> {
        let path = format!(
            "{}/records/{document_id}/metadata",
            collection_path(collection)?
        );
        let body = serde_json::json!({ "metadata": metadata });
        self.acknowledge(Method::PUT, &path, Some(body)).await
    }

    /// Delete one document
    pub async fn delete_document(
        &self,
        collection: &str,
        document_id: u64,
    ) -> SyzgyResult<Acknowledgement> {
        let path = format!("{}/records/{document_id}", collection_path(collection)?);
        self.acknowledge(Method::DELETE, &path, None).await
    }

    /// Search a collection. Parameters left unset in `query` are not sent.
    pub async fn search(
        &self,
        collection: &str,
        query: &SearchQuery,
    ) -> SyzgyResult<Vec<SearchResult>> {
        let path = format!("{}/search", collection_path(collection)?);
        let body = serde_json::to_value(query)?;
        let response: SearchResponse = self.call(Method::POST, &path, Some(body)).await?;
        debug!(collection, results = response.results.len(), "search complete");
        Ok(response.results)
    }

    /// Ids of every document in a collection
    pub async fn list_document_ids(&self, collection: &str) -> SyzgyResult<Vec<u64>> {
        let path = format!("{}/ids", collection_path(collection)?);
        let ids: IdsResponse = self.call(Method::GET, &path, None).await?;
        Ok(ids.into_ids())
    }

    async fn call<R>(&self, method: Method, path: &str, body: Option<Value>) -> SyzgyResult<R>
    where
        R: DeserializeOwned,
    {
        let value = self.transport.request(method, path, body).await?;
        serde_json::from_value(value).map_err(|err| SyzgyError::Decode(err.to_string()))
    }

    async fn acknowledge(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> SyzgyResult<Acknowledgement> {
        let value = self.transport.request(method, path, body).await?;
        Acknowledgement::from_value(value)
    }
}

fn collection_path(name: &str) -> SyzgyResult<String> {
    if name.trim().is_empty() {
        return Err(SyzgyError::InvalidArgument(
            "collection name cannot be empty".to_string(),
        ));
    }
    let segment = utf8_percent_encode(name, PATH_SEGMENT);
    Ok(format!("{COLLECTIONS_PATH}/{segment}"))
}

/// A client bound to one collection name.
#[derive(Debug, Clone)]
pub struct CollectionRef<'a, T = HttpTransport> {
    client: &'a SyzgyClient<T>,
    name: String,
}

impl<T: Transport> CollectionRef<'_, T> {
    /// Collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current server-side description
    pub async fn info(&self) -> SyzgyResult<Collection> {
        self.client.get_collection(&self.name).await
    }

    /// Insert a batch of documents
    pub async fn insert(&self, documents: &[Document]) -> SyzgyResult<Acknowledgement> {
        self.client.insert_documents(&self.name, documents).await
    }

    /// Replace one document's metadata
    pub async fn update_metadata(
        &self,
        document_id: u64,
        metadata: &Metadata,
    ) -> SyzgyResult<Acknowledgement> {
        self.client
            .update_document_metadata(&self.name, document_id, metadata)
            .await
    }

    /// Delete one document
    pub async fn delete_document(&self, document_id: u64) -> SyzgyResult<Acknowledgement> {
        self.client.delete_document(&self.name, document_id).await
    }

    /// Run a search
    pub async fn search(&self, query: &SearchQuery) -> SyzgyResult<Vec<SearchResult>> {
        self.client.search(&self.name, query).await
    }

    /// All document ids
    pub async fn ids(&self) -> SyzgyResult<Vec<u64>> {
        self.client.list_document_ids(&self.name).await
    }

    /// Delete the whole collection
    pub async fn delete(&self) -> SyzgyResult<Acknowledgement> {
        self.client.delete_collection(&self.name).await
    }
}
