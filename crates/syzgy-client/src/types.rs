//! Entity model: collections, documents, search parameters and results

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{SyzgyError, SyzgyResult};

/// Free-form document metadata
pub type Metadata = serde_json::Map<String, Value>;

/// Distance function a collection is created with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DistanceFunction {
    /// Euclidean (L2) distance; server code `0`
    Euclidean,
    /// Cosine distance; server code `1`
    Cosine,
}

impl DistanceFunction {
    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Euclidean => "euclidean",
            Self::Cosine => "cosine",
        }
    }

    fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::Euclidean),
            1 => Some(Self::Cosine),
            _ => None,
        }
    }
}

impl fmt::Display for DistanceFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceFunction {
    type Err = SyzgyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "euclidean" => Ok(Self::Euclidean),
            "cosine" => Ok(Self::Cosine),
            other => Err(SyzgyError::InvalidArgument(format!(
                "unknown distance function `{other}`, expected cosine or euclidean"
            ))),
        }
    }
}

impl Serialize for DistanceFunction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DistanceFunction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Name(String),
            Code(u64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Name(name) => name.parse().map_err(de::Error::custom),
            Repr::Code(code) => Self::from_code(code)
                .ok_or_else(|| de::Error::custom(format!("unknown distance function code {code}"))),
        }
    }
}

/// A named collection held by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collection {
    /// Collection name, unique within the service
    pub name: String,
    /// Number of stored documents, maintained by the server
    pub document_count: u64,
    /// Vector dimensionality fixed at creation
    pub dimension_count: usize,
    /// Quantization bits fixed at creation
    pub quantization: u32,
    /// Distance function fixed at creation
    pub distance_function: DistanceFunction,
}

/// Body of a create-collection request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateCollection {
    /// Collection name
    pub name: String,
    /// Vector dimensionality
    pub vector_size: usize,
    /// Quantization bits
    pub quantization: u32,
    /// Distance function
    pub distance_function: DistanceFunction,
}

/// Collection description as the service sends it.
///
/// Different endpoints use different field names for the same value, so
/// every spelling is captured and reconciled in [`CollectionInfo::into_collection`].
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct CollectionInfo {
    name: Option<String>,
    collection_name: Option<String>,
    document_count: Option<u64>,
    num_vectors: Option<u64>,
    dimension_count: Option<usize>,
    vector_size: Option<usize>,
    quantization: Option<u32>,
    distance_function: Option<DistanceFunction>,
}

impl CollectionInfo {
    /// Merge with the creation request, if any, for fields the response omits.
    pub(crate) fn into_collection(self, requested: Option<&CreateCollection>) -> SyzgyResult<Collection> {
        let name = self
            .name
            .or(self.collection_name)
            .or_else(|| requested.map(|r| r.name.clone()))
            .ok_or_else(|| SyzgyError::Decode("collection response has no name".to_string()))?;
        let distance_function = self
            .distance_function
            .or_else(|| requested.map(|r| r.distance_function))
            .ok_or_else(|| {
                SyzgyError::Decode(format!("collection `{name}` has no distance_function"))
            })?;

        Ok(Collection {
            document_count: self.document_count.or(self.num_vectors).unwrap_or(0),
            dimension_count: self
                .dimension_count
                .or(self.vector_size)
                .or_else(|| requested.map(|r| r.vector_size))
                .unwrap_or(0),
            quantization: self
                .quantization
                .or_else(|| requested.map(|r| r.quantization))
                .unwrap_or(0),
            distance_function,
            name,
        })
    }
}

/// One record stored in a collection.
///
/// Unset optional fields are left out of the serialized form entirely;
/// `id` is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Caller-assigned identifier
    pub id: u64,
    /// Embedding; its length must match the collection's dimension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
    /// Text the server embeds when no vector is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Arbitrary metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Document {
    /// Create a document with only an id
    pub fn new(id: u64) -> Self {
        Self {
            id,
            vector: None,
            text: None,
            metadata: None,
        }
    }

    /// Set the vector
    pub fn with_vector(mut self, vector: Vec<f32>) -> Self {
        self.vector = Some(vector);
        self
    }

    /// Set the text
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Replace the metadata
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Add one metadata entry
    pub fn with_metadata_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(Metadata::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Search parameters. Every field is optional and unset fields are not
/// sent, so the server applies its own defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchQuery {
    /// Query vector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
    /// Query text, embedded server-side
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Number of nearest neighbours
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<u32>,
    /// Maximum distance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    /// Page size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Page offset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    /// Search precision hint, e.g. `exact`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<String>,
    /// Metadata filter expression
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl SearchQuery {
    /// Empty query
    pub fn new() -> Self {
        Self::default()
    }

    /// Query by vector
    pub fn by_vector(vector: Vec<f32>) -> Self {
        Self {
            vector: Some(vector),
            ..Self::default()
        }
    }

    /// Query by text
    pub fn by_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Add a vector (hybrid search when text is also set)
    pub fn with_vector(mut self, vector: Vec<f32>) -> Self {
        self.vector = Some(vector);
        self
    }

    /// Add text (hybrid search when a vector is also set)
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set k
    pub fn with_k(mut self, k: u32) -> Self {
        self.k = Some(k);
        self
    }

    /// Set radius
    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = Some(radius);
        self
    }

    /// Set limit
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set offset
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Set precision
    pub fn with_precision(mut self, precision: impl Into<String>) -> Self {
        self.precision = Some(precision.into());
        self
    }

    /// Set filter
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// A matched document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Matched document id
    pub id: u64,
    /// Metadata of the matched document
    #[serde(default, deserialize_with = "null_as_empty")]
    pub metadata: Metadata,
    /// Distance to the query; lower is more similar
    pub distance: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub(crate) results: Vec<SearchResult>,
}

/// Reply to a mutating call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Acknowledgement {
    /// Human-readable message, when the server sends one
    #[serde(default)]
    pub message: Option<String>,
    /// Any other fields of the reply
    #[serde(flatten)]
    pub extra: Metadata,
}

impl Acknowledgement {
    /// Decode leniently: no body, a bare string, or an object.
    pub(crate) fn from_value(value: Value) -> SyzgyResult<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::String(message) => Ok(Self {
                message: Some(message),
                extra: Metadata::new(),
            }),
            Value::Object(_) => serde_json::from_value(value).map_err(SyzgyError::from),
            other => {
                let mut extra = Metadata::new();
                extra.insert("value".to_string(), other);
                Ok(Self {
                    message: None,
                    extra,
                })
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum IdsResponse {
    Bare(Vec<u64>),
    Wrapped { ids: Vec<u64> },
}

impl IdsResponse {
    pub(crate) fn into_ids(self) -> Vec<u64> {
        match self {
            Self::Bare(ids) | Self::Wrapped { ids } => ids,
        }
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Metadata, D::Error> {
    Ok(Option::<Metadata>::deserialize(deserializer)?.unwrap_or_default())
}
