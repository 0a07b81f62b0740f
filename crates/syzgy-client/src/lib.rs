//! Syzgy Client - async HTTP client for the SyzgyDB vector search service
//!
//! This crate provides:
//! - `SyzgyClient`, one method per REST endpoint
//! - `CollectionRef`, a handle scoped to one collection
//! - The `Transport` trait and its reqwest implementation
//! - Entity types: `Collection`, `Document`, `SearchQuery`, `SearchResult`

pub mod client;
pub mod config;
pub mod error;
pub mod transport;
pub mod types;

pub use client::{CollectionRef, SyzgyClient};
pub use config::ClientConfig;
pub use error::{SyzgyError, SyzgyResult};
pub use transport::{HttpTransport, Method, Transport};
pub use types::{
    Acknowledgement, Collection, CreateCollection, DistanceFunction, Document, Metadata,
    SearchQuery, SearchResult,
};

/// Prelude for common imports
pub mod prelude {
    pub use crate::client::{CollectionRef, SyzgyClient};
    pub use crate::error::{SyzgyError, SyzgyResult};
    pub use crate::transport::Transport;
    pub use crate::types::{Collection, DistanceFunction, Document, Metadata, SearchQuery, SearchResult};
}
