//! The document-store boundary.
//!
//! The pipeline only ever talks to the store through [`ThingStore`]: read a
//! thing, create a thing, update a thing. Everything else about the store
//! (persistence, validation, serialization of writes to the same id) is the
//! store's own business.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{content_hash, Metadata};
use crate::error::Result;

pub use http::HttpStore;
pub use memory::MemoryStore;

/// A document as it exists in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredThing {
    pub id: String,
    #[serde(default)]
    pub collection: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub body: String,
}

impl StoredThing {
    /// Content hash of the stored state, comparable against
    /// [`Document::content_hash`](crate::Document::content_hash).
    pub fn content_hash(&self) -> String {
        content_hash(&self.metadata, &self.body)
    }
}

/// Client contract for the document store.
///
/// All implementations must be `Send + Sync`; the pipeline issues concurrent
/// calls for distinct ids and relies on the store to serialize conflicting
/// writes to the same id.
#[async_trait]
pub trait ThingStore: Send + Sync {
    /// Fetch a thing. `Ok(None)` means not found; `Err` is reserved for
    /// transport or store-side failures.
    async fn get_thing(&self, collection: &str, id: &str) -> Result<Option<StoredThing>>;

    /// Create a thing that does not exist yet.
    async fn create_thing(
        &self,
        collection: &str,
        id: &str,
        metadata: &Metadata,
        body: &str,
    ) -> Result<StoredThing>;

    /// Update an existing thing. `None` fields are left untouched.
    async fn update_thing(
        &self,
        collection: &str,
        id: &str,
        metadata: Option<&Metadata>,
        body: Option<&str>,
    ) -> Result<StoredThing>;

    /// Human-readable backend name for logs.
    fn store_name(&self) -> &'static str;
}
