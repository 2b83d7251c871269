//! The normalized document written to the store, and the content hashing
//! used to detect whether a rerun actually changed anything.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Structured attributes of a document. `serde_json::Map` keeps keys sorted,
/// so serializing it is canonical and safe to hash.
pub type Metadata = serde_json::Map<String, Value>;

/// A normalized document headed for the store: a metadata header plus a body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub collection: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub body: String,
}

impl Document {
    /// Hash of metadata + body. Two documents with the same hash are treated
    /// as identical by the upsert decision, regardless of how their metadata
    /// maps were assembled.
    pub fn content_hash(&self) -> String {
        content_hash(&self.metadata, &self.body)
    }
}

/// SHA-256 over the canonical JSON of the metadata map and the raw body,
/// separated by a NUL byte so `({"a": "b"}, "c")` and `({"a": "bc"}, "")`
/// cannot collide on concatenation.
pub fn content_hash(metadata: &Metadata, body: &str) -> String {
    let mut hasher = Sha256::new();
    let header = serde_json::to_vec(metadata).unwrap_or_default();
    hasher.update(&header);
    hasher.update([0u8]);
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

/// Deterministic lowercase-dash slug, used by transforms that derive a
/// document id from a title-like field.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            for lower in c.to_lowercase() {
                slug.push(lower);
            }
        } else {
            pending_dash = true;
        }
    }
    slug
}
