use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{StoredThing, ThingStore};
use crate::document::Metadata;
use crate::error::{ImportError, Result};

/// In-process store used by tests and offline dry-runs.
#[derive(Default)]
pub struct MemoryStore {
    things: RwLock<HashMap<(String, String), StoredThing>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn thing_count(&self) -> usize {
        self.things.read().len()
    }

    fn store_error(collection: &str, id: &str, reason: &str) -> ImportError {
        ImportError::Store {
            collection: collection.to_string(),
            id: id.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl ThingStore for MemoryStore {
    async fn get_thing(&self, collection: &str, id: &str) -> Result<Option<StoredThing>> {
        let things = self.things.read();
        Ok(things
            .get(&(collection.to_string(), id.to_string()))
            .cloned())
    }

    async fn create_thing(
        &self,
        collection: &str,
        id: &str,
        metadata: &Metadata,
        body: &str,
    ) -> Result<StoredThing> {
        let mut things = self.things.write();
        let key = (collection.to_string(), id.to_string());
        if things.contains_key(&key) {
            return Err(Self::store_error(collection, id, "already exists"));
        }
        let thing = StoredThing {
            id: id.to_string(),
            collection: collection.to_string(),
            metadata: metadata.clone(),
            body: body.to_string(),
        };
        things.insert(key, thing.clone());
        Ok(thing)
    }

    async fn update_thing(
        &self,
        collection: &str,
        id: &str,
        metadata: Option<&Metadata>,
        body: Option<&str>,
    ) -> Result<StoredThing> {
        let mut things = self.things.write();
        let key = (collection.to_string(), id.to_string());
        let thing = things
            .get_mut(&key)
            .ok_or_else(|| Self::store_error(collection, id, "not found"))?;
        if let Some(metadata) = metadata {
            thing.metadata = metadata.clone();
        }
        if let Some(body) = body {
            thing.body = body.to_string();
        }
        Ok(thing.clone())
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}
