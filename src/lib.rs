//! cairn-importer: sync external data sources into a Cairn document store
//!
//! Supported sources:
//! - Offset/limit paginated REST APIs
//! - JSONL bulk exports

pub mod config;
pub mod document;
pub mod error;
pub mod mapping;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod sources;
pub mod store;
pub mod transform;

pub use config::{ImportConfig, Settings, StoreConfig};
pub use document::{slugify, Document, Metadata};
pub use error::{ImportError, Result};
pub use mapping::{Mapping, MappingPolicy, MappingSet, SourceSpec};
pub use pipeline::{apply_document, run_import_pipeline, PipelineOptions, WritePolicy};
pub use progress::ImportProgress;
pub use report::{MappingResult, MappingState, Outcome, PipelineRunResult};
pub use sources::{AuthMethod, BulkFileLoader, Loader, Page, RawRecord, RestApiLoader};
pub use store::{HttpStore, MemoryStore, StoredThing, ThingStore};
pub use transform::{FieldRule, FieldTransform, Transform};
