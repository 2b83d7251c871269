//! Mapping declarations: each one binds a source, a transform, a target
//! collection, and a write policy. Mappings are parsed once from the run
//! configuration and never mutated during a run.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{ImportError, Result};
use crate::sources::{AuthMethod, BulkFileLoader, Loader, RestApiLoader};
use crate::transform::FieldTransform;

/// Per-mapping write policy. CLI flags can widen (never narrow) these.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MappingPolicy {
    /// Treat any already-present document as final: no content comparison,
    /// no update.
    #[serde(default)]
    pub skip_existing: bool,
    /// Classify every record without writing.
    #[serde(default)]
    pub dry_run: bool,
    /// Pause between page fetches, for sources with unenforced rate limits.
    #[serde(default)]
    pub throttle_ms: Option<u64>,
}

fn default_per_page() -> usize {
    100
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_per_page_param() -> String {
    "per_page".to_string()
}

fn default_max_pages() -> usize {
    1000
}

/// Declarative source parameters. The pipeline builds a fresh [`Loader`]
/// from this per run; loaders are never shared across mappings or reruns.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSpec {
    /// Offset/limit paginated REST API.
    Rest {
        url: String,
        #[serde(default = "default_per_page")]
        per_page: usize,
        #[serde(default = "default_page_param")]
        page_param: String,
        #[serde(default = "default_per_page_param")]
        per_page_param: String,
        /// JSON pointer to the record array in the response, when wrapped.
        #[serde(default)]
        records_path: Option<String>,
        #[serde(default = "default_max_pages")]
        max_pages: usize,
        #[serde(default)]
        bearer_token: Option<String>,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        password: Option<String>,
    },
    /// JSONL bulk export on the local filesystem.
    Bulk { path: PathBuf },
}

impl SourceSpec {
    pub fn build_loader(&self) -> Result<Box<dyn Loader>> {
        match self {
            SourceSpec::Rest {
                url,
                per_page,
                page_param,
                per_page_param,
                records_path,
                max_pages,
                bearer_token,
                username,
                password,
            } => {
                let parsed = url::Url::parse(url)?;
                let mut loader = RestApiLoader::new(parsed)
                    .with_per_page(*per_page)
                    .with_page_params(page_param.clone(), per_page_param.clone())
                    .with_max_pages(*max_pages);
                if let Some(pointer) = records_path {
                    loader = loader.with_records_path(pointer.clone());
                }
                match (bearer_token, username) {
                    (Some(_), Some(_)) => {
                        return Err(ImportError::Config(format!(
                            "source '{}' declares both bearer_token and username",
                            url
                        )))
                    }
                    (Some(token), None) => {
                        loader = loader.with_auth(AuthMethod::Bearer(token.clone()));
                    }
                    (None, Some(user)) => {
                        loader = loader.with_auth(AuthMethod::Basic {
                            username: user.clone(),
                            password: password.clone(),
                        });
                    }
                    (None, None) => {}
                }
                Ok(Box::new(loader))
            }
            SourceSpec::Bulk { path } => Ok(Box::new(BulkFileLoader::new(path.clone())?)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SourceSpec::Rest { .. } => "rest",
            SourceSpec::Bulk { .. } => "bulk",
        }
    }
}

/// One configured import: source → transform → collection, plus policy.
#[derive(Debug, Clone, Deserialize)]
pub struct Mapping {
    pub id: String,
    pub collection: String,
    pub source: SourceSpec,
    pub transform: FieldTransform,
    #[serde(default)]
    pub policy: MappingPolicy,
}

/// The ordered set of mappings for a run, with unique ids.
#[derive(Debug, Clone)]
pub struct MappingSet {
    mappings: Vec<Mapping>,
}

impl MappingSet {
    pub fn new(mappings: Vec<Mapping>) -> Result<Self> {
        let mut seen = HashSet::new();
        for mapping in &mappings {
            if mapping.id.trim().is_empty() {
                return Err(ImportError::Config(
                    "mapping with an empty id".to_string(),
                ));
            }
            if mapping.collection.trim().is_empty() {
                return Err(ImportError::Config(format!(
                    "mapping '{}' has an empty collection",
                    mapping.id
                )));
            }
            if !seen.insert(mapping.id.clone()) {
                return Err(ImportError::Config(format!(
                    "duplicate mapping id '{}'",
                    mapping.id
                )));
            }
        }
        Ok(Self { mappings })
    }

    pub fn all(&self) -> &[Mapping] {
        &self.mappings
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Resolve an explicit selection of mapping ids, preserving configuration
    /// order. Requesting an unknown id is a configuration error, reported
    /// before any loader runs.
    pub fn select(&self, ids: &[String]) -> Result<Vec<&Mapping>> {
        for id in ids {
            if !self.mappings.iter().any(|m| &m.id == id) {
                return Err(ImportError::Config(format!(
                    "mapping '{}' is not configured",
                    id
                )));
            }
        }
        Ok(self
            .mappings
            .iter()
            .filter(|m| ids.iter().any(|id| id == &m.id))
            .collect())
    }
}
