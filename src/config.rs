//! Run configuration: a YAML file with pipeline settings, the store
//! endpoint, and the ordered list of mapping declarations.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ImportError, Result};
use crate::mapping::{Mapping, MappingSet};

/// Pipeline-wide tuning knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Bound on concurrent transform+upsert work within one page.
    #[serde(default = "default_max_in_flight_records")]
    pub max_in_flight_records: usize,
    /// Bound on mappings running at the same time. 1 = sequential, which is
    /// the right default for sources with per-account rate limits.
    #[serde(default = "default_max_concurrent_mappings")]
    pub max_concurrent_mappings: usize,
    /// How many individual error details to retain per mapping. Errors past
    /// the cap still count, they just lose their message.
    #[serde(default = "default_error_detail_cap")]
    pub error_detail_cap: usize,
}

fn default_max_in_flight_records() -> usize {
    8
}

fn default_max_concurrent_mappings() -> usize {
    1
}

fn default_error_detail_cap() -> usize {
    25
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_in_flight_records: default_max_in_flight_records(),
            max_concurrent_mappings: default_max_concurrent_mappings(),
            error_detail_cap: default_error_detail_cap(),
        }
    }
}

/// Where to write. The token is passed explicitly here rather than read from
/// ambient process state, so a run is fully determined by its configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    pub url: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub store: StoreConfig,
    pub mappings: Vec<Mapping>,
}

impl ImportConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ImportError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: ImportConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.settings.max_in_flight_records == 0 {
            return Err(ImportError::Config(
                "settings.max_in_flight_records must be at least 1".to_string(),
            ));
        }
        if self.settings.max_concurrent_mappings == 0 {
            return Err(ImportError::Config(
                "settings.max_concurrent_mappings must be at least 1".to_string(),
            ));
        }
        if self.mappings.is_empty() {
            return Err(ImportError::Config(
                "configuration declares no mappings".to_string(),
            ));
        }
        Ok(())
    }

    pub fn mapping_set(&self) -> Result<MappingSet> {
        MappingSet::new(self.mappings.clone())
    }
}
