use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Fetch failed ({source_name}): {detail}")]
    Fetch {
        source_name: String,
        /// HTTP status when the failure came from a response, None for
        /// transport-level failures.
        status: Option<u16>,
        detail: String,
    },

    #[error("Transform failed for record '{record}': {reason}")]
    Transform { record: String, reason: String },

    #[error("Store error for '{collection}/{id}': {reason}")]
    Store {
        collection: String,
        id: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection failed: {0}")]
    Connection(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ImportError>;
