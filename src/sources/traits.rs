use async_trait::async_trait;

use crate::error::Result;

/// A raw record as yielded by a source, before any normalization.
pub type RawRecord = serde_json::Value;

/// One batch of records from a source, with the terminal flag.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<RawRecord>,
    pub done: bool,
}

impl Page {
    /// A page that is the last one.
    pub fn terminal(records: Vec<RawRecord>) -> Self {
        Self {
            records,
            done: true,
        }
    }

    /// A page with more to come.
    pub fn partial(records: Vec<RawRecord>) -> Self {
        Self {
            records,
            done: false,
        }
    }

    /// The empty terminal page.
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            done: true,
        }
    }
}

/// Trait for import sources (paginated REST APIs, bulk exports, etc.).
///
/// A loader is a stateful per-run iterator: the pipeline calls
/// [`next_page`](Loader::next_page) repeatedly until a page comes back with
/// `done = true`, and never calls again after that. Pagination state lives
/// inside the loader, so the pipeline stays decoupled from the source's
/// cursor protocol. Restarting a mapping means constructing a fresh loader.
#[async_trait]
pub trait Loader: Send + std::fmt::Debug {
    /// Fetch the next batch of records.
    ///
    /// Errors abort the page, not necessarily the mapping; the pipeline
    /// decides based on whether any page was obtained before the failure.
    async fn next_page(&mut self) -> Result<Page>;

    /// Human-readable source name for logs and error messages.
    fn source_name(&self) -> &str;
}
