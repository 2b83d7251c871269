use async_trait::async_trait;
use serde_json::Value;

use super::traits::{Loader, Page, RawRecord};
use crate::error::{ImportError, Result};

/// Authentication for REST sources.
#[derive(Debug, Clone, Default)]
pub enum AuthMethod {
    #[default]
    None,
    Bearer(String),
    Basic {
        username: String,
        password: Option<String>,
    },
}

/// Loader for offset/limit paginated REST APIs.
///
/// Advances an internal page counter and stops when the source returns fewer
/// records than requested, or when the configured `max_pages` ceiling is
/// reached. The ceiling bounds runaway pagination from a misbehaving source;
/// hitting it is a normal terminal state, not an error. After the terminal
/// page, further calls return the empty terminal page.
#[derive(Debug)]
pub struct RestApiLoader {
    client: reqwest::Client,
    url: url::Url,
    auth: AuthMethod,
    page_param: String,
    per_page_param: String,
    per_page: usize,
    records_path: Option<String>,
    max_pages: usize,
    page: usize,
    fetched_pages: usize,
    done: bool,
}

impl RestApiLoader {
    pub fn new(url: url::Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            auth: AuthMethod::None,
            page_param: "page".to_string(),
            per_page_param: "per_page".to_string(),
            per_page: 100,
            records_path: None,
            max_pages: 1000,
            page: 1,
            fetched_pages: 0,
            done: false,
        }
    }

    pub fn with_auth(mut self, auth: AuthMethod) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_per_page(mut self, per_page: usize) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    pub fn with_page_params(mut self, page_param: String, per_page_param: String) -> Self {
        self.page_param = page_param;
        self.per_page_param = per_page_param;
        self
    }

    /// JSON pointer to the record array inside the response body, for APIs
    /// that wrap their results in an envelope (e.g. `/data` or `/results/items`).
    pub fn with_records_path(mut self, pointer: String) -> Self {
        self.records_path = Some(pointer);
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    fn fetch_error(&self, status: Option<u16>, detail: impl Into<String>) -> ImportError {
        ImportError::Fetch {
            source_name: self.source_name().to_string(),
            status,
            detail: detail.into(),
        }
    }

    /// Record that a page of `record_count` results was obtained and decide
    /// whether pagination is finished.
    fn note_page(&mut self, record_count: usize) {
        self.fetched_pages += 1;
        self.page += 1;
        if record_count < self.per_page {
            self.done = true;
        } else if self.fetched_pages >= self.max_pages {
            tracing::debug!(
                url = %self.url,
                pages = self.fetched_pages,
                "Reached page ceiling, stopping pagination"
            );
            self.done = true;
        }
    }
}

/// Pull the record array out of a response payload.
fn extract_records(payload: Value, pointer: Option<&str>) -> Option<Vec<RawRecord>> {
    let target = match pointer {
        Some(p) => payload.pointer(p).cloned()?,
        None => payload,
    };
    match target {
        Value::Array(records) => Some(records),
        _ => None,
    }
}

#[async_trait]
impl Loader for RestApiLoader {
    async fn next_page(&mut self) -> Result<Page> {
        if self.done {
            return Ok(Page::empty());
        }

        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair(&self.page_param, &self.page.to_string())
            .append_pair(&self.per_page_param, &self.per_page.to_string());

        let mut request = self.client.get(url.clone());
        request = match &self.auth {
            AuthMethod::None => request,
            AuthMethod::Bearer(token) => request.bearer_auth(token),
            AuthMethod::Basic { username, password } => {
                request.basic_auth(username, password.as_deref())
            }
        };

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(self.fetch_error(
                Some(status),
                format!("HTTP {}: {}", status, truncate(&body, 200)),
            ));
        }

        let payload: Value = response.json().await?;
        let records = extract_records(payload, self.records_path.as_deref())
            .ok_or_else(|| self.fetch_error(None, "response did not contain a record array"))?;

        self.note_page(records.len());
        Ok(Page {
            records,
            done: self.done,
        })
    }

    fn source_name(&self) -> &str {
        "rest-api"
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn loader(per_page: usize, max_pages: usize) -> RestApiLoader {
        RestApiLoader::new(url::Url::parse("http://localhost:9999/items").unwrap())
            .with_per_page(per_page)
            .with_max_pages(max_pages)
    }

    #[test]
    fn test_short_page_terminates() {
        let mut l = loader(10, 1000);
        l.note_page(10);
        assert!(!l.done);
        l.note_page(3);
        assert!(l.done);
    }

    #[test]
    fn test_empty_page_terminates() {
        let mut l = loader(10, 1000);
        l.note_page(0);
        assert!(l.done);
    }

    #[test]
    fn test_page_ceiling_terminates_without_error() {
        let mut l = loader(10, 3);
        l.note_page(10);
        l.note_page(10);
        assert!(!l.done);
        l.note_page(10);
        assert!(l.done);
    }

    #[test]
    fn test_extract_records_top_level_array() {
        let records = extract_records(json!([{"id": 1}, {"id": 2}]), None).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_extract_records_pointer() {
        let payload = json!({"data": {"items": [{"id": 1}]}});
        let records = extract_records(payload, Some("/data/items")).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_extract_records_wrong_shape() {
        assert!(extract_records(json!({"data": 42}), Some("/data")).is_none());
        assert!(extract_records(json!({"data": []}), Some("/missing")).is_none());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 2), "he");
        assert_eq!(truncate("æøå", 2), "æø");
    }
}
