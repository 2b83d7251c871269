use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;

use super::{StoredThing, ThingStore};
use crate::document::Metadata;
use crate::error::{ImportError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// `ThingStore` backed by the Cairn REST API.
///
/// Endpoints:
/// - `GET    {base}/collections/{collection}/things/{id}`
/// - `POST   {base}/collections/{collection}/things`
/// - `PATCH  {base}/collections/{collection}/things/{id}`
pub struct HttpStore {
    client: reqwest::Client,
    base_url: url::Url,
    token: Option<String>,
}

#[derive(Serialize)]
struct CreateRequest<'a> {
    id: &'a str,
    metadata: &'a Metadata,
    body: &'a str,
}

#[derive(Serialize)]
struct UpdateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a Metadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
}

impl HttpStore {
    pub fn new(base_url: url::Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url,
            token: None,
        })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn things_url(&self, collection: &str) -> Result<url::Url> {
        let url = self
            .base_url
            .join(&format!("collections/{}/things", collection))?;
        Ok(url)
    }

    fn thing_url(&self, collection: &str, id: &str) -> Result<url::Url> {
        let url = self
            .base_url
            .join(&format!("collections/{}/things/{}", collection, id))?;
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn error_from_response(
        collection: &str,
        id: &str,
        response: reqwest::Response,
    ) -> ImportError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(200).collect();
        ImportError::Store {
            collection: collection.to_string(),
            id: id.to_string(),
            reason: format!("HTTP {}: {}", status, snippet),
        }
    }
}

#[async_trait]
impl ThingStore for HttpStore {
    async fn get_thing(&self, collection: &str, id: &str) -> Result<Option<StoredThing>> {
        let url = self.thing_url(collection, id)?;
        let response = self.authorize(self.client.get(url)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::error_from_response(collection, id, response).await);
        }

        let mut thing: StoredThing = response.json().await?;
        if thing.collection.is_empty() {
            thing.collection = collection.to_string();
        }
        Ok(Some(thing))
    }

    async fn create_thing(
        &self,
        collection: &str,
        id: &str,
        metadata: &Metadata,
        body: &str,
    ) -> Result<StoredThing> {
        let url = self.things_url(collection)?;
        let request = CreateRequest { id, metadata, body };
        let response = self
            .authorize(self.client.post(url).json(&request))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(collection, id, response).await);
        }

        let mut thing: StoredThing = response.json().await?;
        if thing.collection.is_empty() {
            thing.collection = collection.to_string();
        }
        Ok(thing)
    }

    async fn update_thing(
        &self,
        collection: &str,
        id: &str,
        metadata: Option<&Metadata>,
        body: Option<&str>,
    ) -> Result<StoredThing> {
        let url = self.thing_url(collection, id)?;
        let request = UpdateRequest { metadata, body };
        let response = self
            .authorize(self.client.patch(url).json(&request))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(collection, id, response).await);
        }

        let mut thing: StoredThing = response.json().await?;
        if thing.collection.is_empty() {
            thing.collection = collection.to_string();
        }
        Ok(thing)
    }

    fn store_name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> HttpStore {
        HttpStore::new(url::Url::parse("http://localhost:8080/api/").unwrap()).unwrap()
    }

    #[test]
    fn test_thing_url_layout() {
        let s = store();
        assert_eq!(
            s.thing_url("apps", "zapier-slack").unwrap().as_str(),
            "http://localhost:8080/api/collections/apps/things/zapier-slack"
        );
        assert_eq!(
            s.things_url("apps").unwrap().as_str(),
            "http://localhost:8080/api/collections/apps/things"
        );
    }

    #[test]
    fn test_update_request_omits_unset_fields() {
        let request = UpdateRequest {
            metadata: None,
            body: Some("text"),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"body":"text"}"#);
    }
}
