//! reqwest implementation of the gallery collaborators.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::source::{FavoritesApi, GallerySource, ListRequest, ToggleOutcome};
use crate::config::EndpointConfig;
use crate::error::BrowserError;
use crate::state::data::{favorites_from_value, Item, Page};

#[derive(Clone)]
pub struct HttpGallery {
    endpoint: EndpointConfig,
    client: reqwest::Client,
}

impl fmt::Debug for HttpGallery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpGallery")
            .field("base_url", &self.endpoint.base_url)
            .finish()
    }
}

impl HttpGallery {
    pub fn new(endpoint: EndpointConfig) -> Result<Self, BrowserError> {
        let client = reqwest::Client::builder()
            .user_agent(endpoint.user_agent.clone())
            .timeout(Duration::from_secs(endpoint.request_timeout_secs))
            .build()?;

        Ok(Self { endpoint, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.base_url.trim_end_matches('/'), path)
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, BrowserError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl GallerySource for HttpGallery {
    async fn list(&self, request: &ListRequest) -> Result<Page, BrowserError> {
        let url = self.url(&self.endpoint.list_path);
        debug!(cursor = ?request.cursor, "requesting gallery page");

        let response = self.client.get(&url).query(&request.query_pairs()).send().await?;
        Page::from_value(Self::read_json(response).await?)
    }
}

#[async_trait]
impl FavoritesApi for HttpGallery {
    async fn all_favorites(&self) -> Result<Vec<Item>, BrowserError> {
        let url = self.url(&self.endpoint.favorites_path);
        let response = self.client.get(&url).send().await?;
        favorites_from_value(Self::read_json(response).await?)
    }

    async fn toggle(&self, item: &Item) -> Result<ToggleOutcome, BrowserError> {
        let url = self.url(&self.endpoint.toggle_path);
        let response = self.client.post(&url).json(&json!({ "item": item })).send().await?;
        let status = response.status();
        let body = response.text().await?;

        // Rejections arrive as a 4xx carrying the usual status document
        match serde_json::from_str::<Value>(&body) {
            Ok(value) if value.get("status").is_some() => ToggleOutcome::from_value(&value),
            _ if !status.is_success() => Err(status_error(status, &body)),
            Ok(value) => ToggleOutcome::from_value(&value),
            Err(err) => Err(err.into()),
        }
    }
}

fn status_error(status: reqwest::StatusCode, body: &str) -> BrowserError {
    BrowserError::Status {
        status: status.to_string(),
        body: truncate_for_error(body),
    }
}

fn truncate_for_error(body: &str) -> String {
    const MAX_LEN: usize = 200;
    if body.chars().count() <= MAX_LEN {
        body.to_owned()
    } else {
        format!("{}...", body.chars().take(MAX_LEN).collect::<String>())
    }
}
