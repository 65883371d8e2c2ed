//! Remote seed catalog client.
//!
//! Fetches the initial product list from a public catalog API exactly once
//! per call. There is no retry: the store decides when to try again.

use std::future::Future;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use stockroom_core::ProductDraft;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors that can occur when fetching the seed catalog.
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The body was not a list of catalog items.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// `images` arrives either as one URL or as a list of URLs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SeedImages {
    One(String),
    Many(Vec<String>),
}

impl Default for SeedImages {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

/// A product as published by the remote catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedItem {
    pub title: String,
    pub price: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub images: SeedImages,
}

impl SeedItem {
    /// Map the remote record onto a local product draft.
    ///
    /// Stock is not published remotely, so the caller supplies it.
    #[must_use]
    pub fn into_draft(self, quantity: u32) -> ProductDraft {
        ProductDraft {
            id: None,
            name: self.title,
            description: self.description,
            price: self.price.max(Decimal::ZERO),
            quantity,
        }
    }
}

/// Anything that can supply the seed catalog.
pub trait SeedSource: Send + Sync {
    /// Fetch the seed list with a single attempt.
    fn fetch_seed_catalog(&self) -> impl Future<Output = Result<Vec<SeedItem>, SourceError>> + Send;
}

/// Seed source backed by an HTTP GET against a fixed endpoint.
#[derive(Debug, Clone)]
pub struct HttpSeedSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSeedSource {
    /// Create a client for `url` with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("stockroom/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// The endpoint this source reads from.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl SeedSource for HttpSeedSource {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch_seed_catalog(&self) -> Result<Vec<SeedItem>, SourceError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SourceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let items: Vec<SeedItem> = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        debug!(count = items.len(), "Fetched seed catalog");
        Ok(items)
    }
}
