//! Trend sources
//!
//! A source is polled once per run and yields raw feed items. Each source
//! fails independently; the detector records the error and moves on.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::services::config::SourceConfig;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },
    #[error("request to {location} failed: {message}")]
    Http { location: String, message: String },
    #[error("feed {location} is not valid JSON: {message}")]
    Parse { location: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedItem {
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default, alias = "description")]
    pub summary: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedDocument {
    Items(Vec<FeedItem>),
    Wrapped { items: Vec<FeedItem> },
}

impl FeedDocument {
    fn into_items(self) -> Vec<FeedItem> {
        match self {
            FeedDocument::Items(items) => items,
            FeedDocument::Wrapped { items } => items,
        }
    }
}

pub fn parse_feed(location: &str, bytes: &[u8]) -> Result<Vec<FeedItem>, SourceError> {
    serde_json::from_slice::<FeedDocument>(bytes)
        .map(FeedDocument::into_items)
        .map_err(|e| SourceError::Parse {
            location: location.to_string(),
            message: e.to_string(),
        })
}

#[async_trait]
pub trait TrendSource: Send + Sync {
    fn name(&self) -> &str;

    /// Category assigned to every item of this source.
    fn category(&self) -> &str;

    async fn fetch(&self) -> Result<Vec<FeedItem>, SourceError>;
}

/// JSON feed read from a local path or fetched over `http(s)`.
pub struct JsonFeedSource {
    config: SourceConfig,
    client: reqwest::Client,
}

impl JsonFeedSource {
    pub fn new(config: SourceConfig, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("skybeam/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    fn is_remote(&self) -> bool {
        let location = self.config.location.to_ascii_lowercase();
        location.starts_with("http://") || location.starts_with("https://")
    }

    async fn fetch_remote(&self) -> Result<Vec<u8>, SourceError> {
        let http_err = |message: String| SourceError::Http {
            location: self.config.location.clone(),
            message,
        };
        let response = self
            .client
            .get(&self.config.location)
            .send()
            .await
            .map_err(|e| http_err(e.to_string()))?;
        if !response.status().is_success() {
            return Err(http_err(format!("status {}", response.status())));
        }
        let bytes = response.bytes().await.map_err(|e| http_err(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl TrendSource for JsonFeedSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn category(&self) -> &str {
        &self.config.category
    }

    async fn fetch(&self) -> Result<Vec<FeedItem>, SourceError> {
        let bytes = if self.is_remote() {
            self.fetch_remote().await?
        } else {
            tokio::fs::read(&self.config.location)
                .await
                .map_err(|source| SourceError::Io {
                    location: self.config.location.clone(),
                    source,
                })?
        };
        parse_feed(&self.config.location, &bytes)
    }
}

pub fn build_sources(configs: &[SourceConfig], timeout: Duration) -> Vec<Box<dyn TrendSource>> {
    configs
        .iter()
        .cloned()
        .map(|c| Box::new(JsonFeedSource::new(c, timeout)) as Box<dyn TrendSource>)
        .collect()
}
