//! Deep reading: fetch readable full text for the selected sources.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use providers::http::{check_status, client, transport_error};
use reqwest::Client;
use shared::research::ArticleSummary;
use shared::ResearchError;

const JINA_READER_URL: &str = "https://r.jina.ai";

/// Something that turns a url into readable text.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, ResearchError>;
}

/// Jina reader proxy: `GET r.jina.ai/<url>` returns the page as plain text.
pub struct JinaReader {
    http: Client,
    api_key: String,
}

impl JinaReader {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: client(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl ContentSource for JinaReader {
    async fn fetch(&self, url: &str) -> Result<String, ResearchError> {
        tracing::info!(url, "deep read");
        let resp = self
            .http
            .get(format!("{}/{}", JINA_READER_URL, url))
            .bearer_auth(&self.api_key)
            .header("X-Retain-Images", "none")
            .send()
            .await
            .map_err(|e| transport_error("Jina", e))?;
        check_status("Jina", resp)
            .await?
            .text()
            .await
            .map_err(|e| transport_error("Jina", e))
    }
}

/// A source picked for deep reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadTarget {
    /// Position in the deduplicated result list
    pub original_index: usize,
    pub url: String,
}

pub struct ContentFetcher {
    source: Arc<dyn ContentSource>,
}

impl ContentFetcher {
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        Self { source }
    }

    /// Read every target concurrently. One summary per target, in input
    /// order; a failed read becomes a placeholder naming the url and reason.
    pub async fn read_all(&self, targets: &[ReadTarget]) -> Vec<ArticleSummary> {
        let reads = targets.iter().map(|target| async move {
            let content = match self.source.fetch(&target.url).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(url = %target.url, error = %e, "deep read failed");
                    placeholder(&target.url, &e)
                }
            };
            ArticleSummary {
                original_index: target.original_index,
                url: target.url.clone(),
                content,
            }
        });
        join_all(reads).await
    }
}

fn placeholder(url: &str, err: &ResearchError) -> String {
    format!("Error: Could not fetch content for {}. {}", url, err)
}
