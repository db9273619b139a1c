//! Search backends: Tavily for general web search, Google Custom Search for
//! the narrowly-scoped engines the planner can target.

use async_trait::async_trait;
use providers::http::{check_status, client, transport_error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::research::SearchResult;
use shared::settings::CustomEngine;
use shared::ResearchError;

const TAVILY_URL: &str = "https://api.tavily.com/search";
const CSE_URL: &str = "https://www.googleapis.com/customsearch/v1";

/// General-purpose engine; safe to call concurrently.
#[async_trait]
pub trait GeneralSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ResearchError>;
}

/// Quota-limited engine addressed per call by its engine config.
#[async_trait]
pub trait SpecializedSearch: Send + Sync {
    async fn search(
        &self,
        engine: &CustomEngine,
        query: &str,
    ) -> Result<Vec<SearchResult>, ResearchError>;
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'static str,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyHit>,
}

#[derive(Debug, Deserialize)]
struct TavilyHit {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

fn parse_tavily(body: &str) -> Result<Vec<SearchResult>, ResearchError> {
    let parsed: TavilyResponse =
        serde_json::from_str(body).map_err(|e| ResearchError::parse("Tavily response", e))?;
    Ok(parsed
        .results
        .into_iter()
        .map(|hit| SearchResult {
            title: hit.title,
            url: hit.url,
            snippet: hit.content,
            source: "Tavily".to_string(),
        })
        .collect())
}

pub struct TavilyClient {
    http: Client,
    api_key: String,
    max_results: u32,
}

impl TavilyClient {
    pub fn new(api_key: impl Into<String>, max_results: u32) -> Self {
        Self {
            http: client(),
            api_key: api_key.into(),
            max_results,
        }
    }
}

#[async_trait]
impl GeneralSearch for TavilyClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ResearchError> {
        tracing::info!(query, "tavily search");
        let req = TavilyRequest {
            api_key: &self.api_key,
            query,
            search_depth: "basic",
            max_results: self.max_results,
        };
        let resp = self
            .http
            .post(TAVILY_URL)
            .json(&req)
            .send()
            .await
            .map_err(|e| transport_error("Tavily", e))?;
        let body = check_status("Tavily", resp)
            .await?
            .text()
            .await
            .map_err(|e| transport_error("Tavily", e))?;
        parse_tavily(&body)
    }
}

#[derive(Debug, Deserialize)]
struct CseResponse {
    // Absent when the engine found nothing.
    #[serde(default)]
    items: Vec<CseItem>,
}

#[derive(Debug, Deserialize)]
struct CseItem {
    #[serde(default)]
    title: String,
    link: String,
    #[serde(default)]
    snippet: String,
}

fn cse_source_label(engine_id: &str) -> String {
    let prefix: String = engine_id.chars().take(5).collect();
    format!("CSE ({}...)", prefix)
}

fn parse_cse(engine_id: &str, body: &str) -> Result<Vec<SearchResult>, ResearchError> {
    let parsed: CseResponse = serde_json::from_str(body)
        .map_err(|e| ResearchError::parse("Custom Search response", e))?;
    let source = cse_source_label(engine_id);
    Ok(parsed
        .items
        .into_iter()
        .map(|item| SearchResult {
            title: item.title,
            url: item.link,
            snippet: item.snippet,
            source: source.clone(),
        })
        .collect())
}

pub struct GoogleCseClient {
    http: Client,
}

impl GoogleCseClient {
    pub fn new() -> Self {
        Self { http: client() }
    }
}

impl Default for GoogleCseClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpecializedSearch for GoogleCseClient {
    async fn search(
        &self,
        engine: &CustomEngine,
        query: &str,
    ) -> Result<Vec<SearchResult>, ResearchError> {
        tracing::info!(engine = %cse_source_label(&engine.id), query, "custom search");
        let resp = self
            .http
            .get(CSE_URL)
            .query(&[
                ("key", engine.key.as_str()),
                ("cx", engine.id.as_str()),
                ("q", query),
            ])
            .send()
            .await
            .map_err(|e| transport_error("Custom Search", e))?;
        let body = check_status("Custom Search", resp)
            .await?
            .text()
            .await
            .map_err(|e| transport_error("Custom Search", e))?;
        parse_cse(&engine.id, &body)
    }
}
