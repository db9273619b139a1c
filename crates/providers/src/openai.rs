use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::agent_api::{ChatMessage, StreamChunk};
use shared::settings::{EndpointConfig, ProviderKind};
use shared::ResearchError;
use tokio::sync::mpsc::UnboundedSender;
use url::Url;

use crate::http::{check_status, client, transport_error};
use crate::sse::{decode_body, WireFormat};
use crate::{ChatProvider, GenerateOptions};

const SERVICE: &str = "OpenAI";
const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const COMPLETIONS_PATH: &str = "/v1/chat/completions";

// ── Request types ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

// ── Non-streaming response types ─────────────────────────────────────

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

// ── Streaming response types ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct OpenAIStreamResponse {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChoice {
    #[serde(default)]
    delta: Option<OpenAIStreamDelta>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Text delta of one streamed chat-completion payload.
pub(crate) fn stream_text(payload: &str) -> Result<Option<String>, serde_json::Error> {
    let chunk: OpenAIStreamResponse = serde_json::from_str(payload)?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta)
        .and_then(|d| d.content))
}

/// Resolve the completions endpoint against the configured base. The path is
/// absolute, so any path on the base is replaced, not appended to.
fn completions_url(base_url: &str) -> Result<Url, ResearchError> {
    let base = match base_url.trim() {
        "" => DEFAULT_BASE_URL,
        custom => custom,
    };
    Url::parse(base)
        .and_then(|u| u.join(COMPLETIONS_PATH))
        .map_err(|e| ResearchError::validation(format!("invalid base URL '{}': {}", base, e)))
}

// ── Client ───────────────────────────────────────────────────────────

pub struct OpenAIClient {
    http: Client,
    name: String,
    auth_token: String,
    model: String,
    url: Url,
}

impl OpenAIClient {
    pub fn from_endpoint(endpoint: &EndpointConfig) -> Result<Self, ResearchError> {
        Ok(Self {
            http: client(),
            name: endpoint.name.clone(),
            auth_token: endpoint.api_key.clone(),
            model: endpoint.model.clone(),
            url: completions_url(&endpoint.base_url)?,
        })
    }

    async fn send(
        &self,
        messages: &[ChatMessage],
        options: GenerateOptions,
        stream: bool,
    ) -> Result<reqwest::Response, ResearchError> {
        let req = OpenAIRequest {
            model: &self.model,
            messages,
            stream,
            response_format: ResponseFormat {
                format_type: if options.strict_json {
                    "json_object"
                } else {
                    "text"
                },
            },
        };
        tracing::debug!(endpoint = %self.name, model = %self.model, stream, "openai request");
        let resp = self
            .http
            .post(self.url.clone())
            .bearer_auth(&self.auth_token)
            .json(&req)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;
        check_status(SERVICE, resp).await
    }
}

#[async_trait]
impl ChatProvider for OpenAIClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: GenerateOptions,
    ) -> Result<String, ResearchError> {
        let resp = self.send(messages, options, false).await?;
        let body: OpenAIResponse = resp
            .json()
            .await
            .map_err(|e| ResearchError::parse("OpenAI response", e))?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ResearchError::parse("OpenAI response", "no message content"))
    }

    async fn generate_stream(
        &self,
        messages: &[ChatMessage],
        tx: UnboundedSender<StreamChunk>,
    ) -> Result<(), ResearchError> {
        let resp = self.send(messages, GenerateOptions::default(), true).await?;
        let deltas = decode_body(resp.bytes_stream(), WireFormat::OpenAi, SERVICE);
        futures::pin_mut!(deltas);
        while let Some(delta) = deltas.next().await {
            let _ = tx.send(StreamChunk::Text(delta?));
        }
        let _ = tx.send(StreamChunk::Done);
        Ok(())
    }
}
