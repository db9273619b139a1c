use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::agent_api::{ChatMessage, StreamChunk};
use shared::settings::{EndpointConfig, ProviderKind};
use shared::ResearchError;
use tokio::sync::mpsc::UnboundedSender;

use crate::http::{check_status, client, transport_error};
use crate::sse::{decode_body, WireFormat};
use crate::{ChatProvider, GenerateOptions};

const SERVICE: &str = "Gemini";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GenerationConfig,
}

// Same shape for whole responses and for each streamed payload.
#[derive(Debug, Default, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

/// Text delta of one streamed Gemini payload.
pub(crate) fn stream_text(payload: &str) -> Result<Option<String>, serde_json::Error> {
    let chunk: GeminiResponse = serde_json::from_str(payload)?;
    Ok(chunk.first_text())
}

fn build_request(messages: &[ChatMessage], options: GenerateOptions) -> GeminiRequest {
    let mut system_prompt = String::new();
    let mut contents: Vec<GeminiContent> = Vec::new();
    for m in messages {
        if m.role == "system" {
            if !system_prompt.is_empty() {
                system_prompt.push_str("\n\n");
            }
            system_prompt.push_str(&m.content);
        } else {
            // Gemini only knows "user" | "model".
            let role = if m.role == "assistant" { "model" } else { "user" };
            contents.push(GeminiContent {
                role: role.to_string(),
                parts: vec![GeminiPart {
                    text: m.content.clone(),
                }],
            });
        }
    }

    let system_instruction = if system_prompt.trim().is_empty() {
        None
    } else {
        Some(GeminiContent {
            role: "system".to_string(),
            parts: vec![GeminiPart {
                text: system_prompt,
            }],
        })
    };

    GeminiRequest {
        contents,
        system_instruction,
        generation_config: GenerationConfig {
            response_mime_type: options
                .strict_json
                .then(|| "application/json".to_string()),
        },
    }
}

pub struct GeminiClient {
    http: Client,
    name: String,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn from_endpoint(endpoint: &EndpointConfig) -> Self {
        let base_url = match endpoint.base_url.trim() {
            "" => DEFAULT_BASE_URL,
            custom => custom,
        };
        Self {
            http: client(),
            name: endpoint.name.clone(),
            api_key: endpoint.api_key.clone(),
            model: endpoint.model.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, stream: bool) -> String {
        let action = if stream {
            "streamGenerateContent"
        } else {
            "generateContent"
        };
        format!("{}/v1beta/models/{}:{}", self.base_url, self.model, action)
    }

    async fn send(
        &self,
        messages: &[ChatMessage],
        options: GenerateOptions,
        stream: bool,
    ) -> Result<reqwest::Response, ResearchError> {
        let req = build_request(messages, options);
        let mut query = vec![("key", self.api_key.as_str())];
        if stream {
            query.push(("alt", "sse"));
        }
        tracing::debug!(endpoint = %self.name, model = %self.model, stream, "gemini request");
        let resp = self
            .http
            .post(self.url(stream))
            .query(&query)
            .json(&req)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;
        check_status(SERVICE, resp).await
    }
}

#[async_trait]
impl ChatProvider for GeminiClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: GenerateOptions,
    ) -> Result<String, ResearchError> {
        let resp = self.send(messages, options, false).await?;
        let body: GeminiResponse = resp
            .json()
            .await
            .map_err(|e| ResearchError::parse("Gemini response", e))?;
        body.first_text()
            .ok_or_else(|| ResearchError::parse("Gemini response", "no candidate text"))
    }

    async fn generate_stream(
        &self,
        messages: &[ChatMessage],
        tx: UnboundedSender<StreamChunk>,
    ) -> Result<(), ResearchError> {
        let resp = self.send(messages, GenerateOptions::default(), true).await?;
        let deltas = decode_body(resp.bytes_stream(), WireFormat::Gemini, SERVICE);
        futures::pin_mut!(deltas);
        while let Some(delta) = deltas.next().await {
            let _ = tx.send(StreamChunk::Text(delta?));
        }
        let _ = tx.send(StreamChunk::Done);
        Ok(())
    }
}
