//! Chat-completion backends behind one contract.
//!
//! Every backend implements [`ChatProvider`] for single-shot and streamed
//! generation; [`router::provider_for`] picks the implementation from an
//! endpoint's configured provider kind.

pub mod gemini;
pub mod http;
pub mod openai;
pub mod router;
pub mod sse;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use shared::agent_api::{ChatMessage, StreamChunk};
use shared::settings::ProviderKind;
use shared::ResearchError;
use tokio::sync::mpsc::UnboundedSender;

/// Per-call switches for single-shot generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Ask the backend for a JSON object instead of free text
    pub strict_json: bool,
}

impl GenerateOptions {
    pub fn json() -> Self {
        Self { strict_json: true }
    }
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Display name of the configured endpoint
    fn name(&self) -> &str;

    fn kind(&self) -> ProviderKind;

    /// One request, whole completion text back.
    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: GenerateOptions,
    ) -> Result<String, ResearchError>;

    /// One streamed request. Every decoded delta is sent as
    /// `StreamChunk::Text` as soon as it arrives, then `StreamChunk::Done`.
    /// Returns once the body has ended.
    async fn generate_stream(
        &self,
        messages: &[ChatMessage],
        tx: UnboundedSender<StreamChunk>,
    ) -> Result<(), ResearchError>;
}

/// Single-shot generation in JSON mode, parsed into `T`.
pub async fn generate_json<T: DeserializeOwned>(
    provider: &dyn ChatProvider,
    messages: &[ChatMessage],
    context: &str,
) -> Result<T, ResearchError> {
    let text = provider.generate(messages, GenerateOptions::json()).await?;
    parse_json(&text, context)
}

/// Parse model output as `T`, tolerating a surrounding markdown code fence.
pub fn parse_json<T: DeserializeOwned>(text: &str, context: &str) -> Result<T, ResearchError> {
    let body = strip_code_fence(text);
    serde_json::from_str(body).map_err(|e| {
        tracing::warn!(context, error = %e, "model returned unparseable JSON");
        ResearchError::parse(context, e)
    })
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
pub(crate) mod test_server {
    //! One-shot loopback HTTP server for adapter tests.

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use std::time::Duration;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Serve exactly one response; the handle yields the raw request text.
    pub async fn serve_once(
        status: &'static str,
        content_type: &'static str,
        body: String,
    ) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                content_type,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            request
        });
        (format!("http://{}", addr), handle)
    }

    /// Serve one chunked event stream, pausing `gap` before every chunk.
    pub async fn serve_chunked(chunks: Vec<String>, gap: Duration) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n";
            socket.write_all(head.as_bytes()).await.unwrap();
            for chunk in chunks {
                tokio::time::sleep(gap).await;
                let framed = format!("{:x}\r\n{}\r\n", chunk.len(), chunk);
                // The client may already have given up on a stalled body.
                if socket.write_all(framed.as_bytes()).await.is_err() {
                    return request;
                }
                let _ = socket.flush().await;
            }
            let _ = socket.write_all(b"0\r\n\r\n").await;
            let _ = socket.shutdown().await;
            request
        });
        (format!("http://{}", addr), handle)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        if name.eq_ignore_ascii_case("content-length") {
                            value.trim().parse::<usize>().ok()
                        } else {
                            None
                        }
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Selection {
        relevant_indices: Vec<i64>,
    }

    #[test]
    fn test_parse_json_plain_and_fenced() {
        let plain: Selection = parse_json("{\"relevant_indices\": [0, 2]}", "selection").unwrap();
        assert_eq!(plain.relevant_indices, vec![0, 2]);

        let fenced: Selection =
            parse_json("```json\n{\"relevant_indices\": [1]}\n```", "selection").unwrap();
        assert_eq!(fenced.relevant_indices, vec![1]);
    }

    #[test]
    fn test_parse_json_shape_mismatch() {
        let err = parse_json::<Selection>("{\"indices\": [1]}", "selection").unwrap_err();
        assert!(err.is_parse());
        let err = parse_json::<Selection>("Here are the sources: 1, 2", "selection").unwrap_err();
        assert!(err.is_parse());
    }
}
