//! Shared HTTP client and backend error mapping.

use reqwest::{Client, Response};
use shared::ResearchError;
use std::sync::LazyLock;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest silence tolerated between two reads of a response. There is no
/// total deadline: a streamed report may take minutes while staying healthy.
pub const READ_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

static SHARED_HTTP: LazyLock<Client> = LazyLock::new(|| build_client(READ_IDLE_TIMEOUT));

pub(crate) fn build_client(read_idle: Duration) -> Client {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .read_timeout(read_idle)
        .pool_max_idle_per_host(2)
        .build()
        .expect("failed to build HTTP client")
}

/// Process-wide client; cheap to clone.
pub fn client() -> Client {
    SHARED_HTTP.clone()
}

/// Map a failed send/read to a status-less `Network` error.
pub fn transport_error(service: &str, err: reqwest::Error) -> ResearchError {
    ResearchError::network(service, err.status().map(|s| s.as_u16()), err.to_string())
}

/// Return the response if its status is a success, else a `Network` error
/// carrying the backend-reported message.
pub async fn check_status(service: &str, resp: Response) -> Result<Response, ResearchError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = backend_message(&body).unwrap_or_else(|| status.to_string());
    tracing::warn!(service, status = status.as_u16(), %message, "backend returned an error status");
    Err(ResearchError::network(service, Some(status.as_u16()), message))
}

/// `error.message` from a JSON error body, else the raw body (truncated).
fn backend_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        let nested = json
            .get("error")
            .and_then(|e| e.get("message").or(Some(e)))
            .and_then(|m| m.as_str());
        if let Some(message) = nested {
            return Some(message.to_string());
        }
    }
    Some(body.chars().take(800).collect())
}
