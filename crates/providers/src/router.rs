use crate::gemini::GeminiClient;
use crate::openai::OpenAIClient;
use crate::ChatProvider;
use shared::settings::{EndpointConfig, ProviderKind};
use shared::ResearchError;
use std::sync::Arc;

/// Build the adapter for a configured endpoint.
///
/// There is no fallback between endpoints: a stage talks to exactly the
/// endpoint it was assigned.
pub fn provider_for(endpoint: &EndpointConfig) -> Result<Arc<dyn ChatProvider>, ResearchError> {
    if endpoint.api_key.trim().is_empty() {
        return Err(ResearchError::validation(format!(
            "endpoint '{}' has no API key",
            endpoint.name
        )));
    }
    if endpoint.model.trim().is_empty() {
        return Err(ResearchError::validation(format!(
            "endpoint '{}' has no model",
            endpoint.name
        )));
    }

    let provider: Arc<dyn ChatProvider> = match endpoint.provider {
        ProviderKind::Gemini => Arc::new(GeminiClient::from_endpoint(endpoint)),
        ProviderKind::OpenAi => Arc::new(OpenAIClient::from_endpoint(endpoint)?),
    };
    Ok(provider)
}
