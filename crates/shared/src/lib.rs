pub mod error;
pub mod events;
pub mod research;

pub use error::ResearchError;

pub mod settings {
    use serde::{Deserialize, Serialize};

    fn default_role() -> String {
        "Pharmaceutical R&D".to_string()
    }

    fn default_answer_language() -> String {
        "Simplified Chinese".to_string()
    }

    fn default_cse_spacing_ms() -> u64 {
        1100
    }

    fn default_tavily_max_results() -> u32 {
        5
    }

    /// Chat-completion wire family an endpoint speaks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub enum ProviderKind {
        /// Google Gemini native `generateContent` API
        #[default]
        #[serde(rename = "gemini")]
        Gemini,
        /// Any OpenAI-compatible `/v1/chat/completions` server
        #[serde(rename = "openai")]
        OpenAi,
    }

    impl ProviderKind {
        pub fn display_name(&self) -> &'static str {
            match self {
                ProviderKind::Gemini => "Gemini",
                ProviderKind::OpenAi => "OpenAI",
            }
        }
    }

    /// One configured chat model endpoint.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct EndpointConfig {
        pub id: String,
        pub name: String,
        pub provider: ProviderKind,
        pub api_key: String,
        pub base_url: String, // only used by OpenAI-compatible endpoints
        pub model: String,
    }

    /// A Google Custom Search engine the planner may target.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct CustomEngine {
        /// Engine identifier (`cx`)
        pub id: String,
        pub key: String,
        /// Free-form hint shown to the planner
        pub description: String,
        pub language: String,
    }

    /// Which endpoint runs which model-backed stage (values are endpoint ids).
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct TaskAssignments {
        pub plan: Option<String>,
        pub filter: Option<String>,
        pub synthesize: Option<String>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResearchSettings {
        #[serde(default)]
        pub tavily_key: String,
        #[serde(default)]
        pub jina_key: String,
        #[serde(default)]
        pub google_cse: Vec<CustomEngine>,
        #[serde(default = "default_role")]
        pub ai_role: String,
        #[serde(default)]
        pub ai_endpoints: Vec<EndpointConfig>,
        #[serde(default)]
        pub ai_assignments: TaskAssignments,
        #[serde(default = "default_answer_language")]
        pub answer_language: String,
        /// Minimum pause between two Custom Search calls
        #[serde(default = "default_cse_spacing_ms")]
        pub cse_spacing_ms: u64,
        #[serde(default = "default_tavily_max_results")]
        pub tavily_max_results: u32,
    }

    impl ResearchSettings {
        pub fn endpoint(&self, id: Option<&str>) -> Option<&EndpointConfig> {
            let id = id?;
            self.ai_endpoints.iter().find(|ep| ep.id == id)
        }

        /// Content reader key, if deep reading is configured.
        pub fn reader_key(&self) -> Option<&str> {
            let key = self.jina_key.trim();
            if key.is_empty() {
                None
            } else {
                Some(key)
            }
        }
    }

    impl Default for ResearchSettings {
        fn default() -> Self {
            Self {
                tavily_key: String::new(),
                jina_key: String::new(),
                google_cse: Vec::new(),
                ai_role: default_role(),
                ai_endpoints: Vec::new(),
                ai_assignments: TaskAssignments::default(),
                answer_language: default_answer_language(),
                cse_spacing_ms: default_cse_spacing_ms(),
                tavily_max_results: default_tavily_max_results(),
            }
        }
    }
}

pub mod agent_api {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ChatMessage {
        pub role: String, // "system" | "user" | "assistant"
        pub content: String,
    }

    impl ChatMessage {
        pub fn user(content: impl Into<String>) -> Self {
            Self {
                role: "user".to_string(),
                content: content.into(),
            }
        }

        pub fn system(content: impl Into<String>) -> Self {
            Self {
                role: "system".to_string(),
                content: content.into(),
            }
        }
    }

    /// One item of a streamed completion.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum StreamChunk {
        Text(String),
        Done,
    }
}

#[cfg(test)]
mod tests {
    use super::settings::*;

    #[test]
    fn test_settings_accept_exported_config() {
        let raw = r#"{
            "tavilyKey": "tvly-123",
            "jinaKey": "",
            "googleCse": [{"id": "abcdef123", "key": "g-key", "description": "Drug formulations", "language": "ru"}],
            "aiRole": "Drug R&D",
            "aiEndpoints": [
                {"id": "ep-1", "name": "Flash", "provider": "gemini", "apiKey": "k1", "baseUrl": "", "model": "gemini-2.5-flash"},
                {"id": "ep-2", "name": "Local", "provider": "openai", "apiKey": "k2", "baseUrl": "http://localhost:8000", "model": "qwen"}
            ],
            "aiAssignments": {"plan": "ep-1", "filter": "ep-1", "synthesize": "ep-2"}
        }"#;

        let settings: ResearchSettings = serde_json::from_str(raw).unwrap();
        assert_eq!(settings.ai_endpoints.len(), 2);
        assert_eq!(settings.ai_endpoints[1].provider, ProviderKind::OpenAi);
        assert_eq!(settings.cse_spacing_ms, 1100);
        assert_eq!(settings.answer_language, "Simplified Chinese");
        assert!(settings.reader_key().is_none());

        let synth = settings.endpoint(settings.ai_assignments.synthesize.as_deref());
        assert_eq!(synth.map(|ep| ep.name.as_str()), Some("Local"));
        assert!(settings.endpoint(None).is_none());
        assert!(settings.endpoint(Some("missing")).is_none());
    }
}
