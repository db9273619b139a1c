//! Error taxonomy shared by every research component.
//!
//! Per-item failures (one search query, one article read) never show up here:
//! they are absorbed where they happen and degrade that item only.

/// Run-level failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResearchError {
    /// Non-success HTTP status or a transport failure talking to a backend
    #[error("{service} API error: {message}")]
    Network {
        service: String,
        /// `None` when the request never produced a status line
        status: Option<u16>,
        message: String,
    },

    /// Model output or wire payload that does not fit the expected shape
    #[error("failed to parse {context}: {message}")]
    Parse { context: String, message: String },

    /// Required per-run configuration is missing
    #[error("invalid configuration: {0}")]
    Validation(String),

    /// A newer run replaced this one
    #[error("run superseded by a newer run")]
    Cancelled,
}

impl ResearchError {
    pub fn network(
        service: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::Network {
            service: service.into(),
            status,
            message: message.into(),
        }
    }

    pub fn parse(context: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}
