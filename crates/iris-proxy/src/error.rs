//! Translation error types

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("backend response has no choices")]
    MissingChoices,

    #[error("backend response has an empty choice list")]
    EmptyChoices,

    #[error("backend choice has no message")]
    MissingMessage,

    #[error("tool call section is not terminated")]
    MissingSectionEnd,

    #[error("malformed tool call id: {id}")]
    InvalidIdFormat { id: String },

    #[error("tool call {id} has invalid JSON arguments: {source}")]
    InvalidJsonArguments {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("tool call buffer exceeded {limit} bytes ({size} buffered)")]
    Overloaded { size: usize, limit: usize },

    #[error("invalid stream chunk: {0}")]
    InvalidStreamChunk(String),

    #[error("could not decode backend response: {0}")]
    UpstreamDecode(String),

    #[error("backend stream failed: {0}")]
    UpstreamStream(String),

    #[error("backend error: {0}")]
    Upstream(String),
}

/// The `error` object of an Anthropic error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub error_type: &'static str,
    pub kind: &'static str,
    pub message: String,
}

impl TranslateError {
    /// Short machine-readable classification.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::MissingChoices => "missing_choices",
            Self::EmptyChoices => "empty_choices",
            Self::MissingMessage => "missing_message",
            Self::MissingSectionEnd => "missing_section_end",
            Self::InvalidIdFormat { .. } => "invalid_id_format",
            Self::InvalidJsonArguments { .. } => "invalid_json_arguments",
            Self::Overloaded { .. } => "overloaded",
            Self::InvalidStreamChunk(_) => "invalid_stream_chunk",
            Self::UpstreamDecode(_) => "upstream_decode",
            Self::UpstreamStream(_) => "upstream_stream",
            Self::Upstream(_) => "upstream_error",
        }
    }

    /// Anthropic error `type` reported to the client.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::Overloaded { .. } => "overloaded_error",
            _ => "api_error",
        }
    }

    /// Whether the client caused this error (400) rather than the backend (502).
    pub fn is_client_fault(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error_type: self.error_type(),
            kind: self.kind(),
            message: self.to_string(),
        }
    }

    /// Body of a buffered Anthropic error response.
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "error",
            "error": self.body(),
        })
    }
}
