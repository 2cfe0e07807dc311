// gateway-protocol: wire types shared between the gateway, the bus, and the
// model backend. Mirrors the OpenAI-style `text_completion` shape the
// original service exposed to clients.

use serde::{Deserialize, Serialize};

fn default_model() -> String {
    "gemma-3b-it".to_owned()
}

fn default_temperature() -> f32 {
    0.8
}

// ---------------------------------------------------------------------------
// Client-facing request
// ---------------------------------------------------------------------------

/// A completion request as submitted by a client, over HTTP or WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub stream: bool,
}

/// Why a `CompletionRequest` failed admission-time validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyPrompt,
    ZeroMaxTokens,
    TemperatureOutOfRange,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::EmptyPrompt => write!(f, "prompt must not be empty"),
            ValidationError::ZeroMaxTokens => write!(f, "max_tokens must be positive"),
            ValidationError::TemperatureOutOfRange => {
                write!(f, "temperature must be in [0, 2]")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl CompletionRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.prompt.is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }
        if self.max_tokens == 0 {
            return Err(ValidationError::ZeroMaxTokens);
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ValidationError::TemperatureOutOfRange);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Request bus payload
// ---------------------------------------------------------------------------

/// The request-topic payload: a `CompletionRequest` with its `request_id`
/// resolved (assigned by the admitting handler if the client didn't supply
/// one).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub request_id: String,
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl WorkItem {
    pub fn from_request(request_id: String, req: &CompletionRequest) -> Self {
        Self {
            request_id,
            model: req.model.clone(),
            prompt: req.prompt.clone(),
            max_tokens: req.max_tokens,
            temperature: req.temperature,
        }
    }
}

// ---------------------------------------------------------------------------
// Response bus payload
// ---------------------------------------------------------------------------

/// One choice in a model-backend chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub text: String,
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// One model-backend chunk, carried inside a non-terminal response frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChunkData {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

/// The response-topic payload. Exactly one frame with `done: true` is
/// published per work item; `error` implies `done`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ChunkData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub done: bool,
}

impl ResponseFrame {
    pub fn chunk(request_id: impl Into<String>, data: ChunkData) -> Self {
        Self {
            request_id: request_id.into(),
            data: Some(data),
            error: None,
            done: false,
        }
    }

    pub fn ok_done(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            data: None,
            error: None,
            done: true,
        }
    }

    pub fn error_done(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            data: None,
            error: Some(message.into()),
            done: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Client-facing responses
// ---------------------------------------------------------------------------

/// One streamed chunk as handed back to the client (HTTP SSE or WebSocket
/// text frame), reconstructed from a `ResponseFrame`'s `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionChunk {
    pub id: String,
    pub object: &'static str,
    pub choices: Vec<Choice>,
    pub model: String,
}

impl CompletionChunk {
    pub fn new(id: impl Into<String>, model: impl Into<String>, choices: Vec<Choice>) -> Self {
        Self {
            id: id.into(),
            object: "text_completion",
            choices,
            model: model.into(),
        }
    }
}

/// The full non-streaming response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub model: String,
    pub choices: Vec<Choice>,
}

impl CompletionResponse {
    pub fn new(id: impl Into<String>, model: impl Into<String>, text: String) -> Self {
        Self {
            id: id.into(),
            object: "text_completion",
            model: model.into(),
            choices: vec![Choice {
                text,
                index: 0,
                finish_reason: Some("stop".to_owned()),
            }],
        }
    }
}

/// The terminal error chunk sent in place of a completion when no text was
/// ever assembled (timeout, breaker-open, backend error).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorChunk {
    pub id: String,
    pub object: &'static str,
    pub message: String,
}

impl ErrorChunk {
    pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            object: "error",
            message: message.into(),
        }
    }
}

/// Frozen HTTP error envelope used by all non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

pub mod error_codes {
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
    pub const BACKEND_BUSY: &str = "BACKEND_BUSY";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_request_applies_schema_defaults() {
        let json = r#"{"prompt":"hi","max_tokens":4}"#;
        let req: CompletionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.model, "gemma-3b-it");
        assert_eq!(req.temperature, 0.8);
        assert!(!req.stream);
        assert_eq!(req.request_id, None);
    }

    #[test]
    fn validate_rejects_empty_prompt_zero_tokens_and_bad_temperature() {
        let base = CompletionRequest {
            request_id: None,
            model: "m".to_owned(),
            prompt: String::new(),
            max_tokens: 4,
            temperature: 0.0,
            stream: false,
        };
        assert_eq!(base.validate(), Err(ValidationError::EmptyPrompt));

        let zero_tokens = CompletionRequest {
            prompt: "hi".to_owned(),
            max_tokens: 0,
            ..base.clone()
        };
        assert_eq!(zero_tokens.validate(), Err(ValidationError::ZeroMaxTokens));

        let bad_temp = CompletionRequest {
            prompt: "hi".to_owned(),
            max_tokens: 4,
            temperature: 2.5,
            ..base
        };
        assert_eq!(
            bad_temp.validate(),
            Err(ValidationError::TemperatureOutOfRange)
        );
    }

    #[test]
    fn validate_accepts_boundary_temperatures() {
        let mut req = CompletionRequest {
            request_id: None,
            model: "m".to_owned(),
            prompt: "hi".to_owned(),
            max_tokens: 1,
            temperature: 0.0,
            stream: false,
        };
        assert!(req.validate().is_ok());
        req.temperature = 2.0;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn response_frame_error_done_implies_done_and_no_data() {
        let frame = ResponseFrame::error_done("req-1", "boom");
        assert!(frame.done);
        assert_eq!(frame.error.as_deref(), Some("boom"));
        assert!(frame.data.is_none());
    }

    #[test]
    fn work_item_copies_fields_and_assigns_request_id() {
        let req = CompletionRequest {
            request_id: None,
            model: "m1".to_owned(),
            prompt: "hi".to_owned(),
            max_tokens: 4,
            temperature: 0.0,
            stream: true,
        };
        let item = WorkItem::from_request("req-1".to_owned(), &req);
        assert_eq!(item.request_id, "req-1");
        assert_eq!(item.model, "m1");
        assert_eq!(item.prompt, "hi");
    }
}
