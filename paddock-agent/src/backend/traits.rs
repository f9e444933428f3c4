//! Core traits for LLM backends.
//!
//! This module defines the `LlmBackend` trait - the primary abstraction
//! over the chat-completion engines the inference client can talk to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error types for LLM operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Backend is not available
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Request failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Rate limited by the backend
    #[error("Rate limited, retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    /// Network error (including timeouts)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The completion envelope could not be decoded
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Core trait for LLM backends.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Get the backend identifier (e.g., model name).
    fn id(&self) -> &str;

    /// Check if the backend is currently available.
    async fn is_available(&self) -> bool;

    /// Generate a completion.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Get the capabilities of this backend.
    fn capabilities(&self) -> &ModelCapabilities;
}

/// Request for LLM completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// System prompt (optional)
    pub system_prompt: Option<String>,
    /// Conversation messages
    pub messages: Vec<Message>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature (0.0-2.0)
    pub temperature: Option<f32>,
    /// Request structured output format
    pub response_format: Option<ResponseFormat>,
}

impl CompletionRequest {
    /// Create a new request with a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(content)],
            ..Default::default()
        }
    }

    /// Add a system prompt.
    pub fn with_system(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set max tokens.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set temperature.
    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp.clamp(0.0, 2.0));
        self
    }

    /// Request free-form JSON output.
    pub fn with_json_output(mut self) -> Self {
        self.response_format = Some(ResponseFormat {
            format_type: ResponseFormatType::Json,
            name: None,
            schema: None,
        });
        self
    }

    /// Request JSON output constrained to a schema.
    pub fn with_json_schema(mut self, name: impl Into<String>, schema: serde_json::Value) -> Self {
        self.response_format = Some(ResponseFormat {
            format_type: ResponseFormatType::JsonSchema,
            name: Some(name.into()),
            schema: Some(schema),
        });
        self
    }
}

/// A message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,
    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Role of a message sender. Replies are read from the envelope, so only
/// the roles a request sends are modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
        }
    }
}

/// Response from LLM completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Generated content
    pub content: String,
    /// Why generation stopped
    pub finish_reason: FinishReason,
    /// Token usage
    pub usage: Usage,
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural stop (end of response or stop sequence)
    Stop,
    /// Hit max tokens limit
    Length,
    /// Content was filtered
    ContentFilter,
}

/// Token usage information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,
    /// Tokens in the completion
    pub completion_tokens: u32,
}

impl Usage {
    /// Get total tokens.
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Format for structured output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFormat {
    /// Type of format
    pub format_type: ResponseFormatType,
    /// Schema name (for JsonSchema type)
    pub name: Option<String>,
    /// JSON schema (for JsonSchema type)
    pub schema: Option<serde_json::Value>,
}

/// Type of response format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormatType {
    /// JSON object
    Json,
    /// JSON conforming to schema
    JsonSchema,
}

/// Capabilities of a model/backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCapabilities {
    /// Maximum context window size
    pub context_window: u32,
    /// Maximum output tokens
    pub max_output_tokens: u32,
    /// Whether JSON mode is supported
    pub supports_json_mode: bool,
    /// Whether schema-constrained output is supported
    pub supports_json_schema: bool,
}

impl Default for ModelCapabilities {
    fn default() -> Self {
        Self {
            context_window: 4096,
            max_output_tokens: 1024,
            supports_json_mode: false,
            supports_json_schema: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder_clamps_temperature() {
        let request = CompletionRequest::user("hi")
            .with_system("be terse")
            .with_temperature(5.0)
            .with_max_tokens(64);

        assert_eq!(request.temperature, Some(2.0));
        assert_eq!(request.max_tokens, Some(64));
        assert_eq!(request.system_prompt.as_deref(), Some("be terse"));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, MessageRole::User);
    }

    #[test]
    fn test_json_schema_format() {
        let request = CompletionRequest::user("hi")
            .with_json_schema("thing", serde_json::json!({"type": "object"}));

        let format = request.response_format.unwrap();
        assert_eq!(format.format_type, ResponseFormatType::JsonSchema);
        assert_eq!(format.name.as_deref(), Some("thing"));
        assert!(format.schema.is_some());
    }
}
