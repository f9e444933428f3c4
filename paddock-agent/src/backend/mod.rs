//! LLM Backend abstraction layer.
//!
//! Provides a trait-based interface over chat-completion engines:
//! - OpenAI-compatible (OpenAI, Ollama, vLLM, etc.)
//! - Mock backend for testing

pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::MockBackend;
pub use openai::OpenAiBackend;
pub use traits::{CompletionRequest, CompletionResponse, LlmBackend, LlmError, ModelCapabilities};
