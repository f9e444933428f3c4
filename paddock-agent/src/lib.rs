//! Paddock Agent - race analysis inference
//!
//! Provides the inference side of Paddock:
//! - Trait-based LLM backends (OpenAI-compatible, mock)
//! - The analysis request (recent results plus fixed instructions)
//! - The prediction contract and its validation
//! - `InferenceClient`, the seam the session orchestrator calls
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         LlmInferenceClient              │
//! │  AnalysisRequest -> Prediction          │
//! └────────────────┬────────────────────────┘
//!                  │
//!      ┌───────────┴───────────┐
//!      ▼                       ▼
//! ┌─────────────┐       ┌─────────────┐
//! │ LlmBackend  │       │ Prediction  │
//! │ (OpenAI/    │       │ contract    │
//! │  Mock)      │       │ (schema)    │
//! └─────────────┘       └─────────────┘
//! ```

pub mod backend;
pub mod client;
pub mod prediction;
pub mod request;

// Re-export main types for convenience
pub use backend::traits::{CompletionRequest, CompletionResponse, LlmBackend, LlmError};
pub use backend::{MockBackend, OpenAiBackend};
pub use client::{InferenceClient, InferenceError, LlmInferenceClient};
pub use prediction::{ContractViolation, Prediction};
pub use request::{AnalysisRequest, HORSE_COUNT, RECOMMENDATION_SIZE, WATCHED_HORSES};
