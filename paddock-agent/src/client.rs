//! Inference client - turns an analysis request into a validated prediction.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::backend::traits::{CompletionRequest, FinishReason, LlmBackend, LlmError};
use crate::prediction::{ContractViolation, Prediction};
use crate::request::AnalysisRequest;

/// Sampling temperature for analysis calls. Kept low so similar histories
/// produce similar recommendations.
pub const ANALYSIS_TEMPERATURE: f32 = 0.2;

/// Default cap on generated tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 512;

/// Name under which the prediction schema is sent.
const SCHEMA_NAME: &str = "race_prediction";

/// Error types for an analysis call.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    /// The service could not be reached or refused the call
    #[error("Inference transport failure: {0}")]
    Transport(#[source] LlmError),

    /// The service replied but broke the prediction contract
    #[error("Malformed inference response: {0}")]
    MalformedResponse(#[from] ContractViolation),
}

impl InferenceError {
    /// Short label for logs and audit entries.
    pub fn kind(&self) -> &'static str {
        match self {
            InferenceError::Transport(_) => "transport",
            InferenceError::MalformedResponse(_) => "malformed_response",
        }
    }
}

impl From<LlmError> for InferenceError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::ParseError(message) => {
                InferenceError::MalformedResponse(ContractViolation::Envelope(message))
            }
            other => InferenceError::Transport(other),
        }
    }
}

/// An asynchronous, fallible source of predictions.
///
/// Implementations hold no per-call state and never retry.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Analyze the request and return a validated prediction.
    async fn infer(&self, request: &AnalysisRequest) -> Result<Prediction, InferenceError>;
}

/// Inference client backed by an LLM chat-completion backend.
pub struct LlmInferenceClient {
    backend: Arc<dyn LlmBackend>,
    max_tokens: u32,
}

impl LlmInferenceClient {
    /// Create a client over the given backend.
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            backend,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Set the generated-token cap.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Build the completion request for an analysis.
    pub fn completion_request(&self, request: &AnalysisRequest) -> CompletionRequest {
        let completion = CompletionRequest::user(request.prompt())
            .with_system(request.instructions())
            .with_max_tokens(self.max_tokens)
            .with_temperature(ANALYSIS_TEMPERATURE);

        if self.backend.capabilities().supports_json_schema {
            completion.with_json_schema(SCHEMA_NAME, Prediction::json_schema())
        } else {
            completion.with_json_output()
        }
    }
}

#[async_trait]
impl InferenceClient for LlmInferenceClient {
    async fn infer(&self, request: &AnalysisRequest) -> Result<Prediction, InferenceError> {
        debug!(
            backend = %self.backend.id(),
            results = request.results.len(),
            "Requesting analysis"
        );

        let completion = self
            .backend
            .complete(self.completion_request(request))
            .await?;

        if completion.finish_reason != FinishReason::Stop {
            warn!(
                finish_reason = ?completion.finish_reason,
                "Completion did not stop naturally"
            );
        }

        let prediction = Prediction::from_reply(&completion.content)?;

        debug!(
            confidence = prediction.confidence,
            recommended = ?prediction.recommended_values,
            tokens = completion.usage.total(),
            "Analysis parsed"
        );

        Ok(prediction)
    }
}
