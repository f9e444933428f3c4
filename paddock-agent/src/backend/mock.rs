//! Mock LLM backend for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::traits::*;

/// Mock backend for testing.
///
/// Queued replies are consumed first, in order; after that every call gets
/// the fixed reply. All requests are recorded.
pub struct MockBackend {
    model_id: String,
    available: AtomicBool,
    capabilities: ModelCapabilities,
    reply: String,
    queued: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockBackend {
    /// Create a new mock backend.
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            available: AtomicBool::new(true),
            capabilities: ModelCapabilities::default(),
            reply: "{}".to_string(),
            queued: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Set the reply returned once the queue is empty.
    pub fn with_response(mut self, content: impl Into<String>) -> Self {
        self.reply = content.into();
        self
    }

    /// Queue a one-off reply or failure.
    pub fn with_queued(self, reply: Result<String, LlmError>) -> Self {
        if let Ok(mut queued) = self.queued.lock() {
            queued.push_back(reply);
        }
        self
    }

    /// Set availability.
    pub fn with_available(self, available: bool) -> Self {
        self.available.store(available, Ordering::SeqCst);
        self
    }

    /// Number of calls to `complete`.
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// The most recent request passed to `complete`.
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests
            .lock()
            .ok()
            .and_then(|requests| requests.last().cloned())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new("mock-model")
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    fn id(&self) -> &str {
        &self.model_id
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let prompt_words = request
            .messages
            .iter()
            .map(|m| m.content.split_whitespace().count())
            .sum::<usize>();

        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        if !self.available.load(Ordering::SeqCst) {
            return Err(LlmError::Unavailable("Mock backend disabled".to_string()));
        }

        let next = self.queued.lock().ok().and_then(|mut q| q.pop_front());
        let content = match next {
            Some(reply) => reply?,
            None => self.reply.clone(),
        };

        // Words stand in for tokens
        let usage = Usage {
            prompt_tokens: prompt_words as u32,
            completion_tokens: content.split_whitespace().count() as u32,
        };

        Ok(CompletionResponse {
            content,
            finish_reason: FinishReason::Stop,
            usage,
        })
    }

    fn capabilities(&self) -> &ModelCapabilities {
        &self.capabilities
    }
}
