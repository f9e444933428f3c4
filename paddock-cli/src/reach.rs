//! Startup reachability check for the inference backend.

use std::time::Duration;

use paddock_agent::LlmBackend;

/// Outcome of a reachability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    Reachable,
    Unreachable,
    /// No answer within the limit
    TimedOut,
}

/// Ask the backend whether it is up, giving up after `limit`.
pub async fn check_backend(backend: &dyn LlmBackend, limit: Duration) -> Reachability {
    match tokio::time::timeout(limit, backend.is_available()).await {
        Ok(true) => Reachability::Reachable,
        Ok(false) => Reachability::Unreachable,
        Err(_) => Reachability::TimedOut,
    }
}
