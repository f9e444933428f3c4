//! Analysis gate - decides whether the current history warrants an analysis.

use paddock_agent::AnalysisRequest;

use crate::history::History;

/// Fewest results that support any pattern claim.
pub const MIN_HISTORY_FOR_ANALYSIS: usize = 3;

/// Most results sent in one analysis.
pub const ANALYSIS_WINDOW: usize = 20;

/// Outcome of evaluating the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Not enough history
    Skip,
    /// Analyze this request
    Proceed(AnalysisRequest),
}

impl GateDecision {
    pub fn is_skip(&self) -> bool {
        matches!(self, GateDecision::Skip)
    }
}

/// Evaluate the gate against a history.
pub fn evaluate(history: &History) -> GateDecision {
    if history.len() < MIN_HISTORY_FOR_ANALYSIS {
        return GateDecision::Skip;
    }

    GateDecision::Proceed(AnalysisRequest::new(
        history.recent_values(ANALYSIS_WINDOW),
    ))
}
