//! Analysis request sent to the inference service.

use serde::{Deserialize, Serialize};

/// Number of horses in a race; outcomes are numbered 1..=HORSE_COUNT.
pub const HORSE_COUNT: u8 = 6;

/// Horses the analysis pays special attention to.
pub const WATCHED_HORSES: [u8; 4] = [3, 4, 5, 6];

/// Number of horses in every recommendation.
pub const RECOMMENDATION_SIZE: usize = 3;

/// A window of recent results, oldest first, ready to be analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Winning horse of each race, in chronological order
    pub results: Vec<u8>,
    /// Horses given special attention
    pub watched: Vec<u8>,
}

impl AnalysisRequest {
    /// Create a request for the given chronological results.
    pub fn new(results: Vec<u8>) -> Self {
        Self {
            results,
            watched: WATCHED_HORSES.to_vec(),
        }
    }

    /// System instructions describing the analysis to perform.
    pub fn instructions(&self) -> String {
        let watched = join(&self.watched);
        format!(
            "You are a statistical analyst for a {HORSE_COUNT}-horse race that repeats continuously. \
             Horses are numbered 1 to {HORSE_COUNT}. Focus on horses {watched}.\n\
             Using only the results you are given:\n\
             1. Count how often each watched horse has won.\n\
             2. Note which watched horses have been absent longest and may be overdue.\n\
             3. Look for repeating sequences or alternations in recent results.\n\
             Recommend exactly {RECOMMENDATION_SIZE} horses for the next race and rate your \
             confidence from 0 to 100. Be conservative: only rate 75 or above when the pattern \
             is clear.\n\
             Reply with JSON only: {{\"confidence\": int, \"recommended_horses\": [int, int, int], \
             \"reasoning\": string}}."
        )
    }

    /// User prompt carrying the results.
    pub fn prompt(&self) -> String {
        format!(
            "Results of the last {} races, oldest to newest: [{}]",
            self.results.len(),
            join(&self.results)
        )
    }
}

fn join(values: &[u8]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
