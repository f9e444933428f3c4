//! Recommendation filter.

use paddock_agent::Prediction;

/// Minimum confidence for a prediction to be shown.
pub const CONFIDENCE_THRESHOLD: u8 = 75;

/// Keep a prediction only when its confidence reaches the threshold.
pub fn filter(prediction: Prediction) -> Option<Prediction> {
    (prediction.confidence >= CONFIDENCE_THRESHOLD).then_some(prediction)
}
