//! The prediction contract returned by the inference service.
//!
//! Wire shape: `{"confidence": int, "recommended_horses": [int; 3], "reasoning": string}`.

use serde::{Deserialize, Serialize};

use crate::request::{HORSE_COUNT, RECOMMENDATION_SIZE};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// A validated recommendation from one analysis.
///
/// `confidence` is within 0..=100 and every recommended value is a horse
/// number within 1..=6. Duplicate horses are kept as returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Prediction {
    /// Confidence in the recommendation (0 - 100)
    pub confidence: u8,
    /// Recommended horse numbers
    #[serde(rename = "recommended_horses")]
    pub recommended_values: [u8; RECOMMENDATION_SIZE],
    /// Free-text explanation from the model
    pub reasoning: String,
}

/// Ways a reply can break the prediction contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractViolation {
    /// The completion envelope itself was unreadable
    #[error("unreadable completion envelope: {0}")]
    Envelope(String),

    /// Reply is not a JSON object of the expected field types
    #[error("reply does not match prediction schema: {0}")]
    Shape(String),

    /// Confidence outside 0..=100
    #[error("confidence {0} outside 0..=100")]
    ConfidenceOutOfRange(i64),

    /// Wrong number of recommended horses
    #[error("expected 3 recommended horses, got {0}")]
    WrongHorseCount(usize),

    /// Recommended horse outside 1..=6
    #[error("recommended horse {0} outside 1..=6")]
    HorseOutOfRange(i64),
}

/// Untrusted reply shape; integers are wide so range checks can report the value.
#[derive(Debug, Deserialize)]
struct RawPrediction {
    confidence: i64,
    recommended_horses: Vec<i64>,
    reasoning: String,
}

impl Prediction {
    /// Parse and validate a model reply.
    ///
    /// Replies wrapped in a Markdown code fence are accepted.
    pub fn from_reply(content: &str) -> Result<Self, ContractViolation> {
        let json = strip_code_fence(content);
        let raw: RawPrediction =
            serde_json::from_str(json).map_err(|e| ContractViolation::Shape(e.to_string()))?;
        raw.validate()
    }

    /// JSON Schema sent to the service to constrain its reply.
    pub fn json_schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "confidence": {
                    "type": "integer",
                    "minimum": 0,
                    "maximum": 100,
                    "description": "Confidence in the recommendation, 0 to 100"
                },
                "recommended_horses": {
                    "type": "array",
                    "items": { "type": "integer", "minimum": 1, "maximum": HORSE_COUNT },
                    "minItems": RECOMMENDATION_SIZE,
                    "maxItems": RECOMMENDATION_SIZE,
                    "description": "Exactly three horse numbers"
                },
                "reasoning": {
                    "type": "string",
                    "description": "Short explanation of the pattern found"
                }
            },
            "required": ["confidence", "recommended_horses", "reasoning"],
            "additionalProperties": false
        })
    }
}

impl RawPrediction {
    fn validate(self) -> Result<Prediction, ContractViolation> {
        if !(0..=100).contains(&self.confidence) {
            return Err(ContractViolation::ConfidenceOutOfRange(self.confidence));
        }

        if self.recommended_horses.len() != RECOMMENDATION_SIZE {
            return Err(ContractViolation::WrongHorseCount(
                self.recommended_horses.len(),
            ));
        }

        let mut recommended_values = [0u8; RECOMMENDATION_SIZE];
        for (slot, &horse) in recommended_values.iter_mut().zip(&self.recommended_horses) {
            if !(1..=i64::from(HORSE_COUNT)).contains(&horse) {
                return Err(ContractViolation::HorseOutOfRange(horse));
            }
            *slot = horse as u8;
        }

        Ok(Prediction {
            confidence: self.confidence as u8,
            recommended_values,
            reasoning: self.reasoning,
        })
    }
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") up to the first newline
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}
