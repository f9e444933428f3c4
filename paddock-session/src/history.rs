//! Outcome history - the ordered log of race results for a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use paddock_agent::HORSE_COUNT;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Error types for history operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    /// Value is not a horse number
    #[error("Outcome {0} is outside 1..=6")]
    OutOfRange(u8),

    /// Nothing to remove
    #[error("History is empty")]
    Empty,
}

/// A winning horse number, guaranteed to be within 1..=6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(try_from = "u8", into = "u8")]
pub struct OutcomeValue(u8);

impl OutcomeValue {
    /// Create a value, rejecting anything outside 1..=6.
    pub fn new(value: u8) -> Result<Self, HistoryError> {
        if (1..=HORSE_COUNT).contains(&value) {
            Ok(Self(value))
        } else {
            Err(HistoryError::OutOfRange(value))
        }
    }

    /// The horse number.
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for OutcomeValue {
    type Error = HistoryError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<OutcomeValue> for u8 {
    fn from(value: OutcomeValue) -> Self {
        value.0
    }
}

impl std::fmt::Display for OutcomeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One recorded race result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Outcome {
    /// Unique identifier
    pub id: String,
    /// Winning horse
    pub value: OutcomeValue,
    /// When the result was recorded
    pub observed_at: DateTime<Utc>,
}

impl Outcome {
    /// Create an outcome observed now.
    pub fn new(value: OutcomeValue) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            value,
            observed_at: Utc::now(),
        }
    }
}

/// Ordered outcome log, newest first.
///
/// Every mutation bumps `revision`, so two equal revisions always denote
/// the same history contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct History {
    outcomes: VecDeque<Outcome>,
    revision: u64,
}

impl History {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new result at the head.
    pub fn append(&mut self, value: OutcomeValue) -> &Outcome {
        self.outcomes.push_front(Outcome::new(value));
        self.revision += 1;
        &self.outcomes[0]
    }

    /// Remove the most recent result.
    pub fn remove_head(&mut self) -> Result<Outcome, HistoryError> {
        let removed = self.outcomes.pop_front().ok_or(HistoryError::Empty)?;
        self.revision += 1;
        Ok(removed)
    }

    /// Drop every result.
    pub fn clear(&mut self) {
        self.outcomes.clear();
        self.revision += 1;
    }

    /// The `n` most recent results, oldest first.
    pub fn recent_window(&self, n: usize) -> Vec<Outcome> {
        let mut window: Vec<Outcome> = self.outcomes.iter().take(n).cloned().collect();
        window.reverse();
        window
    }

    /// Values of the `n` most recent results, oldest first.
    pub fn recent_values(&self, n: usize) -> Vec<u8> {
        let mut values: Vec<u8> = self.outcomes.iter().take(n).map(|o| o.value.get()).collect();
        values.reverse();
        values
    }

    /// All values, oldest first.
    pub fn values_chronological(&self) -> Vec<u8> {
        self.recent_values(self.outcomes.len())
    }

    /// Number of recorded results.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Most recent result.
    pub fn head(&self) -> Option<&Outcome> {
        self.outcomes.front()
    }

    /// Results, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter()
    }

    /// Mutation counter identifying this exact history.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Wins per horse across the whole history; index 0 is horse 1.
    pub fn frequencies(&self) -> [usize; HORSE_COUNT as usize] {
        let mut counts = [0usize; HORSE_COUNT as usize];
        for outcome in &self.outcomes {
            counts[usize::from(outcome.value.get() - 1)] += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(v: u8) -> OutcomeValue {
        OutcomeValue::new(v).unwrap()
    }

    fn history_of(values: &[u8]) -> History {
        let mut history = History::new();
        for &v in values {
            history.append(value(v));
        }
        history
    }

    #[test]
    fn test_value_range() {
        assert!(OutcomeValue::new(1).is_ok());
        assert!(OutcomeValue::new(6).is_ok());
        assert_eq!(OutcomeValue::new(0), Err(HistoryError::OutOfRange(0)));
        assert_eq!(OutcomeValue::new(7), Err(HistoryError::OutOfRange(7)));
    }

    #[test]
    fn test_value_deserialize_rejects_out_of_range() {
        assert!(serde_json::from_str::<OutcomeValue>("4").is_ok());
        assert!(serde_json::from_str::<OutcomeValue>("9").is_err());
    }

    #[test]
    fn test_newest_first() {
        let history = history_of(&[2, 1, 4]);
        let stored: Vec<u8> = history.iter().map(|o| o.value.get()).collect();

        assert_eq!(stored, vec![4, 1, 2]);
        assert_eq!(history.head().unwrap().value.get(), 4);
    }

    #[test]
    fn test_unique_ids() {
        let history = history_of(&[1, 1, 1, 1]);
        let mut ids: Vec<&str> = history.iter().map(|o| o.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_length_tracks_adds_minus_undos() {
        let mut history = History::new();
        let mut expected = 0usize;

        for step in 0..40u8 {
            if step % 3 == 2 {
                if history.remove_head().is_ok() {
                    expected -= 1;
                }
            } else {
                history.append(value(step % 6 + 1));
                expected += 1;
            }
            assert_eq!(history.len(), expected);
        }
    }

    #[test]
    fn test_remove_head() {
        let mut history = history_of(&[3, 5]);

        let removed = history.remove_head().unwrap();
        assert_eq!(removed.value.get(), 5);
        assert_eq!(history.len(), 1);

        history.remove_head().unwrap();
        assert_eq!(history.remove_head(), Err(HistoryError::Empty));
    }

    #[test]
    fn test_empty_remove_keeps_revision() {
        let mut history = History::new();
        let before = history.revision();
        let _ = history.remove_head();
        assert_eq!(history.revision(), before);
    }

    #[test]
    fn test_revision_bumps_on_every_mutation() {
        let mut history = History::new();
        assert_eq!(history.revision(), 0);

        history.append(value(1));
        history.append(value(2));
        assert_eq!(history.revision(), 2);

        history.remove_head().unwrap();
        assert_eq!(history.revision(), 3);

        history.clear();
        assert_eq!(history.revision(), 4);
        assert!(history.is_empty());

        // Same length as before, different identity
        history.append(value(1));
        assert_eq!(history.revision(), 5);
    }

    #[test]
    fn test_recent_window_chronological() {
        let history = history_of(&[2, 1, 4]);
        let window: Vec<u8> = history.recent_window(20).iter().map(|o| o.value.get()).collect();

        assert_eq!(window, vec![2, 1, 4]);
        assert_eq!(history.recent_values(20), vec![2, 1, 4]);
        assert_eq!(history.values_chronological(), vec![2, 1, 4]);
        assert_eq!(history.recent_values(2), vec![1, 4]);
    }

    #[test]
    fn test_recent_window_bounded() {
        let values: Vec<u8> = (0..35u8).map(|i| i % 6 + 1).collect();
        let history = history_of(&values);

        let window = history.recent_values(20);
        assert_eq!(window.len(), 20);
        assert_eq!(window, values[15..].to_vec());

        let outcomes = history.recent_window(20);
        assert!(outcomes
            .windows(2)
            .all(|pair| pair[0].observed_at <= pair[1].observed_at));
    }

    #[test]
    fn test_frequencies() {
        let history = history_of(&[3, 3, 6, 1]);
        assert_eq!(history.frequencies(), [1, 0, 2, 0, 0, 1]);
    }
}
