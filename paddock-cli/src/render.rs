//! Plain-text rendering of the session state.

use std::fmt::Write;

use paddock_agent::HORSE_COUNT;
use paddock_session::SessionState;

/// Render the state as a few lines of text.
pub fn render(state: &SessionState) -> String {
    let mut out = String::new();

    let tiles: Vec<String> = state
        .history
        .iter()
        .map(|outcome| format!("[{}]", outcome.value))
        .collect();
    if tiles.is_empty() {
        out.push_str("History: (empty)\n");
    } else {
        let _ = writeln!(out, "History ({}): {}", tiles.len(), tiles.join(" "));
    }

    let counts = state.history.frequencies();
    let freq: Vec<String> = (1..=HORSE_COUNT)
        .zip(counts.iter())
        .map(|(horse, count)| format!("{}:{}", horse, count))
        .collect();
    let _ = writeln!(out, "Wins: {}", freq.join("  "));

    if state.busy {
        out.push_str("Analyzing...\n");
    }

    if let (Some(prediction), true) = (&state.current_prediction, state.prediction_visible) {
        let horses: Vec<String> = prediction
            .recommended_values
            .iter()
            .map(|h| h.to_string())
            .collect();
        let _ = writeln!(
            out,
            "Recommended: {} ({}% confidence)",
            horses.join(", "),
            prediction.confidence
        );
        if !prediction.reasoning.is_empty() {
            let _ = writeln!(out, "  {}", prediction.reasoning);
        }
    }

    if let Some(notice) = &state.notice {
        let _ = writeln!(out, "! {}", notice);
    }

    out
}
