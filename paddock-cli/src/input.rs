//! Line commands read from stdin.

use paddock_session::Intent;

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Forward to the session
    Intent(Intent),
    /// Print recent analysis attempts
    Log,
    /// Print analysis counts
    Stats,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub const HELP: &str = "\
  1-6       record the winning horse
  undo      remove the most recent result
  clear     drop the whole history
  dismiss   hide the current recommendation
  log       show recent analyses
  stats     show analysis counts
  quit      end the session";

/// Parse a line. Numbers are passed through unchecked; the session rejects
/// anything outside 1..=6.
pub fn parse(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }

    if let Ok(value) = line.parse::<u8>() {
        return Input::Intent(Intent::AddOutcome { value });
    }

    match line.to_ascii_lowercase().as_str() {
        "u" | "undo" => Input::Intent(Intent::Undo),
        "c" | "clear" => Input::Intent(Intent::Clear),
        "d" | "dismiss" => Input::Intent(Intent::DismissPrediction),
        "log" => Input::Log,
        "stats" => Input::Stats,
        "h" | "help" | "?" => Input::Help,
        "q" | "quit" | "exit" => Input::Quit,
        _ => Input::Unknown(line.to_string()),
    }
}
