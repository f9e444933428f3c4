//! Paddock Session - outcome history and analysis orchestration
//!
//! Tracks race results for one session and asks the inference service for a
//! recommendation whenever the history is long enough:
//!
//! - **History**: newest-first log of results with a revision counter
//! - **Gate**: skips analysis below three results, windows the last twenty
//! - **Filter**: surfaces only predictions with confidence of 75 or more
//! - **Machine**: pure transitions over the session state
//! - **Orchestrator**: the task that owns the machine and runs analyses
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  Intent   ┌──────────────────────────────────────┐
//! │ Presentation │ ────────▶ │ Orchestrator                         │
//! │              │ ◀──────── │  History ─▶ Gate ─▶ Client ─▶ Filter │
//! └──────────────┘  watch    │          SessionState                │
//!                            └──────────────────────────────────────┘
//! ```

pub mod audit;
pub mod config;
pub mod filter;
pub mod gate;
pub mod history;
pub mod machine;
pub mod orchestrator;

// Re-export main types
pub use audit::{AnalysisEntry, AnalysisLog, AnalysisStats};
pub use config::{BackendConfig, ConfigError, GeneralConfig, PaddockConfig};
pub use filter::CONFIDENCE_THRESHOLD;
pub use gate::{GateDecision, ANALYSIS_WINDOW, MIN_HISTORY_FOR_ANALYSIS};
pub use history::{History, HistoryError, Outcome, OutcomeValue};
pub use machine::{
    AnalysisTicket, Intent, IntentAck, IntentError, SessionMachine, SessionState, Settlement,
};
pub use orchestrator::{Orchestrator, SessionError, SessionHandle};
