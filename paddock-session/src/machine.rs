//! Session state machine.
//!
//! Pure transitions over [`SessionState`]: intents mutate the history
//! synchronously and may hand back an [`AnalysisTicket`] to run; results come
//! back through [`SessionMachine::settle`]. Nothing here awaits.
//!
//! Tickets carry the history revision they were issued for. A result whose
//! revision is no longer current is discarded, so a call superseded by a
//! clear or an undo can never bring back a recommendation.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use paddock_agent::{AnalysisRequest, InferenceError, Prediction};

use crate::filter::filter;
use crate::gate::{self, GateDecision, MIN_HISTORY_FOR_ANALYSIS};
use crate::history::{History, HistoryError, OutcomeValue};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// A user intent from the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    /// Record a race result
    AddOutcome { value: u8 },
    /// Remove the most recent result
    Undo,
    /// Drop the whole history
    Clear,
    /// Hide the current recommendation
    DismissPrediction,
}

/// How an accepted intent was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentAck {
    /// The intent changed the session
    Accepted,
    /// The intent was valid but had nothing to act on
    Ignored,
}

/// Reasons an intent is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntentError {
    /// An analysis is running; new results must wait
    #[error("Analysis in progress")]
    Busy,

    /// Not a horse number
    #[error("Invalid outcome: {0}")]
    InvalidOutcome(#[from] HistoryError),
}

/// Everything the presentation layer renders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct SessionState {
    /// Recorded results, newest first
    pub history: History,
    /// Whether an analysis for the current history is pending
    pub busy: bool,
    /// Latest recommendation that passed the confidence filter
    pub current_prediction: Option<Prediction>,
    /// Whether the recommendation should be displayed
    pub prediction_visible: bool,
    /// Transient notice about the last failed analysis
    pub notice: Option<String>,
}

impl SessionState {
    fn hide_prediction(&mut self) {
        self.current_prediction = None;
        self.prediction_visible = false;
    }
}

/// An analysis to run for a specific history revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisTicket {
    /// History revision the request was built from
    pub revision: u64,
    /// The request to send
    pub request: AnalysisRequest,
}

/// What happened to a finished analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Settlement {
    /// Passed the filter and is now displayed
    Surfaced { confidence: u8 },
    /// Valid but below the confidence threshold
    Filtered { confidence: u8 },
    /// The call failed
    Failed { kind: String, message: String },
    /// History changed while the call was running; result discarded
    Stale,
}

/// Result of handling an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub ack: IntentAck,
    /// Analysis to start now, if any
    pub start: Option<AnalysisTicket>,
}

impl Transition {
    fn accepted(start: Option<AnalysisTicket>) -> Self {
        Self {
            ack: IntentAck::Accepted,
            start,
        }
    }

    fn ignored() -> Self {
        Self {
            ack: IntentAck::Ignored,
            start: None,
        }
    }
}

/// Result of settling an analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settled {
    pub settlement: Settlement,
    /// Follow-up analysis to start now, if any
    pub next: Option<AnalysisTicket>,
}

/// Owner of the session state.
///
/// At most one ticket is outstanding at a time. When the history changes
/// while a call is outstanding and still warrants analysis, a follow-up is
/// queued and issued as soon as the outstanding call settles.
#[derive(Debug, Default)]
pub struct SessionMachine {
    state: SessionState,
    /// Revision of the outstanding call
    in_flight: Option<u64>,
    /// Whether the current history still needs a call once `in_flight` settles
    queued: bool,
}

impl SessionMachine {
    /// Create a machine with an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Revision of the outstanding call, if any.
    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    /// Apply an intent.
    pub fn handle(&mut self, intent: Intent) -> Result<Transition, IntentError> {
        match intent {
            Intent::AddOutcome { value } => self.add_outcome(value),
            Intent::Undo => Ok(self.undo()),
            Intent::Clear => Ok(self.clear()),
            Intent::DismissPrediction => Ok(self.dismiss()),
        }
    }

    fn add_outcome(&mut self, value: u8) -> Result<Transition, IntentError> {
        if self.state.busy {
            return Err(IntentError::Busy);
        }
        let value = OutcomeValue::new(value)?;

        self.state.notice = None;
        self.state.hide_prediction();
        self.state.history.append(value);
        debug!(value = %value, revision = self.state.history.revision(), "Outcome recorded");

        Ok(Transition::accepted(self.request_analysis()))
    }

    fn undo(&mut self) -> Transition {
        self.state.notice = None;
        match self.state.history.remove_head() {
            Err(_) => {
                debug!("Undo on empty history ignored");
                Transition::ignored()
            }
            Ok(removed) => {
                debug!(value = %removed.value, revision = self.state.history.revision(), "Outcome removed");
                self.state.hide_prediction();

                if self.state.history.len() < MIN_HISTORY_FOR_ANALYSIS {
                    self.state.busy = false;
                    self.queued = false;
                    Transition::accepted(None)
                } else {
                    Transition::accepted(self.request_analysis())
                }
            }
        }
    }

    fn clear(&mut self) -> Transition {
        self.state.history.clear();
        self.state.hide_prediction();
        self.state.notice = None;
        self.state.busy = false;
        self.queued = false;
        info!(revision = self.state.history.revision(), "History cleared");
        Transition::accepted(None)
    }

    fn dismiss(&mut self) -> Transition {
        let notice = self.state.notice.take();
        if self.state.current_prediction.is_none() && !self.state.prediction_visible {
            return if notice.is_some() {
                Transition::accepted(None)
            } else {
                Transition::ignored()
            };
        }
        self.state.hide_prediction();
        Transition::accepted(None)
    }

    /// Consult the gate for the current history and issue or queue a ticket.
    fn request_analysis(&mut self) -> Option<AnalysisTicket> {
        match gate::evaluate(&self.state.history) {
            GateDecision::Skip => {
                self.state.busy = false;
                self.queued = false;
                None
            }
            GateDecision::Proceed(request) => {
                self.state.busy = true;
                if self.in_flight.is_some() {
                    debug!("Analysis outstanding, queueing follow-up");
                    self.queued = true;
                    None
                } else {
                    Some(self.issue(request))
                }
            }
        }
    }

    fn issue(&mut self, request: AnalysisRequest) -> AnalysisTicket {
        let revision = self.state.history.revision();
        self.in_flight = Some(revision);
        self.queued = false;
        AnalysisTicket { revision, request }
    }

    /// Apply the result of the analysis issued for `revision`.
    pub fn settle(
        &mut self,
        revision: u64,
        outcome: Result<Prediction, InferenceError>,
    ) -> Settled {
        if self.in_flight != Some(revision) {
            warn!(revision, in_flight = ?self.in_flight, "Result for unknown analysis dropped");
            return Settled {
                settlement: Settlement::Stale,
                next: None,
            };
        }
        self.in_flight = None;

        if revision != self.state.history.revision() {
            debug!(
                revision,
                current = self.state.history.revision(),
                "Discarding stale analysis"
            );
            let next = if self.queued {
                self.queued = false;
                self.request_analysis()
            } else {
                self.state.busy = false;
                None
            };
            return Settled {
                settlement: Settlement::Stale,
                next,
            };
        }

        self.state.busy = false;

        let settlement = match outcome {
            Ok(prediction) => {
                let confidence = prediction.confidence;
                match filter(prediction) {
                    Some(prediction) => {
                        info!(
                            revision,
                            confidence,
                            recommended = ?prediction.recommended_values,
                            "Prediction surfaced"
                        );
                        self.state.current_prediction = Some(prediction);
                        self.state.prediction_visible = true;
                        Settlement::Surfaced { confidence }
                    }
                    None => {
                        info!(revision, confidence, "Prediction below threshold");
                        self.state.hide_prediction();
                        Settlement::Filtered { confidence }
                    }
                }
            }
            Err(err) => {
                warn!(revision, kind = err.kind(), error = %err, "Analysis failed");
                self.state.hide_prediction();
                self.state.notice = Some(format!("Analysis failed: {}", err));
                Settlement::Failed {
                    kind: err.kind().to_string(),
                    message: err.to_string(),
                }
            }
        };

        Settled {
            settlement,
            next: None,
        }
    }
}
