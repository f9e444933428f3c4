//! Orchestrator - runs the session machine against an inference client.
//!
//! The orchestrator is a single task owning the [`SessionMachine`]. Intents
//! arrive over a channel, analyses run on spawned tasks and report back over
//! a second channel, and every change is published on a `watch` channel for
//! the presentation layer.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use paddock_agent::{InferenceClient, InferenceError, LlmError, Prediction};

use crate::audit::{AnalysisEntry, AnalysisLog, AnalysisStats};
use crate::config::GeneralConfig;
use crate::machine::{AnalysisTicket, Intent, IntentAck, IntentError, SessionMachine, SessionState};

/// Buffered intents before senders wait.
const COMMAND_BUFFER: usize = 32;

/// Error types for the session handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The orchestrator task has stopped
    #[error("Session closed")]
    Closed,

    /// The intent was refused
    #[error(transparent)]
    Rejected(#[from] IntentError),
}

type AnalysisResult = (u64, Result<Prediction, InferenceError>);

enum Command {
    Intent {
        intent: Intent,
        reply: oneshot::Sender<Result<IntentAck, IntentError>>,
    },
    AnalysisLog {
        limit: usize,
        reply: oneshot::Sender<Vec<AnalysisEntry>>,
    },
    AnalysisStats {
        reply: oneshot::Sender<AnalysisStats>,
    },
    Shutdown,
}

/// Owner of one session.
pub struct Orchestrator {
    machine: SessionMachine,
    client: Arc<dyn InferenceClient>,
    audit: Option<AnalysisLog>,
    state_tx: watch::Sender<SessionState>,
    results_tx: mpsc::Sender<AnalysisResult>,
}

impl Orchestrator {
    /// Start a session using `client` for every analysis.
    ///
    /// Must be called from within a tokio runtime. The session ends when
    /// [`SessionHandle::shutdown`] is called or every handle is dropped.
    pub fn spawn(client: Arc<dyn InferenceClient>, config: &GeneralConfig) -> SessionHandle {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        // One outstanding analysis at a time; a small buffer is plenty
        let (results_tx, results_rx) = mpsc::channel(4);
        let (state_tx, state_rx) = watch::channel(SessionState::default());

        let audit = config
            .audit_enabled
            .then(|| AnalysisLog::with_max_entries(config.audit_capacity));

        let orchestrator = Self {
            machine: SessionMachine::new(),
            client,
            audit,
            state_tx,
            results_tx,
        };

        tokio::spawn(orchestrator.run(commands_rx, results_rx));
        info!("Session started");

        SessionHandle {
            commands: commands_tx,
            state_rx,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut results: mpsc::Receiver<AnalysisResult>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.on_command(command),
                },
                Some((revision, outcome)) = results.recv() => {
                    self.on_result(revision, outcome);
                }
            }
        }

        info!(
            outstanding = ?self.machine.in_flight(),
            "Session ended"
        );
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Intent { intent, reply } => {
                debug!(?intent, "Handling intent");
                let result = self.machine.handle(intent).map(|transition| {
                    if let Some(ticket) = transition.start {
                        self.start(ticket);
                    }
                    transition.ack
                });
                if let Err(err) = &result {
                    debug!(?intent, error = %err, "Intent rejected");
                }
                self.publish();
                let _ = reply.send(result);
            }
            Command::AnalysisLog { limit, reply } => {
                let entries = self
                    .audit
                    .as_ref()
                    .map(|log| log.recent(limit))
                    .unwrap_or_default();
                let _ = reply.send(entries);
            }
            Command::AnalysisStats { reply } => {
                let stats = self
                    .audit
                    .as_ref()
                    .map(|log| log.stats())
                    .unwrap_or_default();
                let _ = reply.send(stats);
            }
            Command::Shutdown => {}
        }
    }

    fn on_result(&mut self, revision: u64, outcome: Result<Prediction, InferenceError>) {
        let settled = self.machine.settle(revision, outcome);

        if let Some(log) = self.audit.as_mut() {
            log.log_settled(revision, &settled.settlement);
        }
        if let Some(ticket) = settled.next {
            self.start(ticket);
        }
        self.publish();
    }

    /// Run the ticket's analysis on its own task.
    fn start(&mut self, ticket: AnalysisTicket) {
        debug!(
            revision = ticket.revision,
            results = ticket.request.results.len(),
            "Starting analysis"
        );
        if let Some(log) = self.audit.as_mut() {
            log.log_issued(&ticket);
        }

        let client = Arc::clone(&self.client);
        let results = self.results_tx.clone();
        let AnalysisTicket { revision, request } = ticket;
        tokio::spawn(async move {
            let call = tokio::spawn(async move { client.infer(&request).await });
            // A panicking client must still settle its revision
            let outcome = call.await.unwrap_or_else(|err| {
                warn!(revision, error = %err, "Analysis task aborted");
                Err(InferenceError::Transport(LlmError::Unavailable(format!(
                    "analysis task aborted: {}",
                    err
                ))))
            });
            // Receiver gone means the session ended; nothing to report to
            let _ = results.send((revision, outcome)).await;
        });
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.machine.state().clone());
    }
}

/// Cloneable handle to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    state_rx: watch::Receiver<SessionState>,
}

impl SessionHandle {
    /// Submit an intent and wait until it has been applied.
    ///
    /// The published state already reflects the intent when this returns.
    pub async fn submit(&self, intent: Intent) -> Result<IntentAck, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Intent { intent, reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        Ok(rx.await.map_err(|_| SessionError::Closed)??)
    }

    /// Record a race result.
    pub async fn add_outcome(&self, value: u8) -> Result<IntentAck, SessionError> {
        self.submit(Intent::AddOutcome { value }).await
    }

    /// Remove the most recent result.
    pub async fn undo(&self) -> Result<IntentAck, SessionError> {
        self.submit(Intent::Undo).await
    }

    /// Drop the whole history.
    pub async fn clear(&self) -> Result<IntentAck, SessionError> {
        self.submit(Intent::Clear).await
    }

    /// Hide the current recommendation.
    pub async fn dismiss_prediction(&self) -> Result<IntentAck, SessionError> {
        self.submit(Intent::DismissPrediction).await
    }

    /// Latest published state.
    pub fn state(&self) -> SessionState {
        self.state_rx.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Most recent analysis attempts, newest first.
    pub async fn analysis_log(&self, limit: usize) -> Result<Vec<AnalysisEntry>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::AnalysisLog { limit, reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Analysis counts by settlement.
    pub async fn analysis_stats(&self) -> Result<AnalysisStats, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::AnalysisStats { reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Stop the session. Later calls fail with [`SessionError::Closed`].
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }
}
