//! Orchestrator behaviour under interleaved intents and slow analyses.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use paddock_agent::{
    AnalysisRequest, ContractViolation, InferenceClient, InferenceError, LlmError, Prediction,
};
use paddock_session::{
    GeneralConfig, IntentAck, IntentError, Orchestrator, SessionError, SessionHandle, SessionState,
    Settlement,
};

type Reply = Result<Prediction, InferenceError>;

/// Client whose calls block until the test releases a reply.
struct ScriptedClient {
    replies: Mutex<mpsc::UnboundedReceiver<Reply>>,
    started: mpsc::UnboundedSender<AnalysisRequest>,
    outstanding: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

struct Script {
    client: Arc<ScriptedClient>,
    replies: mpsc::UnboundedSender<Reply>,
    started: mpsc::UnboundedReceiver<AnalysisRequest>,
}

impl Script {
    fn new() -> Self {
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let (started_tx, started_rx) = mpsc::unbounded_channel();
        Self {
            client: Arc::new(ScriptedClient {
                replies: Mutex::new(reply_rx),
                started: started_tx,
                outstanding: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }),
            replies: reply_tx,
            started: started_rx,
        }
    }

    fn spawn(&self) -> SessionHandle {
        Orchestrator::spawn(self.client.clone(), &GeneralConfig::default())
    }

    /// Wait for the next call to reach the client.
    async fn next_call(&mut self) -> AnalysisRequest {
        tokio::time::timeout(Duration::from_secs(5), self.started.recv())
            .await
            .expect("no analysis started")
            .expect("client dropped")
    }

    fn reply(&self, reply: Reply) {
        self.replies.send(reply).expect("client dropped");
    }

    fn calls(&self) -> usize {
        self.client.calls.load(Ordering::SeqCst)
    }

    fn peak(&self) -> usize {
        self.client.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceClient for ScriptedClient {
    async fn infer(&self, request: &AnalysisRequest) -> Result<Prediction, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _ = self.started.send(request.clone());

        let reply = self.replies.lock().await.recv().await;

        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        reply.unwrap_or_else(|| {
            Err(InferenceError::Transport(LlmError::Unavailable(
                "script closed".to_string(),
            )))
        })
    }
}

fn prediction(confidence: u8, horses: [u8; 3]) -> Prediction {
    Prediction {
        confidence,
        recommended_values: horses,
        reasoning: "scripted".to_string(),
    }
}

async fn wait_until(
    handle: &SessionHandle,
    check: impl FnMut(&SessionState) -> bool,
) -> SessionState {
    let mut rx = handle.subscribe();
    let state = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(check))
        .await
        .expect("timed out waiting for state")
        .expect("session closed")
        .clone();
    state
}

/// Wait until `count` analyses have settled and return their settlements, oldest first.
async fn wait_settled(handle: &SessionHandle, count: usize) -> Vec<Settlement> {
    for _ in 0..500 {
        let log = handle.analysis_log(usize::MAX).await.unwrap();
        let settled: Vec<Settlement> = log
            .iter()
            .rev()
            .filter_map(|entry| entry.settlement.clone())
            .collect();
        if settled.len() >= count {
            return settled;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("analyses did not settle");
}

#[tokio::test]
async fn scenario_confident_prediction_is_surfaced() {
    let mut script = Script::new();
    let handle = script.spawn();

    for value in [2, 1, 4] {
        handle.add_outcome(value).await.unwrap();
    }

    let request = script.next_call().await;
    assert_eq!(request.results, vec![2, 1, 4]);
    assert_eq!(request.watched, vec![3, 4, 5, 6]);
    assert!(handle.state().busy);

    script.reply(Ok(prediction(80, [3, 5, 6])));

    let state = wait_until(&handle, |s| !s.busy).await;
    assert_eq!(state.current_prediction, Some(prediction(80, [3, 5, 6])));
    assert!(state.prediction_visible);
}

#[tokio::test]
async fn scenario_low_confidence_is_dropped() {
    let mut script = Script::new();
    let handle = script.spawn();

    for value in [2, 1, 4] {
        handle.add_outcome(value).await.unwrap();
    }
    script.next_call().await;
    script.reply(Ok(prediction(60, [3, 5, 6])));

    let state = wait_until(&handle, |s| !s.busy).await;
    assert_eq!(state.current_prediction, None);
    assert!(!state.prediction_visible);
    assert_eq!(
        wait_settled(&handle, 1).await,
        vec![Settlement::Filtered { confidence: 60 }]
    );
}

#[tokio::test]
async fn scenario_undo_below_minimum_skips_analysis() {
    let mut script = Script::new();
    let handle = script.spawn();

    handle.add_outcome(5).await.unwrap();
    handle.add_outcome(3).await.unwrap();
    assert_eq!(script.calls(), 0);

    handle.add_outcome(4).await.unwrap();
    script.next_call().await;

    handle.undo().await.unwrap();
    let state = handle.state();
    assert_eq!(state.history.len(), 2);
    assert!(!state.busy);
    assert_eq!(state.current_prediction, None);

    // The call issued for three results resolves late and is ignored
    script.reply(Ok(prediction(99, [4, 4, 4])));
    assert_eq!(wait_settled(&handle, 1).await, vec![Settlement::Stale]);

    let state = handle.state();
    assert_eq!(state.current_prediction, None);
    assert!(!state.prediction_visible);
    assert_eq!(script.calls(), 1);
}

#[tokio::test]
async fn clear_discards_late_result() {
    let mut script = Script::new();
    let handle = script.spawn();

    for value in [1, 2, 3] {
        handle.add_outcome(value).await.unwrap();
    }
    script.next_call().await;

    assert_eq!(handle.clear().await.unwrap(), IntentAck::Accepted);
    let state = handle.state();
    assert!(state.history.is_empty());
    assert!(!state.busy);

    script.reply(Ok(prediction(100, [3, 4, 5])));
    assert_eq!(wait_settled(&handle, 1).await, vec![Settlement::Stale]);

    let state = handle.state();
    assert_eq!(state.current_prediction, None);
    assert!(!state.prediction_visible);
    assert!(!state.busy);
}

#[tokio::test]
async fn add_rejected_while_busy() {
    let mut script = Script::new();
    let handle = script.spawn();

    for value in [1, 2, 3] {
        handle.add_outcome(value).await.unwrap();
    }
    script.next_call().await;

    assert_eq!(
        handle.add_outcome(4).await,
        Err(SessionError::Rejected(IntentError::Busy))
    );
    assert_eq!(handle.state().history.len(), 3);

    // Dismiss is still serviced while the call is outstanding
    assert_eq!(
        handle.dismiss_prediction().await.unwrap(),
        IntentAck::Ignored
    );
    assert!(handle.state().busy);

    script.reply(Ok(prediction(90, [3, 5, 6])));
    wait_until(&handle, |s| !s.busy).await;
    assert_eq!(handle.add_outcome(4).await.unwrap(), IntentAck::Accepted);
}

#[tokio::test]
async fn undo_while_busy_reanalyzes_remaining_history() {
    let mut script = Script::new();
    let handle = script.spawn();

    for value in [1, 2, 3] {
        handle.add_outcome(value).await.unwrap();
    }
    script.next_call().await;
    script.reply(Ok(prediction(10, [1, 1, 1])));
    wait_until(&handle, |s| !s.busy).await;

    handle.add_outcome(6).await.unwrap();
    let first = script.next_call().await;
    assert_eq!(first.results, vec![1, 2, 3, 6]);

    handle.undo().await.unwrap();
    assert!(handle.state().busy);

    script.reply(Ok(prediction(99, [6, 6, 6])));
    let follow_up = script.next_call().await;
    assert_eq!(follow_up.results, vec![1, 2, 3]);
    assert_eq!(handle.state().current_prediction, None);

    script.reply(Ok(prediction(76, [2, 3, 4])));
    let state = wait_until(&handle, |s| !s.busy).await;
    assert_eq!(state.current_prediction, Some(prediction(76, [2, 3, 4])));
    assert_eq!(script.peak(), 1);
}

#[tokio::test]
async fn failures_return_to_idle_without_retry() {
    let mut script = Script::new();
    let handle = script.spawn();

    for value in [3, 3, 3] {
        handle.add_outcome(value).await.unwrap();
    }
    script.next_call().await;
    script.reply(Err(InferenceError::Transport(LlmError::NetworkError(
        "timed out".to_string(),
    ))));

    let state = wait_until(&handle, |s| !s.busy).await;
    assert_eq!(state.current_prediction, None);
    assert!(state.notice.is_some());
    assert_eq!(state.history.len(), 3);

    // A fresh result triggers a fresh attempt
    handle.add_outcome(4).await.unwrap();
    assert_eq!(handle.state().notice, None);
    script.next_call().await;
    script.reply(Err(InferenceError::MalformedResponse(
        ContractViolation::WrongHorseCount(2),
    )));
    wait_until(&handle, |s| !s.busy).await;

    let settled = wait_settled(&handle, 2).await;
    assert!(settled
        .iter()
        .all(|s| matches!(s, Settlement::Failed { .. })));
    assert_eq!(script.calls(), 2);
}

#[tokio::test]
async fn at_most_one_call_outstanding() {
    let mut script = Script::new();
    let handle = script.spawn();

    // Fill, clear mid-flight, refill, undo mid-flight: every step that would
    // start a second call must wait for the first to settle
    for value in [1, 2, 3] {
        handle.add_outcome(value).await.unwrap();
    }
    script.next_call().await;
    handle.clear().await.unwrap();

    for value in [4, 5, 6] {
        handle.add_outcome(value).await.unwrap();
    }
    assert!(handle.state().busy);
    handle.undo().await.unwrap();
    handle.dismiss_prediction().await.unwrap();
    assert_eq!(script.calls(), 1);

    // Two results left: nothing queued behind the superseded call
    script.reply(Ok(prediction(90, [1, 2, 3])));
    assert_eq!(wait_settled(&handle, 1).await, vec![Settlement::Stale]);
    assert_eq!(script.calls(), 1);

    handle.add_outcome(1).await.unwrap();
    let request = script.next_call().await;
    assert_eq!(request.results, vec![4, 5, 1]);
    script.reply(Ok(prediction(75, [4, 5, 6])));

    let state = wait_until(&handle, |s| !s.busy).await;
    assert_eq!(state.current_prediction, Some(prediction(75, [4, 5, 6])));
    assert_eq!(script.peak(), 1);
}

#[tokio::test]
async fn history_counts_adds_minus_undos() {
    let script = Script::new();
    let handle = script.spawn();

    handle.add_outcome(1).await.unwrap();
    handle.add_outcome(2).await.unwrap();
    handle.undo().await.unwrap();
    handle.undo().await.unwrap();
    assert_eq!(handle.undo().await.unwrap(), IntentAck::Ignored);
    handle.add_outcome(6).await.unwrap();
    handle.add_outcome(5).await.unwrap();

    let state = handle.state();
    let stored: Vec<u8> = state.history.iter().map(|o| o.value.get()).collect();
    assert_eq!(stored, vec![5, 6]);
    assert_eq!(script.calls(), 0);
}

#[tokio::test]
async fn invalid_outcome_rejected() {
    let script = Script::new();
    let handle = script.spawn();

    let err = handle.add_outcome(0).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Rejected(IntentError::InvalidOutcome(_))
    ));
    assert!(handle.state().history.is_empty());
}
