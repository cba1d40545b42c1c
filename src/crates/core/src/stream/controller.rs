//! Streaming protocol controller
//!
//! Owns the single active turn: builds the request from reduced history,
//! opens the stream through the injected transport, routes named events into
//! turn state, and publishes every change over one update feed. Starting a
//! new turn supersedes the previous one (single-flight, last caller wins).

use std::sync::{Arc, Mutex};

use futures::StreamExt;
use log::{debug, error, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::chart;
use crate::credentials::{CredentialProvider, InvalidEndpoint};
use crate::history;
use crate::protocol::envelope::parse_final_text;
use crate::protocol::wire::{
    StatusPayload, ThinkingDeltaPayload, EVENT_RESPONSE, EVENT_RESPONSE_CHART,
    EVENT_RESPONSE_STATUS, EVENT_THINKING_DELTA,
};
use crate::state::{StateUpdate, TurnSnapshot};
use crate::stream::transport::{AgentTransport, StreamEvent, TurnRequest};

pub struct StreamController {
    transport: Arc<dyn AgentTransport>,
    credentials: Arc<dyn CredentialProvider>,
    shared: Arc<Shared>,
    active: Mutex<Option<ActiveTurn>>,
}

struct Shared {
    state: Mutex<GuardedState>,
    updates: mpsc::UnboundedSender<StateUpdate>,
}

struct GuardedState {
    snapshot: TurnSnapshot,
    /// Bumped at every turn start; a task whose sequence no longer matches
    /// may not touch state
    turn_seq: u64,
}

struct ActiveTurn {
    token: CancellationToken,
    #[allow(dead_code)]
    handle: JoinHandle<()>,
}

impl StreamController {
    /// Create a controller and the update feed consumed by the presentation
    /// layer.
    pub fn new(
        transport: Arc<dyn AgentTransport>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> (Self, mpsc::UnboundedReceiver<StateUpdate>) {
        let (updates, receiver) = mpsc::unbounded_channel();
        let controller = Self {
            transport,
            credentials,
            shared: Arc::new(Shared {
                state: Mutex::new(GuardedState {
                    snapshot: TurnSnapshot::default(),
                    turn_seq: 0,
                }),
                updates,
            }),
            active: Mutex::new(None),
        };
        (controller, receiver)
    }

    /// Current state, cloned.
    pub fn snapshot(&self) -> TurnSnapshot {
        self.shared.state.lock().unwrap().snapshot.clone()
    }

    /// Start a turn for `question`, superseding any turn still in flight.
    ///
    /// Only an unconstructable endpoint URL is fatal; every decode-level
    /// failure during the turn degrades gracefully instead.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_turn(&self, question: &str) -> Result<(), InvalidEndpoint> {
        let credentials = self.credentials.credentials();
        let url = credentials.agent_run_url()?;

        let mut active = self.active.lock().unwrap();
        // Signal the superseded turn before replacing its token
        if let Some(previous) = active.take() {
            previous.token.cancel();
        }

        let (seq, body) = {
            let mut guarded = self.shared.state.lock().unwrap();
            guarded.turn_seq += 1;
            let snapshot = &mut guarded.snapshot;
            snapshot.status.clear();
            snapshot.thinking.clear();
            snapshot.final_answer = None;
            snapshot.chart = None;
            snapshot.busy = true;
            snapshot.questions.push(question.to_string());
            let body = history::build_request_body(question, &snapshot.history);
            (guarded.turn_seq, body)
        };
        let _ = self.shared.updates.send(StateUpdate::TurnStarted {
            question: question.to_string(),
        });

        let request = TurnRequest {
            url,
            token: credentials.token,
            body,
        };
        let token = CancellationToken::new();
        let task_token = token.clone();
        let transport = Arc::clone(&self.transport);
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            run_turn(transport, request, shared, seq, task_token).await;
        });
        *active = Some(ActiveTurn { token, handle });
        Ok(())
    }

    /// Cancel the active turn. Idempotent; a no-op without one.
    pub fn cancel(&self) {
        let mut active = self.active.lock().unwrap();
        if let Some(previous) = active.take() {
            previous.token.cancel();
            drop(active);
            self.shared.state.lock().unwrap().snapshot.busy = false;
        }
    }

    /// Probe the agent describe endpoint, reduced to a status string.
    pub async fn check_connection(&self) -> String {
        self.transport
            .check_connection(&self.credentials.credentials())
            .await
    }
}

/// The single streaming task of a turn. Each iteration suspends on the next
/// transport event; cancellation is sampled once per received event.
async fn run_turn(
    transport: Arc<dyn AgentTransport>,
    request: TurnRequest,
    shared: Arc<Shared>,
    seq: u64,
    token: CancellationToken,
) {
    let mut stream = match transport.open_turn(request).await {
        Ok(stream) => stream,
        Err(err) => {
            error!("failed to open agent stream: {err}");
            finish_turn(&shared, seq);
            return;
        }
    };

    while let Some(item) = stream.next().await {
        if token.is_cancelled() {
            return;
        }
        let event = match item {
            Ok(event) => event,
            Err(err) => {
                // Already-published state stands; the loop just ends
                error!("agent stream error: {err}");
                break;
            }
        };
        match event {
            StreamEvent::Open => publish(&shared, seq, |snapshot| {
                snapshot.connected = true;
                Some(StateUpdate::Connected(true))
            }),
            StreamEvent::Closed => publish(&shared, seq, |snapshot| {
                snapshot.connected = false;
                Some(StateUpdate::Connected(false))
            }),
            StreamEvent::Message { event, data } => route_event(&shared, seq, &event, &data),
        }
    }

    finish_turn(&shared, seq);
}

/// Mutate the snapshot and emit the resulting update, unless the turn has
/// been superseded.
fn publish<F>(shared: &Shared, seq: u64, mutate: F)
where
    F: FnOnce(&mut TurnSnapshot) -> Option<StateUpdate>,
{
    let update = {
        let mut guarded = shared.state.lock().unwrap();
        if guarded.turn_seq != seq {
            debug!("dropping update from superseded turn {seq}");
            return;
        }
        mutate(&mut guarded.snapshot)
    };
    if let Some(update) = update {
        let _ = shared.updates.send(update);
    }
}

fn finish_turn(shared: &Shared, seq: u64) {
    publish(shared, seq, |snapshot| {
        snapshot.busy = false;
        Some(StateUpdate::TurnEnded)
    });
}

fn route_event(shared: &Shared, seq: u64, event: &str, data: &str) {
    if event.contains(EVENT_RESPONSE_STATUS) {
        match serde_json::from_str::<StatusPayload>(data) {
            Ok(payload) => {
                let message = payload.message;
                publish(shared, seq, move |snapshot| {
                    snapshot.status = message.clone();
                    Some(StateUpdate::Status(message))
                });
            }
            Err(err) => debug!("ignoring undecodable status event: {err}"),
        }
        return;
    }

    if event.contains(EVENT_THINKING_DELTA) {
        match serde_json::from_str::<ThinkingDeltaPayload>(data) {
            Ok(payload) => {
                let text = payload.text;
                publish(shared, seq, move |snapshot| {
                    snapshot.thinking.push_str(&text);
                    Some(StateUpdate::ThinkingDelta(text))
                });
            }
            Err(err) => debug!("ignoring undecodable thinking delta: {err}"),
        }
        return;
    }

    if event == EVENT_RESPONSE {
        // The raw envelope is kept verbatim for future history reduction,
        // decodable or not
        let raw = data.to_string();
        let final_text = parse_final_text(data);
        publish(shared, seq, move |snapshot| {
            snapshot.history.push(raw);
            snapshot.final_answer = Some(final_text.clone());
            Some(StateUpdate::FinalAnswer(final_text))
        });
        return;
    }

    if event == EVENT_RESPONSE_CHART {
        match chart::parse_chart_spec(data) {
            Ok(spec) => publish(shared, seq, move |snapshot| {
                snapshot.chart = Some(spec.clone());
                Some(StateUpdate::Chart(spec))
            }),
            Err(err) => warn!("chart payload did not decode, leaving chart empty: {err}"),
        }
        return;
    }

    debug!("ignoring unhandled event \"{event}\"");
}
