//! Session controller: drives rounds until no call is left unanswered.

pub mod events;
pub mod round;
pub mod state;
pub mod transcript;

pub use events::{SessionEvent, SessionEventPayload, SessionEvents};
pub use round::{NextStep, RoundOutcome};
pub use state::{SessionState, SessionStatus};
pub use transcript::Conversation;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use events::SessionEmitter;

use crate::config::{DispatchMode, SessionConfig};
use crate::dispatch::{DispatchNotice, DispatchReport, Dispatcher, PendingCall};
use crate::error::RondoError;
use crate::stream::{open_round, Accumulator};
use crate::tools::{ToolChoice, ToolRegistry};
use crate::transport::{CreateRequest, Transport};
use crate::types::{Input, InputItem, Response, ToolOutput, Usage};
use crate::util::timeout::maybe_timeout;

/// One conversation with the remote endpoint.
///
/// Rounds run strictly one after another. Cancellation through
/// [`Session::cancellation_token`] is honored while waiting for transport
/// events and while tools execute.
pub struct Session {
    id: Uuid,
    transport: Arc<dyn Transport>,
    dispatcher: Dispatcher,
    config: SessionConfig,
    conversation: Conversation,
    state: SessionState,
    round: usize,
    last_response: Option<Response>,
    /// Calls only the caller can answer.
    awaiting: Vec<PendingCall>,
    /// Call ids answered so far in this session.
    answered: HashSet<String>,
    usage: Usage,
    cancel: CancellationToken,
    emitter: SessionEmitter,
    events: Option<SessionEvents>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("transport", &self.transport.name())
            .field("model", &self.config.model)
            .field("state", &self.state)
            .field("round", &self.round)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session. Fails when the tool choice names an unregistered
    /// tool or the round limit is zero.
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: ToolRegistry,
        config: SessionConfig,
        input: impl Into<Input>,
    ) -> Result<Self, RondoError> {
        registry.validate_choice(&config.tool_choice)?;
        if config.max_rounds == 0 {
            return Err(RondoError::Configuration(
                "max_rounds must be at least 1".into(),
            ));
        }
        if config.model.trim().is_empty() {
            return Err(RondoError::Configuration("model must be set".into()));
        }

        let id = Uuid::new_v4();
        let (emitter, events) = SessionEmitter::open(id);
        let dispatcher = Dispatcher::new(Arc::new(registry))
            .with_tool_timeout(config.tool_timeout_ms.map(Duration::from_millis));
        let conversation = Conversation::new(config.store, input.into().into_items());

        debug!(
            session_id = %id,
            transport = transport.name(),
            model = config.model.as_str(),
            mode = %config.dispatch_mode,
            "session created"
        );

        Ok(Self {
            id,
            transport,
            dispatcher,
            config,
            conversation,
            state: SessionState::Idle,
            round: 0,
            last_response: None,
            awaiting: Vec::new(),
            answered: HashSet::new(),
            usage: Usage::default(),
            cancel: CancellationToken::new(),
            emitter,
            events: Some(events),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn status(&self) -> SessionStatus {
        self.state.status()
    }

    /// Number of rounds issued so far.
    pub fn round(&self) -> usize {
        self.round
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn last_response(&self) -> Option<&Response> {
        self.last_response.as_ref()
    }

    /// Token usage summed over every round.
    pub fn usage(&self) -> &Usage {
        &self.usage
    }

    /// Everything exchanged so far: the original input, every round's output
    /// items and every tool output batch.
    pub fn transcript(&self) -> &[InputItem] {
        self.conversation.transcript()
    }

    /// Calls waiting for [`Session::submit_tool_outputs`].
    pub fn pending_calls(&self) -> &[PendingCall] {
        &self.awaiting
    }

    /// The session's event stream. Can be taken once; it ends when the
    /// session reaches a terminal state.
    pub fn events(&mut self) -> Option<SessionEvents> {
        self.events.take()
    }

    /// Token that cancels the session from another task.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel between rounds. Use [`Session::cancellation_token`] to cancel a
    /// round in flight.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        if !self.state.is_terminal() {
            self.enter_cancelled();
        }
    }

    /// Advance exactly one round.
    pub async fn tick(&mut self) -> Result<RoundOutcome, RondoError> {
        if self.state.is_terminal() {
            return Err(RondoError::InvalidState(format!(
                "session is {}",
                self.state
            )));
        }
        if self.cancel.is_cancelled() {
            return Err(self.enter_cancelled());
        }
        if let Some(call) = self.awaiting.first() {
            let err = call.unhandled_error();
            return Err(self.fail(err));
        }
        if self.round >= self.config.max_rounds {
            return Err(self.fail(RondoError::RoundLimitExceeded(self.config.max_rounds)));
        }

        self.round += 1;
        let request = self.build_request();
        debug!(
            session_id = %self.id,
            round = self.round,
            items = request.input.len(),
            previous_response_id = request.previous_response_id.as_deref(),
            "issuing round"
        );
        self.transition(SessionState::RoundInFlight);

        let response = match self.consume_round(&request).await {
            Ok(response) => response,
            Err(RondoError::Cancelled) => return Err(self.enter_cancelled()),
            Err(err) => return Err(self.fail(err)),
        };

        self.transition(SessionState::EvaluatingOutputs);
        self.evaluate(response).await
    }

    /// Drive rounds until the session completes or stops for calls only the
    /// caller can answer.
    pub async fn run(&mut self) -> Result<RoundOutcome, RondoError> {
        loop {
            let outcome = self.tick().await?;
            match outcome.next {
                NextStep::Continue => continue,
                NextStep::Completed | NextStep::AwaitingToolOutputs => return Ok(outcome),
            }
        }
    }

    /// Answer calls left by the last round. Every output must answer a
    /// waiting call, and each call may be answered once.
    pub fn submit_tool_outputs(&mut self, outputs: Vec<ToolOutput>) -> Result<(), RondoError> {
        if self.state.is_terminal() {
            return Err(RondoError::InvalidState(format!(
                "session is {}",
                self.state
            )));
        }
        let mut seen = HashSet::new();
        for output in &outputs {
            let call = self
                .awaiting
                .iter()
                .find(|call| call.call_id() == output.call_id())
                .ok_or_else(|| {
                    RondoError::InvalidState(format!(
                        "no call {} is waiting for an output",
                        output.call_id()
                    ))
                })?;
            if call.output_kind() != output.kind() {
                return Err(RondoError::InvalidState(format!(
                    "call {} expects {}, got {}",
                    call.call_id(),
                    call.output_kind(),
                    output.kind()
                )));
            }
            if !seen.insert(output.call_id()) {
                return Err(RondoError::InvalidState(format!(
                    "call {} answered twice",
                    output.call_id()
                )));
            }
        }

        self.awaiting
            .retain(|call| !seen.contains(call.call_id()));
        for output in &outputs {
            debug!(session_id = %self.id, call_id = output.call_id(), "caller answered call");
            self.answered.insert(output.call_id().to_string());
        }
        self.conversation.push_tool_outputs(&outputs);
        Ok(())
    }

    fn build_request(&self) -> CreateRequest {
        let mut request = CreateRequest::new(&self.config.model, self.conversation.request_input());
        request.tools = self.dispatcher.registry().definitions();
        request.tool_choice = if self.round > 1
            && self.config.tool_choice.is_forced()
            && !self.config.persist_tool_choice
        {
            ToolChoice::Auto
        } else {
            self.config.tool_choice.clone()
        };
        request.store = self.config.store;
        request.stream = self.config.stream;
        request.previous_response_id = self.conversation.previous_response_id().map(String::from);
        request.instructions = self.config.instructions.clone();
        request.parallel_tool_calls = self.config.parallel_tool_calls;
        request.metadata = self.config.metadata.clone();
        request
    }

    /// Issue `request` and fold its events into the finalized response.
    async fn consume_round(&self, request: &CreateRequest) -> Result<Response, RondoError> {
        let mut events = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(RondoError::Cancelled),
            opened = open_round(self.transport.as_ref(), request) => opened?,
        };
        let idle = self.config.stream_idle_timeout_ms.map(Duration::from_millis);
        let mut accumulator = Accumulator::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(RondoError::Cancelled),
                next = maybe_timeout(idle, events.next()) => next?,
            };
            let Some(event) = next else {
                return Err(RondoError::IncompleteStream);
            };
            let event = event?;
            self.emitter.emit(
                self.round,
                SessionEventPayload::Response {
                    event: event.clone(),
                },
            );
            if let Some(response) = accumulator.apply(event)? {
                return Ok(response);
            }
        }
    }

    async fn evaluate(&mut self, response: Response) -> Result<RoundOutcome, RondoError> {
        if let Some(usage) = &response.usage {
            self.usage.merge(usage);
        }
        self.conversation.record_round(&response);
        self.last_response = Some(response.clone());

        if let Some(error) = response.failure() {
            return Err(self.fail(RondoError::ResponseFailed {
                code: error.code,
                message: error.message,
            }));
        }

        let report = match self.config.dispatch_mode {
            DispatchMode::Manual => DispatchReport::manual(&response, &self.answered),
            DispatchMode::Autonomous | DispatchMode::Inspect => {
                let emitter = &self.emitter;
                let round = self.round;
                let observer = move |notice: DispatchNotice| {
                    let payload = match notice {
                        DispatchNotice::Started {
                            call_id,
                            tool_name,
                            kind,
                        } => SessionEventPayload::ToolStarted {
                            call_id,
                            tool_name,
                            kind,
                        },
                        DispatchNotice::Finished { output } => {
                            SessionEventPayload::ToolFinished { output }
                        }
                    };
                    emitter.emit(round, payload);
                };
                let dispatched = self
                    .dispatcher
                    .dispatch(&response, &self.answered, &self.cancel, &observer)
                    .await;
                match dispatched {
                    Ok(report) => report,
                    Err(RondoError::Cancelled) => return Err(self.enter_cancelled()),
                    Err(err) => return Err(self.fail(err)),
                }
            }
        };

        for output in report.outputs.iter().chain(&report.hosted) {
            self.answered.insert(output.call_id().to_string());
        }

        let next = if !report.unhandled.is_empty() {
            if self.config.dispatch_mode == DispatchMode::Autonomous {
                let err = report.unhandled[0].unhandled_error();
                return Err(self.fail(err));
            }
            self.conversation.push_tool_outputs(&report.outputs);
            self.awaiting = report.unhandled.clone();
            NextStep::AwaitingToolOutputs
        } else if report.outputs.is_empty() {
            self.transition(SessionState::Completed);
            NextStep::Completed
        } else {
            self.conversation.push_tool_outputs(&report.outputs);
            NextStep::Continue
        };

        debug!(
            session_id = %self.id,
            round = self.round,
            outputs = report.outputs.len(),
            hosted = report.hosted.len(),
            awaiting = report.unhandled.len(),
            next = ?next,
            "round evaluated"
        );

        Ok(RoundOutcome {
            round: self.round,
            response,
            tool_outputs: report.outputs,
            hosted_results: report.hosted,
            pending_calls: report.unhandled,
            next,
        })
    }

    fn transition(&mut self, state: SessionState) {
        self.state = state;
        self.emitter
            .emit(self.round, SessionEventPayload::StateChanged { state });
        if state.is_terminal() {
            self.emitter.close();
        }
    }

    /// Move to `Failed`, returning the error unchanged.
    fn fail(&mut self, err: RondoError) -> RondoError {
        warn!(session_id = %self.id, round = self.round, error = %err, "session failed");
        self.emitter.emit(
            self.round,
            SessionEventPayload::Error {
                message: err.to_string(),
            },
        );
        self.transition(SessionState::Failed);
        err
    }

    fn enter_cancelled(&mut self) -> RondoError {
        debug!(session_id = %self.id, round = self.round, "session cancelled");
        self.transition(SessionState::Cancelled);
        RondoError::Cancelled
    }
}
