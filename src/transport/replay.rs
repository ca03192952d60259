//! Scripted in-memory transport for offline runs and tests.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use super::{CreateRequest, Transport, WireEvent, WireStream};
use crate::error::RondoError;
use crate::types::{MessageContent, OutputItem, Response, ResponseStatus};

/// One scripted round: the terminal snapshot, the wire events a streaming
/// request receives, or a transport failure.
#[derive(Debug, Clone)]
pub struct ScriptedRound {
    response: Response,
    events: Vec<WireEvent>,
    failure: Option<(u16, String)>,
    stall_after: Option<usize>,
}

impl ScriptedRound {
    /// Round whose streaming form is derived from the snapshot.
    pub fn from_response(response: Response) -> Self {
        let events = wire_events_for(&response);
        Self {
            response,
            events,
            failure: None,
            stall_after: None,
        }
    }

    /// Round with explicit streaming events.
    pub fn with_events(response: Response, events: Vec<WireEvent>) -> Self {
        Self {
            response,
            events,
            failure: None,
            stall_after: None,
        }
    }

    /// Round that fails with an HTTP-style status.
    pub fn failure(status: u16, message: impl Into<String>) -> Self {
        Self {
            response: Response::default(),
            events: Vec::new(),
            failure: Some((status, message.into())),
            stall_after: None,
        }
    }

    /// Stop producing after `count` events and never close. A non-streaming
    /// request for this round never answers.
    pub fn stall_after(mut self, count: usize) -> Self {
        self.stall_after = Some(count);
        self
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn events(&self) -> &[WireEvent] {
        &self.events
    }
}

/// Serves [`ScriptedRound`]s in order and records every request.
#[derive(Debug, Default)]
pub struct ReplayTransport {
    rounds: Mutex<VecDeque<ScriptedRound>>,
    requests: Mutex<Vec<CreateRequest>>,
}

impl ReplayTransport {
    pub fn new(rounds: impl IntoIterator<Item = ScriptedRound>) -> Self {
        Self {
            rounds: Mutex::new(rounds.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, round: ScriptedRound) {
        lock(&self.rounds).push_back(round);
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<CreateRequest> {
        lock(&self.requests).clone()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.rounds).len()
    }

    fn next_round(&self, request: &CreateRequest) -> Result<ScriptedRound, RondoError> {
        lock(&self.requests).push(request.clone());
        let round = lock(&self.rounds)
            .pop_front()
            .ok_or_else(|| RondoError::transport_message("replay script exhausted"))?;
        match &round.failure {
            Some((status, message)) => Err(RondoError::transport(*status, message.clone())),
            None => Ok(round),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl Transport for ReplayTransport {
    fn name(&self) -> &str {
        "replay"
    }

    async fn create(&self, request: &CreateRequest) -> Result<Response, RondoError> {
        let round = self.next_round(request)?;
        if round.stall_after.is_some() {
            futures::future::pending::<()>().await;
        }
        Ok(round.response)
    }

    async fn stream(&self, request: &CreateRequest) -> Result<WireStream, RondoError> {
        let round = self.next_round(request)?;
        let events = stream::iter(round.events.into_iter().map(Ok));
        Ok(match round.stall_after {
            Some(count) => events.take(count).chain(stream::pending()).boxed(),
            None => events.boxed(),
        })
    }
}

/// Wire events a streaming endpoint would send for `response`: items are
/// announced with their content parts blank, filled through deltas (split in two fragments), then
/// completed. Image calls with a result get one partial preview.
pub fn wire_events_for(response: &Response) -> Vec<WireEvent> {
    let mut events = vec![WireEvent::Created {
        response: Response {
            id: response.id.clone(),
            status: ResponseStatus::InProgress,
            model: response.model.clone(),
            ..Default::default()
        },
    }];

    for (output_index, item) in response.output.iter().enumerate() {
        let (skeleton, deltas) = skeleton_and_deltas(output_index, item);
        events.push(WireEvent::OutputItemAdded {
            output_index,
            item: skeleton,
        });
        events.extend(deltas);
        events.push(WireEvent::OutputItemDone {
            output_index,
            item: item.clone(),
        });
    }

    let terminal = response.clone();
    events.push(match response.status {
        ResponseStatus::Failed => WireEvent::Failed { response: terminal },
        ResponseStatus::Incomplete => WireEvent::Incomplete { response: terminal },
        _ => WireEvent::Completed { response: terminal },
    });
    events
}

fn skeleton_and_deltas(output_index: usize, item: &OutputItem) -> (OutputItem, Vec<WireEvent>) {
    let mut skeleton = item.clone();
    let mut deltas = Vec::new();
    match &mut skeleton {
        OutputItem::FunctionCall(call) => {
            for delta in halves(&std::mem::take(&mut call.arguments)) {
                deltas.push(WireEvent::FunctionCallArgumentsDelta {
                    output_index,
                    delta,
                });
            }
        }
        OutputItem::McpCall(call) => {
            for delta in halves(&std::mem::take(&mut call.arguments)) {
                deltas.push(WireEvent::McpCallArgumentsDelta {
                    output_index,
                    delta,
                });
            }
        }
        OutputItem::Message(message) => {
            for (content_index, part) in message.content.iter_mut().enumerate() {
                match part {
                    MessageContent::OutputText { text, .. } => {
                        for delta in halves(&std::mem::take(text)) {
                            deltas.push(WireEvent::OutputTextDelta {
                                output_index,
                                content_index,
                                delta,
                            });
                        }
                    }
                    MessageContent::Refusal { refusal } => {
                        for delta in halves(&std::mem::take(refusal)) {
                            deltas.push(WireEvent::RefusalDelta {
                                output_index,
                                content_index,
                                delta,
                            });
                        }
                    }
                    MessageContent::Unsupported(_) => {}
                }
            }
        }
        OutputItem::Reasoning(reasoning) => {
            for (summary_index, part) in reasoning.summary.iter_mut().enumerate() {
                for delta in halves(&std::mem::take(&mut part.text)) {
                    deltas.push(WireEvent::ReasoningSummaryTextDelta {
                        output_index,
                        summary_index,
                        delta,
                    });
                }
            }
            for (content_index, part) in reasoning.content.iter_mut().enumerate() {
                for delta in halves(&std::mem::take(&mut part.text)) {
                    deltas.push(WireEvent::ReasoningTextDelta {
                        output_index,
                        content_index,
                        delta,
                    });
                }
            }
        }
        OutputItem::CodeInterpreterCall(call) => {
            if let Some(code) = call.code.take() {
                for delta in halves(&code) {
                    deltas.push(WireEvent::CodeInterpreterCallCodeDelta {
                        output_index,
                        delta,
                    });
                }
            }
        }
        OutputItem::ImageGenerationCall(call) => {
            if let Some(result) = call.result.take() {
                deltas.push(WireEvent::ImageGenerationCallPartialImage {
                    output_index,
                    item_id: call.id.clone(),
                    partial_image_index: 0,
                    partial_image_b64: result,
                });
            }
        }
        _ => {}
    }
    (skeleton, deltas)
}

/// Split into two non-empty fragments on a char boundary.
fn halves(s: &str) -> Vec<String> {
    if s.is_empty() {
        return Vec::new();
    }
    let mut mid = s.len() / 2;
    while mid > 0 && !s.is_char_boundary(mid) {
        mid -= 1;
    }
    if mid == 0 {
        return vec![s.to_string()];
    }
    vec![s[..mid].to_string(), s[mid..].to_string()]
}
