//! Turn snapshots and wire streams into one canonical event sequence.

use futures::stream::{self, BoxStream, StreamExt};
use tracing::debug;

use crate::error::RondoError;
use crate::transport::{WireEvent, WireStream};
use crate::types::{DeltaKind, Response, ResponseError, ResponseEvent};

/// Canonical events of one round.
pub type EventStream = BoxStream<'static, Result<ResponseEvent, RondoError>>;

/// Events equivalent to a terminal snapshot: every item added, every item
/// done, then the terminal event.
pub fn synthesize(response: Response) -> Vec<ResponseEvent> {
    let mut events = Vec::with_capacity(response.output.len() * 2 + 1);
    for (output_index, item) in response.output.iter().enumerate() {
        events.push(ResponseEvent::OutputItemAdded {
            output_index,
            item: item.clone(),
        });
    }
    for (output_index, item) in response.output.iter().enumerate() {
        events.push(ResponseEvent::OutputItemDone {
            output_index,
            item: item.clone(),
        });
    }
    events.push(terminal_for(response));
    events
}

fn terminal_for(response: Response) -> ResponseEvent {
    match response.failure() {
        Some(error) => ResponseEvent::ResponseError {
            response_id: Some(response.id),
            error,
        },
        None => ResponseEvent::ResponseCompleted { response },
    }
}

pub fn snapshot_stream(response: Response) -> EventStream {
    stream::iter(synthesize(response).into_iter().map(Ok)).boxed()
}

/// Re-tag one native event. Kinds the session does not act on map to `None`.
///
/// `response_id` is the id announced by `response.created`, used for bare
/// `error` events.
pub fn normalize_wire_event(event: WireEvent, response_id: Option<&str>) -> Option<ResponseEvent> {
    let delta = |output_index, part_index, kind, fragment| ResponseEvent::OutputItemDelta {
        output_index,
        part_index,
        kind,
        fragment,
    };
    match event {
        WireEvent::OutputItemAdded { output_index, item } => {
            Some(ResponseEvent::OutputItemAdded { output_index, item })
        }
        WireEvent::OutputItemDone { output_index, item } => {
            Some(ResponseEvent::OutputItemDone { output_index, item })
        }
        WireEvent::OutputTextDelta {
            output_index,
            content_index,
            delta: fragment,
        } => Some(delta(output_index, content_index, DeltaKind::Text, fragment)),
        WireEvent::RefusalDelta {
            output_index,
            content_index,
            delta: fragment,
        } => Some(delta(output_index, content_index, DeltaKind::Refusal, fragment)),
        WireEvent::FunctionCallArgumentsDelta {
            output_index,
            delta: fragment,
        }
        | WireEvent::McpCallArgumentsDelta {
            output_index,
            delta: fragment,
        } => Some(delta(output_index, 0, DeltaKind::Arguments, fragment)),
        WireEvent::ReasoningSummaryTextDelta {
            output_index,
            summary_index,
            delta: fragment,
        } => Some(delta(
            output_index,
            summary_index,
            DeltaKind::ReasoningSummary,
            fragment,
        )),
        WireEvent::ReasoningTextDelta {
            output_index,
            content_index,
            delta: fragment,
        } => Some(delta(
            output_index,
            content_index,
            DeltaKind::ReasoningText,
            fragment,
        )),
        WireEvent::CodeInterpreterCallCodeDelta {
            output_index,
            delta: fragment,
        } => Some(delta(output_index, 0, DeltaKind::Code, fragment)),
        WireEvent::ImageGenerationCallPartialImage {
            output_index,
            item_id,
            partial_image_index,
            partial_image_b64,
        } => Some(ResponseEvent::ImagePartial {
            output_index,
            item_id,
            partial_image_index,
            partial_image_b64,
        }),
        WireEvent::Completed { response } | WireEvent::Incomplete { response } => {
            Some(ResponseEvent::ResponseCompleted { response })
        }
        WireEvent::Failed { response } => Some(terminal_for(response)),
        WireEvent::Error { code, message } => Some(ResponseEvent::ResponseError {
            response_id: response_id.map(str::to_string),
            error: ResponseError::new(code.unwrap_or_else(|| "error".into()), message),
        }),
        WireEvent::Created { .. } | WireEvent::InProgress { .. } | WireEvent::Other => None,
    }
}

/// Canonical events of a streaming round.
///
/// Ends right after the terminal event; anything the transport sends later
/// is never read. A transport that closes first yields `IncompleteStream`.
pub fn normalize_stream(wire: WireStream) -> EventStream {
    Box::pin(async_stream::stream! {
        let mut wire = wire;
        let mut response_id: Option<String> = None;
        while let Some(next) = wire.next().await {
            let event = match next {
                Ok(event) => event,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            if let WireEvent::Created { response } | WireEvent::InProgress { response } = &event {
                if !response.id.is_empty() {
                    response_id = Some(response.id.clone());
                }
            }
            let Some(event) = normalize_wire_event(event, response_id.as_deref()) else {
                continue;
            };
            let terminal = event.is_terminal();
            yield Ok(event);
            if terminal {
                return;
            }
        }
        debug!(response_id = response_id.as_deref(), "wire stream closed before a terminal event");
        yield Err(RondoError::IncompleteStream);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OutputItem, ResponseStatus, WebSearchCallItem};

    fn search_item() -> OutputItem {
        OutputItem::WebSearchCall(WebSearchCallItem {
            id: "ws_1".into(),
            status: None,
            action: None,
        })
    }

    #[test]
    fn snapshot_synthesizes_added_then_done_then_completed() {
        let response = Response {
            id: "resp_1".into(),
            status: ResponseStatus::Completed,
            output: vec![search_item(), search_item()],
            ..Default::default()
        };
        let names: Vec<&str> = synthesize(response).iter().map(ResponseEvent::name).collect();
        assert_eq!(
            names,
            [
                "output_item_added",
                "output_item_added",
                "output_item_done",
                "output_item_done",
                "response_completed"
            ]
        );
    }

    #[test]
    fn failed_snapshot_ends_in_error() {
        let response = Response {
            id: "resp_1".into(),
            status: ResponseStatus::Failed,
            error: Some(ResponseError::new("server_error", "boom")),
            ..Default::default()
        };
        let events = synthesize(response);
        assert_eq!(
            events.last(),
            Some(&ResponseEvent::ResponseError {
                response_id: Some("resp_1".into()),
                error: ResponseError::new("server_error", "boom"),
            })
        );
    }

    #[tokio::test]
    async fn events_after_terminal_are_discarded() {
        let completed = Response {
            id: "resp_1".into(),
            status: ResponseStatus::Completed,
            ..Default::default()
        };
        let wire: WireStream = stream::iter(vec![
            Ok(WireEvent::Other),
            Ok(WireEvent::Completed {
                response: completed.clone(),
            }),
            Ok(WireEvent::Completed {
                response: completed,
            }),
        ])
        .boxed();
        let events: Vec<_> = normalize_stream(wire).collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            Ok(ResponseEvent::ResponseCompleted { .. })
        ));
    }

    #[tokio::test]
    async fn closing_without_terminal_is_incomplete() {
        let wire: WireStream = stream::iter(vec![Ok(WireEvent::OutputItemAdded {
            output_index: 0,
            item: search_item(),
        })])
        .boxed();
        let events: Vec<_> = normalize_stream(wire).collect().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], Err(RondoError::IncompleteStream)));
    }

    #[tokio::test]
    async fn bare_error_event_carries_created_id() {
        let wire: WireStream = stream::iter(vec![
            Ok(WireEvent::Created {
                response: Response {
                    id: "resp_9".into(),
                    ..Default::default()
                },
            }),
            Ok(WireEvent::Error {
                code: Some("rate_limit_exceeded".into()),
                message: "slow down".into(),
            }),
        ])
        .boxed();
        let events: Vec<_> = normalize_stream(wire).collect().await;
        match &events[0] {
            Ok(ResponseEvent::ResponseError { response_id, error }) => {
                assert_eq!(response_id.as_deref(), Some("resp_9"));
                assert_eq!(error.code, "rate_limit_exceeded");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
