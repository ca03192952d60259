//! HTTP transport against a mock Responses endpoint.

mod common;

use std::sync::Arc;

use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;
use rondo::error::{ErrorCategory, RondoError};
use rondo::session::Session;
use rondo::stream::{collect_response, normalize_stream};
use rondo::transport::replay::wire_events_for;
use rondo::transport::{CreateRequest, HttpTransport, Transport, WireEvent};
use rondo::types::{Input, Response, ResponseStatus};

fn sse_body(events: &[WireEvent]) -> String {
    let mut body = String::from(": keep-alive\n\n");
    for event in events {
        body.push_str(&format!(
            "event: {}\ndata: {}\n\n",
            serde_json::to_value(event).unwrap()["type"].as_str().unwrap(),
            serde_json::to_string(event).unwrap()
        ));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

fn request(stream: bool) -> CreateRequest {
    let mut request = CreateRequest::new(MODEL, Input::from("hi").into_items());
    request.stream = stream;
    request
}

#[tokio::test]
async fn create_posts_body_with_bearer_auth() {
    let server = MockServer::start().await;
    let snapshot = response("resp_1", vec![message("hello there")]);

    Mock::given(method("POST"))
        .and(path("/responses"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": MODEL,
            "stream": false,
            "store": true,
            "input": [{"type": "message", "role": "user", "content": "hi"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_1",
            "object": "response",
            "status": "completed",
            "model": MODEL,
            "output": serde_json::to_value(&snapshot.output).unwrap(),
            "usage": {"input_tokens": 10, "output_tokens": 5, "total_tokens": 15},
            "error": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new("test-key", server.uri()).unwrap();
    let created = transport.create(&request(false)).await.unwrap();
    assert_eq!(created.id, "resp_1");
    assert_eq!(created.status, ResponseStatus::Completed);
    assert_eq!(created.aggregate_text(), "hello there");
    assert_eq!(created.usage.unwrap().total_tokens, 15);
}

#[tokio::test]
async fn stream_decodes_server_sent_events() {
    let server = MockServer::start().await;
    let body = concat!(
        ": connected\n\n",
        "event: response.created\n",
        "data: {\"type\":\"response.created\",\"response\":{\"id\":\"resp_s\",\"status\":\"in_progress\",\"output\":[]}}\n\n",
        "event: response.output_item.added\n",
        "data: {\"type\":\"response.output_item.added\",\"output_index\":0,\"item\":{\"type\":\"message\",\"id\":\"msg_1\",\"role\":\"assistant\",\"content\":[]}}\n\n",
        "data: {\"type\":\"response.output_text.delta\",\"output_index\":0,\"content_index\":0,\"delta\":\"Hel\"}\n\n",
        "data: {\"type\":\"response.output_text.delta\",\"output_index\":0,\"content_index\":0,\"delta\":\"lo\"}\n\n",
        "data: {\"type\":\"response.content_part.done\",\"output_index\":0}\n\n",
        "data: {\"type\":\"response.output_item.done\",\"output_index\":0,\"item\":{\"type\":\"message\",\"id\":\"msg_1\",\"role\":\"assistant\",\"content\":[{\"type\":\"output_text\",\"text\":\"Hello\",\"annotations\":[]}]}}\n\n",
        "data: {\"type\":\"response.completed\",\"response\":{\"id\":\"resp_s\",\"status\":\"completed\",\"output\":[{\"type\":\"message\",\"id\":\"msg_1\",\"role\":\"assistant\",\"content\":[{\"type\":\"output_text\",\"text\":\"Hello\",\"annotations\":[]}]}]}}\n\n",
        "data: [DONE]\n\n",
    );

    Mock::given(method("POST"))
        .and(path("/responses"))
        .and(header("accept", "text/event-stream"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new("test-key", server.uri()).unwrap();
    let wire: Vec<WireEvent> = transport
        .stream(&request(true))
        .await
        .unwrap()
        .map(|event| event.unwrap())
        .collect()
        .await;
    assert!(matches!(wire[0], WireEvent::Created { .. }));
    assert!(wire.iter().any(|event| matches!(event, WireEvent::Other)));
    assert!(matches!(wire.last(), Some(WireEvent::Completed { .. })));
}

#[tokio::test]
async fn streamed_round_matches_snapshot() {
    let server = MockServer::start().await;
    let snapshot = response(
        "resp_1",
        vec![
            reasoning("adding"),
            function_call("c1", "add_two_ints", r#"{"a":2,"b":3}"#),
        ],
    );
    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&wire_events_for(&snapshot)), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let transport = HttpTransport::new("test-key", server.uri()).unwrap();
    let wire = transport.stream(&request(true)).await.unwrap();
    let finalized: Response = collect_response(normalize_stream(wire)).await.unwrap();
    assert_eq!(finalized, snapshot);
}

#[tokio::test]
async fn streamed_failure_with_null_code_stays_a_failure() {
    let server = MockServer::start().await;
    let body = concat!(
        "event: response.created\n",
        "data: {\"type\":\"response.created\",\"response\":{\"id\":\"resp_f\",\"status\":\"in_progress\",\"output\":[]}}\n\n",
        "event: response.failed\n",
        "data: {\"type\":\"response.failed\",\"response\":{\"id\":\"resp_f\",\"status\":\"failed\",\"output\":[],\"error\":{\"code\":null,\"message\":\"model crashed\"}}}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let transport = HttpTransport::new("test-key", server.uri()).unwrap();
    let wire = transport.stream(&request(true)).await.unwrap();
    let finalized = collect_response(normalize_stream(wire)).await.unwrap();
    assert_eq!(finalized.id, "resp_f");
    assert!(finalized.is_failed());
    assert_eq!(finalized.failure().unwrap().message, "model crashed");
}

#[tokio::test]
async fn malformed_known_event_is_a_serialization_error() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"type\":\"response.created\",\"response\":{\"id\":\"resp_m\",\"status\":\"in_progress\",\"output\":[]}}\n\n",
        "data: {\"type\":\"response.completed\",\"response\":{\"id\":\"resp_m\",\"status\":\"finished\",\"output\":[]}}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let transport = HttpTransport::new("test-key", server.uri()).unwrap();
    let wire = transport.stream(&request(true)).await.unwrap();
    let err = collect_response(normalize_stream(wire)).await.unwrap_err();
    assert!(matches!(err, RondoError::Serialization(_)), "got {err:?}");
}

#[tokio::test]
async fn error_status_maps_to_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        })))
        .mount(&server)
        .await;

    let transport = HttpTransport::new("bad-key", server.uri()).unwrap();
    let err = transport.create(&request(false)).await.unwrap_err();
    match &err {
        RondoError::Transport { status, message, .. } => {
            assert_eq!(*status, Some(401));
            assert_eq!(message, "Incorrect API key provided");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.category(), ErrorCategory::Authentication);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn session_runs_two_rounds_over_http() {
    let server = MockServer::start().await;
    let round_one = response(
        "resp_1",
        vec![function_call("c1", "add_two_ints", r#"{"a":2,"b":3}"#)],
    );
    let round_two = response("resp_2", vec![message("The sum is 5.")]);

    Mock::given(method("POST"))
        .and(path("/responses"))
        .and(body_string_contains("function_call_output"))
        .and(body_partial_json(json!({
            "previous_response_id": "resp_1",
            "tool_choice": "auto",
            "input": [{
                "type": "function_call_output",
                "call_id": "c1",
                "output": "{\"result\":5}"
            }]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&wire_events_for(&round_two)), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/responses"))
        .and(body_partial_json(json!({
            "tool_choice": {"type": "function", "name": "add_two_ints"},
            "tools": [{"type": "function", "name": "add_two_ints"}]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&wire_events_for(&round_one)), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transport = Arc::new(HttpTransport::new("test-key", server.uri()).unwrap());
    let config = rondo::config::SessionConfig::builder()
        .model(MODEL)
        .stream(true)
        .tool_choice(rondo::tools::ToolChoice::function("add_two_ints"))
        .build();
    let mut session = Session::new(transport, registry(), config, "What is 2 + 3?").unwrap();
    let outcome = session.run().await.unwrap();
    assert_eq!(outcome.response.aggregate_text(), "The sum is 5.");
    assert_eq!(outcome.round, 2);
}
