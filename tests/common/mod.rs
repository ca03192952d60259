//! Shared test helpers: canned output items, responses and tools.

#![allow(dead_code)]

use std::sync::Arc;

use base64::Engine;
use serde_json::json;

use rondo::config::SessionConfig;
use rondo::tools::{FnTool, ToolParameters, ToolRegistry};
use rondo::transport::{ReplayTransport, ScriptedRound};
use rondo::types::*;

pub const MODEL: &str = "gpt-4.1-mini";

pub fn function_call(call_id: &str, name: &str, arguments: &str) -> OutputItem {
    OutputItem::FunctionCall(FunctionCallItem {
        id: Some(format!("fc_{call_id}")),
        call_id: call_id.to_string(),
        name: name.to_string(),
        arguments: arguments.to_string(),
        status: Some(ItemStatus::Completed),
    })
}

pub fn message(text: &str) -> OutputItem {
    OutputItem::Message(MessageItem {
        id: Some("msg_1".to_string()),
        role: "assistant".to_string(),
        content: vec![MessageContent::OutputText {
            text: text.to_string(),
            annotations: Vec::new(),
        }],
        status: Some(ItemStatus::Completed),
    })
}

pub fn reasoning(summary: &str) -> OutputItem {
    OutputItem::Reasoning(ReasoningItem {
        id: Some("rs_1".to_string()),
        summary: vec![ReasoningText {
            kind: "summary_text".to_string(),
            text: summary.to_string(),
        }],
        content: Vec::new(),
        encrypted_content: None,
        status: None,
    })
}

/// Hosted image call whose result is `size` bytes of PNG-ish data.
pub fn image_call(id: &str, size: usize) -> OutputItem {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend((0..size.saturating_sub(8)).map(|i| (i % 251) as u8));
    OutputItem::ImageGenerationCall(ImageGenerationCallItem {
        id: id.to_string(),
        status: Some(ItemStatus::Completed),
        result: Some(base64::engine::general_purpose::STANDARD.encode(&bytes)),
        revised_prompt: Some("a lighthouse at dusk".to_string()),
        output_format: Some("png".to_string()),
        size: Some("1024x1024".to_string()),
        partial_image_index: None,
    })
}

pub fn response(id: &str, output: Vec<OutputItem>) -> Response {
    let output_text = output
        .iter()
        .filter_map(OutputItem::text)
        .collect::<String>();
    Response {
        id: id.to_string(),
        status: ResponseStatus::Completed,
        model: Some(MODEL.to_string()),
        output_text: (!output_text.is_empty()).then_some(output_text),
        output,
        usage: Some(Usage {
            input_tokens: 10,
            output_tokens: 5,
            total_tokens: 15,
            ..Default::default()
        }),
        error: None,
    }
}

pub fn failed_response(id: &str, code: &str, message: &str) -> Response {
    Response {
        id: id.to_string(),
        status: ResponseStatus::Failed,
        error: Some(ResponseError::new(code, message)),
        ..Default::default()
    }
}

pub fn replay(responses: Vec<Response>) -> Arc<ReplayTransport> {
    Arc::new(ReplayTransport::new(
        responses.into_iter().map(ScriptedRound::from_response),
    ))
}

pub fn add_two_ints() -> FnTool {
    FnTool::function(
        "add_two_ints",
        "Add two integers",
        ToolParameters::object()
            .integer("a", "First operand", true)
            .integer("b", "Second operand", true)
            .build(),
        |args| async move {
            let sum = args.get_i64("a")? + args.get_i64("b")?;
            Ok(json!({ "result": sum }))
        },
    )
}

pub fn registry() -> ToolRegistry {
    ToolRegistry::new()
        .with(add_two_ints())
        .expect("register add_two_ints")
}

pub fn config(store: bool, stream: bool) -> SessionConfig {
    SessionConfig::builder()
        .model(MODEL)
        .store(store)
        .stream(stream)
        .build()
}
