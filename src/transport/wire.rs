//! Native streaming events as sent by the remote API.

use serde::{Deserialize, Serialize};

use crate::types::{OutputItem, Response};

/// One server-sent event of a streaming round, tagged by its `type` field.
///
/// Only the kinds the session acts on are typed; everything else
/// deserializes as [`WireEvent::Other`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WireEvent {
    #[serde(rename = "response.created")]
    Created { response: Response },
    #[serde(rename = "response.in_progress")]
    InProgress { response: Response },
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded { output_index: usize, item: OutputItem },
    #[serde(rename = "response.output_item.done")]
    OutputItemDone { output_index: usize, item: OutputItem },
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta {
        output_index: usize,
        #[serde(default)]
        content_index: usize,
        delta: String,
    },
    #[serde(rename = "response.refusal.delta")]
    RefusalDelta {
        output_index: usize,
        #[serde(default)]
        content_index: usize,
        delta: String,
    },
    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta { output_index: usize, delta: String },
    #[serde(rename = "response.mcp_call_arguments.delta")]
    McpCallArgumentsDelta { output_index: usize, delta: String },
    #[serde(rename = "response.reasoning_summary_text.delta")]
    ReasoningSummaryTextDelta {
        output_index: usize,
        #[serde(default)]
        summary_index: usize,
        delta: String,
    },
    #[serde(rename = "response.reasoning_text.delta")]
    ReasoningTextDelta {
        output_index: usize,
        #[serde(default)]
        content_index: usize,
        delta: String,
    },
    #[serde(rename = "response.code_interpreter_call_code.delta")]
    CodeInterpreterCallCodeDelta { output_index: usize, delta: String },
    #[serde(rename = "response.image_generation_call.partial_image")]
    ImageGenerationCallPartialImage {
        output_index: usize,
        item_id: String,
        partial_image_index: u32,
        partial_image_b64: String,
    },
    #[serde(rename = "response.completed")]
    Completed { response: Response },
    #[serde(rename = "response.incomplete")]
    Incomplete { response: Response },
    #[serde(rename = "response.failed")]
    Failed { response: Response },
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        code: Option<String>,
        message: String,
    },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_event_types_are_other() {
        let event: WireEvent = serde_json::from_value(json!({
            "type": "response.output_text.annotation.added",
            "sequence_number": 7
        }))
        .unwrap();
        assert_eq!(event, WireEvent::Other);
    }

    #[test]
    fn extra_fields_are_ignored() {
        let event: WireEvent = serde_json::from_value(json!({
            "type": "response.function_call_arguments.delta",
            "sequence_number": 3,
            "item_id": "fc_1",
            "output_index": 1,
            "delta": "{\"a\":"
        }))
        .unwrap();
        assert_eq!(
            event,
            WireEvent::FunctionCallArgumentsDelta {
                output_index: 1,
                delta: "{\"a\":".into()
            }
        );
    }
}
