//! Request input: user messages, echoed output items and tool outputs.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::item::{OutputItem, SafetyCheck};

/// Input for the first round of a session.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Text(String),
    Items(Vec<InputItem>),
}

impl Input {
    pub fn into_items(self) -> Vec<InputItem> {
        match self {
            Self::Text(text) => vec![InputItem::Message(InputMessage::user(text))],
            Self::Items(items) => items,
        }
    }
}

impl From<&str> for Input {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Input {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<InputItem>> for Input {
    fn from(items: Vec<InputItem>) -> Self {
        Self::Items(items)
    }
}

/// One entry of a request's `input` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputItem {
    ToolOutput(ToolOutput),
    Message(InputMessage),
    Item(OutputItem),
}

impl InputItem {
    /// Body form sent to the remote API.
    pub fn to_wire(&self) -> Value {
        match self {
            Self::ToolOutput(output) => output.to_wire(),
            Self::Message(message) => json!({
                "type": "message",
                "role": message.role,
                "content": message.content,
            }),
            Self::Item(item) => serde_json::to_value(item).unwrap_or(Value::Null),
        }
    }

    pub fn as_tool_output(&self) -> Option<&ToolOutput> {
        match self {
            Self::ToolOutput(output) => Some(output),
            _ => None,
        }
    }
}

impl From<OutputItem> for InputItem {
    fn from(item: OutputItem) -> Self {
        Self::Item(item)
    }
}

impl From<ToolOutput> for InputItem {
    fn from(output: ToolOutput) -> Self {
        Self::ToolOutput(output)
    }
}

impl From<InputMessage> for InputItem {
    fn from(message: InputMessage) -> Self {
        Self::Message(message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Developer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "message")]
pub struct InputMessage {
    pub role: Role,
    pub content: String,
}

impl InputMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn developer(content: impl Into<String>) -> Self {
        Self {
            role: Role::Developer,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Which wire item a tool output answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolOutputKind {
    FunctionCallOutput,
    LocalShellCallOutput,
    ComputerCallOutput,
    McpApprovalResponse,
    /// Local post-processing of a hosted call. Never sent.
    HostedResult,
}

impl ToolOutputKind {
    pub fn for_item(item: &OutputItem) -> Option<Self> {
        match item {
            OutputItem::FunctionCall(_) => Some(Self::FunctionCallOutput),
            OutputItem::LocalShellCall(_) => Some(Self::LocalShellCallOutput),
            OutputItem::ComputerCall(_) => Some(Self::ComputerCallOutput),
            OutputItem::McpApprovalRequest(_) => Some(Self::McpApprovalResponse),
            OutputItem::ImageGenerationCall(_)
            | OutputItem::WebSearchCall(_)
            | OutputItem::CodeInterpreterCall(_)
            | OutputItem::McpCall(_)
            | OutputItem::McpListTools(_) => Some(Self::HostedResult),
            OutputItem::Message(_) | OutputItem::Reasoning(_) | OutputItem::Unsupported(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolOutputStatus {
    Completed,
    Failed,
}

/// Result payload of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolOutputPayload {
    Text(String),
    Screenshot(ComputerScreenshot),
    Approval(McpApprovalDecision),
}

impl ToolOutputPayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Stringify a JSON result. Strings pass through unquoted.
    pub fn json(value: &Value) -> Self {
        Self::Text(match value {
            Value::Null => "null".to_string(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            other => serde_json::to_string(other).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "computer_screenshot")]
pub struct ComputerScreenshot {
    /// `data:` URL or remote URL of the screenshot.
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acknowledged_safety_checks: Vec<SafetyCheck>,
}

impl ComputerScreenshot {
    pub fn png_base64(encoded: &str) -> Self {
        Self {
            image_url: format!("data:image/png;base64,{encoded}"),
            acknowledged_safety_checks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpApprovalDecision {
    pub approve: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// The answer to one call item.
///
/// Only produced through [`crate::tools::ToolInvocation`] or
/// [`crate::dispatch::PendingCall`], so the correlation id always comes from
/// the call it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    #[serde(rename = "type")]
    kind: ToolOutputKind,
    call_id: String,
    output: ToolOutputPayload,
    status: ToolOutputStatus,
}

impl ToolOutput {
    pub(crate) fn new(
        kind: ToolOutputKind,
        call_id: impl Into<String>,
        output: ToolOutputPayload,
        status: ToolOutputStatus,
    ) -> Self {
        Self {
            kind,
            call_id: call_id.into(),
            output,
            status,
        }
    }

    /// Answer `item`. Returns `None` for items that are not calls.
    pub(crate) fn for_item(
        item: &OutputItem,
        output: ToolOutputPayload,
        status: ToolOutputStatus,
    ) -> Option<Self> {
        Some(Self {
            kind: ToolOutputKind::for_item(item)?,
            call_id: item.call_id()?.to_string(),
            output,
            status,
        })
    }

    pub fn kind(&self) -> ToolOutputKind {
        self.kind
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn payload(&self) -> &ToolOutputPayload {
        &self.output
    }

    pub fn status(&self) -> ToolOutputStatus {
        self.status
    }

    pub fn is_failed(&self) -> bool {
        self.status == ToolOutputStatus::Failed
    }

    /// Body form sent to the remote API.
    pub fn to_wire(&self) -> Value {
        match self.kind {
            ToolOutputKind::FunctionCallOutput => json!({
                "type": "function_call_output",
                "call_id": self.call_id,
                "output": self.output.to_text(),
            }),
            ToolOutputKind::LocalShellCallOutput => json!({
                "type": "local_shell_call_output",
                "id": self.call_id,
                "output": self.output.to_text(),
            }),
            ToolOutputKind::ComputerCallOutput => match &self.output {
                ToolOutputPayload::Screenshot(shot) => {
                    let mut body = json!({
                        "type": "computer_call_output",
                        "call_id": self.call_id,
                        "output": {
                            "type": "computer_screenshot",
                            "image_url": shot.image_url,
                        },
                    });
                    if !shot.acknowledged_safety_checks.is_empty() {
                        body["acknowledged_safety_checks"] =
                            json!(shot.acknowledged_safety_checks);
                    }
                    body
                }
                other => json!({
                    "type": "computer_call_output",
                    "call_id": self.call_id,
                    "output": {"type": "input_text", "text": other.to_text()},
                }),
            },
            ToolOutputKind::McpApprovalResponse => {
                let (approve, reason) = match &self.output {
                    ToolOutputPayload::Approval(d) => (d.approve, d.reason.clone()),
                    other => (false, Some(other.to_text())),
                };
                let mut body = json!({
                    "type": "mcp_approval_response",
                    "approval_request_id": self.call_id,
                    "approve": approve,
                });
                if let Some(reason) = reason {
                    body["reason"] = json!(reason);
                }
                body
            }
            ToolOutputKind::HostedResult => serde_json::to_value(self).unwrap_or(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::item::{FunctionCallItem, McpApprovalRequestItem};
    use pretty_assertions::assert_eq;

    fn function_call() -> OutputItem {
        OutputItem::FunctionCall(FunctionCallItem {
            id: Some("fc_1".into()),
            call_id: "c1".into(),
            name: "add_two_ints".into(),
            arguments: "{\"a\":2,\"b\":3}".into(),
            status: None,
        })
    }

    #[test]
    fn function_output_serializes_with_call_id_output_and_status() {
        let output = ToolOutput::for_item(
            &function_call(),
            ToolOutputPayload::json(&json!({"result": 5})),
            ToolOutputStatus::Completed,
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&output).unwrap(),
            json!({
                "type": "function_call_output",
                "call_id": "c1",
                "output": "{\"result\":5}",
                "status": "completed"
            })
        );
        assert_eq!(
            output.to_wire(),
            json!({
                "type": "function_call_output",
                "call_id": "c1",
                "output": "{\"result\":5}"
            })
        );
    }

    #[test]
    fn approval_response_uses_request_id() {
        let request = OutputItem::McpApprovalRequest(McpApprovalRequestItem {
            id: "mcpr_1".into(),
            server_label: "docs".into(),
            name: "search".into(),
            arguments: "{}".into(),
        });
        let output = ToolOutput::for_item(
            &request,
            ToolOutputPayload::Approval(McpApprovalDecision {
                approve: true,
                reason: None,
            }),
            ToolOutputStatus::Completed,
        )
        .unwrap();
        assert_eq!(
            output.to_wire(),
            json!({
                "type": "mcp_approval_response",
                "approval_request_id": "mcpr_1",
                "approve": true
            })
        );
    }

    #[test]
    fn text_input_becomes_user_message() {
        let items = Input::from("hello").into_items();
        assert_eq!(
            items[0].to_wire(),
            json!({"type": "message", "role": "user", "content": "hello"})
        );
    }

    #[test]
    fn non_call_items_cannot_be_answered() {
        let message = OutputItem::Unsupported(json!({"type": "file_search_call", "id": "fs_1"}));
        assert!(ToolOutput::for_item(
            &message,
            ToolOutputPayload::text("x"),
            ToolOutputStatus::Completed
        )
        .is_none());
    }
}
