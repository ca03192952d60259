//! Output items: the polymorphic entries of a response's `output` array.

use std::collections::BTreeMap;

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::event::DeltaKind;
use crate::error::RondoError;
use crate::tools::ToolKind;

/// Lifecycle status reported on an individual output item.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ItemStatus {
    InProgress,
    Completed,
    Incomplete,
    Searching,
    Generating,
    Interpreting,
    Calling,
    Failed,
}

/// Whether the remote API waits for a client answer to a call, or already
/// ran the tool itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallResolution {
    Client,
    Hosted,
}

/// One entry of a response's output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message(MessageItem),
    FunctionCall(FunctionCallItem),
    Reasoning(ReasoningItem),
    ImageGenerationCall(ImageGenerationCallItem),
    WebSearchCall(WebSearchCallItem),
    CodeInterpreterCall(CodeInterpreterCallItem),
    McpListTools(McpListToolsItem),
    McpCall(McpCallItem),
    McpApprovalRequest(McpApprovalRequestItem),
    ComputerCall(ComputerCallItem),
    LocalShellCall(LocalShellCallItem),
    #[serde(untagged)]
    Unsupported(Value),
}

const MODELED_ITEM_TYPES: [&str; 11] = [
    "message",
    "function_call",
    "reasoning",
    "image_generation_call",
    "web_search_call",
    "code_interpreter_call",
    "mcp_list_tools",
    "mcp_call",
    "mcp_approval_request",
    "computer_call",
    "local_shell_call",
];

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ModeledItem {
    Message(MessageItem),
    FunctionCall(FunctionCallItem),
    Reasoning(ReasoningItem),
    ImageGenerationCall(ImageGenerationCallItem),
    WebSearchCall(WebSearchCallItem),
    CodeInterpreterCall(CodeInterpreterCallItem),
    McpListTools(McpListToolsItem),
    McpCall(McpCallItem),
    McpApprovalRequest(McpApprovalRequestItem),
    ComputerCall(ComputerCallItem),
    LocalShellCall(LocalShellCallItem),
}

impl From<ModeledItem> for OutputItem {
    fn from(item: ModeledItem) -> Self {
        match item {
            ModeledItem::Message(i) => Self::Message(i),
            ModeledItem::FunctionCall(i) => Self::FunctionCall(i),
            ModeledItem::Reasoning(i) => Self::Reasoning(i),
            ModeledItem::ImageGenerationCall(i) => Self::ImageGenerationCall(i),
            ModeledItem::WebSearchCall(i) => Self::WebSearchCall(i),
            ModeledItem::CodeInterpreterCall(i) => Self::CodeInterpreterCall(i),
            ModeledItem::McpListTools(i) => Self::McpListTools(i),
            ModeledItem::McpCall(i) => Self::McpCall(i),
            ModeledItem::McpApprovalRequest(i) => Self::McpApprovalRequest(i),
            ModeledItem::ComputerCall(i) => Self::ComputerCall(i),
            ModeledItem::LocalShellCall(i) => Self::LocalShellCall(i),
        }
    }
}

// A modeled `type` with a malformed body is an error, not an unsupported item.
impl<'de> Deserialize<'de> for OutputItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let modeled = value
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|kind| MODELED_ITEM_TYPES.contains(&kind));
        if !modeled {
            return Ok(Self::Unsupported(value));
        }
        serde_json::from_value::<ModeledItem>(value)
            .map(Self::from)
            .map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: String,
    #[serde(default)]
    pub content: Vec<MessageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
}

/// A content part of an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    OutputText {
        text: String,
        #[serde(default)]
        annotations: Vec<serde_json::Value>,
    },
    Refusal {
        refusal: String,
    },
    #[serde(untagged)]
    Unsupported(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub call_id: String,
    pub name: String,
    /// Raw JSON argument string, accumulated from deltas while streaming.
    #[serde(default)]
    pub arguments: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub summary: Vec<ReasoningText>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<ReasoningText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
}

/// A `summary_text` or `reasoning_text` part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningText {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageGenerationCallItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
    /// Final image, base64 encoded. Only ever set by the Done item or the
    /// completed snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revised_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Index of the latest partial preview seen while streaming.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_image_index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSearchCallItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeInterpreterCallItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpListToolsItem {
    pub id: String,
    pub server_label: String,
    #[serde(default)]
    pub tools: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpCallItem {
    pub id: String,
    pub server_label: String,
    pub name: String,
    #[serde(default)]
    pub arguments: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpApprovalRequestItem {
    pub id: String,
    pub server_label: String,
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputerCallItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub call_id: String,
    pub action: ComputerAction,
    #[serde(default)]
    pub pending_safety_checks: Vec<SafetyCheck>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
}

/// A single computer-use action requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComputerAction {
    Click {
        x: i64,
        y: i64,
        #[serde(default = "default_button")]
        button: String,
    },
    DoubleClick {
        x: i64,
        y: i64,
    },
    Drag {
        path: Vec<Point>,
    },
    Keypress {
        keys: Vec<String>,
    },
    Move {
        x: i64,
        y: i64,
    },
    Screenshot,
    Scroll {
        x: i64,
        y: i64,
        scroll_x: i64,
        scroll_y: i64,
    },
    Type {
        text: String,
    },
    Wait,
}

fn default_button() -> String {
    "left".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

/// A safety check the client must acknowledge before a computer action runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyCheck {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalShellCallItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub call_id: String,
    pub action: LocalShellAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
}

/// The `exec` action of a local shell call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalShellAction {
    #[serde(rename = "type", default = "default_exec")]
    pub kind: String,
    pub command: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
}

fn default_exec() -> String {
    "exec".to_string()
}

impl OutputItem {
    /// The wire `type` tag of this item.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::FunctionCall(_) => "function_call",
            Self::Reasoning(_) => "reasoning",
            Self::ImageGenerationCall(_) => "image_generation_call",
            Self::WebSearchCall(_) => "web_search_call",
            Self::CodeInterpreterCall(_) => "code_interpreter_call",
            Self::McpListTools(_) => "mcp_list_tools",
            Self::McpCall(_) => "mcp_call",
            Self::McpApprovalRequest(_) => "mcp_approval_request",
            Self::ComputerCall(_) => "computer_call",
            Self::LocalShellCall(_) => "local_shell_call",
            Self::Unsupported(_) => "unsupported",
        }
    }

    /// Correlation id of a call item. Client-resolved calls use `call_id`,
    /// hosted calls and approval requests use the item id.
    pub fn call_id(&self) -> Option<&str> {
        match self {
            Self::FunctionCall(c) => Some(&c.call_id),
            Self::LocalShellCall(c) => Some(&c.call_id),
            Self::ComputerCall(c) => Some(&c.call_id),
            Self::McpApprovalRequest(c) => Some(&c.id),
            Self::ImageGenerationCall(c) => Some(&c.id),
            Self::WebSearchCall(c) => Some(&c.id),
            Self::CodeInterpreterCall(c) => Some(&c.id),
            Self::McpCall(c) => Some(&c.id),
            Self::McpListTools(c) => Some(&c.id),
            Self::Message(_) | Self::Reasoning(_) | Self::Unsupported(_) => None,
        }
    }

    /// Capability a handler must declare to answer this item.
    pub fn tool_kind(&self) -> Option<ToolKind> {
        match self {
            Self::FunctionCall(_) => Some(ToolKind::Function),
            Self::LocalShellCall(_) => Some(ToolKind::LocalShell),
            Self::ComputerCall(_) => Some(ToolKind::ComputerUse),
            Self::ImageGenerationCall(_) => Some(ToolKind::ImageGeneration),
            Self::WebSearchCall(_) => Some(ToolKind::WebSearch),
            Self::CodeInterpreterCall(_) => Some(ToolKind::CodeInterpreter),
            Self::McpCall(_) | Self::McpListTools(_) | Self::McpApprovalRequest(_) => {
                Some(ToolKind::Mcp)
            }
            Self::Message(_) | Self::Reasoning(_) | Self::Unsupported(_) => None,
        }
    }

    /// Registry name used to look up a handler for this item.
    ///
    /// Functions are keyed by their name and MCP items by server label;
    /// every other kind by its default tool name.
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::FunctionCall(c) => Some(&c.name),
            Self::McpCall(c) => Some(&c.server_label),
            Self::McpListTools(c) => Some(&c.server_label),
            Self::McpApprovalRequest(c) => Some(&c.server_label),
            other => other.tool_kind().and_then(ToolKind::default_name),
        }
    }

    pub fn resolution(&self) -> Option<CallResolution> {
        match self {
            Self::FunctionCall(_)
            | Self::LocalShellCall(_)
            | Self::ComputerCall(_)
            | Self::McpApprovalRequest(_) => Some(CallResolution::Client),
            Self::ImageGenerationCall(_)
            | Self::WebSearchCall(_)
            | Self::CodeInterpreterCall(_)
            | Self::McpCall(_)
            | Self::McpListTools(_) => Some(CallResolution::Hosted),
            Self::Message(_) | Self::Reasoning(_) | Self::Unsupported(_) => None,
        }
    }

    pub fn is_client_call(&self) -> bool {
        self.resolution() == Some(CallResolution::Client)
    }

    pub fn status(&self) -> Option<ItemStatus> {
        match self {
            Self::Message(i) => i.status,
            Self::FunctionCall(i) => i.status,
            Self::Reasoning(i) => i.status,
            Self::ImageGenerationCall(i) => i.status,
            Self::WebSearchCall(i) => i.status,
            Self::CodeInterpreterCall(i) => i.status,
            Self::McpCall(i) => i.status,
            Self::ComputerCall(i) => i.status,
            Self::LocalShellCall(i) => i.status,
            Self::McpListTools(_) | Self::McpApprovalRequest(_) | Self::Unsupported(_) => None,
        }
    }

    /// Concatenated assistant text of a message item.
    pub fn text(&self) -> Option<String> {
        match self {
            Self::Message(m) => Some(
                m.content
                    .iter()
                    .filter_map(|part| match part {
                        MessageContent::OutputText { text, .. } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Raw argument string of a call that carries one.
    pub fn arguments(&self) -> Option<&str> {
        match self {
            Self::FunctionCall(c) => Some(&c.arguments),
            Self::McpCall(c) => Some(&c.arguments),
            Self::McpApprovalRequest(c) => Some(&c.arguments),
            _ => None,
        }
    }

    /// Append a streamed fragment to the buffer addressed by `kind`.
    ///
    /// `part` is the content or summary index within the item.
    pub fn apply_delta(
        &mut self,
        kind: DeltaKind,
        part: usize,
        fragment: &str,
    ) -> Result<(), RondoError> {
        match (kind, &mut *self) {
            (DeltaKind::Text, Self::Message(m)) => {
                match nth_or_insert(&mut m.content, part, || MessageContent::OutputText {
                    text: String::new(),
                    annotations: Vec::new(),
                })? {
                    MessageContent::OutputText { text, .. } => text.push_str(fragment),
                    _ => return Err(delta_mismatch(kind, "non-text content part")),
                }
            }
            (DeltaKind::Refusal, Self::Message(m)) => {
                match nth_or_insert(&mut m.content, part, || MessageContent::Refusal {
                    refusal: String::new(),
                })? {
                    MessageContent::Refusal { refusal } => refusal.push_str(fragment),
                    _ => return Err(delta_mismatch(kind, "non-refusal content part")),
                }
            }
            (DeltaKind::Arguments, Self::FunctionCall(c)) => c.arguments.push_str(fragment),
            (DeltaKind::Arguments, Self::McpCall(c)) => c.arguments.push_str(fragment),
            (DeltaKind::ReasoningSummary, Self::Reasoning(r)) => {
                nth_or_insert(&mut r.summary, part, || ReasoningText {
                    kind: "summary_text".into(),
                    text: String::new(),
                })?
                .text
                .push_str(fragment);
            }
            (DeltaKind::ReasoningText, Self::Reasoning(r)) => {
                nth_or_insert(&mut r.content, part, || ReasoningText {
                    kind: "reasoning_text".into(),
                    text: String::new(),
                })?
                .text
                .push_str(fragment);
            }
            (DeltaKind::Code, Self::CodeInterpreterCall(c)) => {
                c.code.get_or_insert_with(String::new).push_str(fragment)
            }
            (kind, item) => return Err(delta_mismatch(kind, item.type_name())),
        }
        Ok(())
    }
}

/// Part `index` of `parts`, appending a fresh part when `index` is one past
/// the end. Indices further out are a protocol error.
fn nth_or_insert<T>(
    parts: &mut Vec<T>,
    index: usize,
    make: impl FnOnce() -> T,
) -> Result<&mut T, RondoError> {
    if index > parts.len() {
        return Err(RondoError::Protocol(format!(
            "delta addressed to part {index} but only {} parts exist",
            parts.len()
        )));
    }
    if index == parts.len() {
        parts.push(make());
    }
    Ok(&mut parts[index])
}

fn delta_mismatch(kind: DeltaKind, target: &str) -> RondoError {
    RondoError::Protocol(format!("{kind} delta addressed to {target}"))
}
