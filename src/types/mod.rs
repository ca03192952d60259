//! Core data model: output items, responses, events and request input.

pub mod event;
pub mod input;
pub mod item;
pub mod response;
pub mod usage;

pub use event::{DeltaKind, ResponseEvent};
pub use input::{
    ComputerScreenshot, Input, InputItem, InputMessage, McpApprovalDecision, Role, ToolOutput,
    ToolOutputKind, ToolOutputPayload, ToolOutputStatus,
};
pub use item::{
    CallResolution, CodeInterpreterCallItem, ComputerAction, ComputerCallItem, FunctionCallItem,
    ImageGenerationCallItem, ItemStatus, LocalShellAction, LocalShellCallItem, McpApprovalRequestItem,
    McpCallItem, McpListToolsItem, MessageContent, MessageItem, OutputItem, Point, ReasoningItem,
    ReasoningText, SafetyCheck, WebSearchCallItem,
};
pub use response::{Response, ResponseError, ResponseStatus};
pub use usage::Usage;
