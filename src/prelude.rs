//! Convenience re-exports for common use.

pub use crate::config::{DispatchMode, RondoConfig, SessionConfig};
pub use crate::dispatch::PendingCall;
pub use crate::error::{Result, RondoError};
pub use crate::session::{NextStep, RoundOutcome, Session, SessionEvent, SessionEventPayload, SessionState};
pub use crate::tools::{
    FnTool, HostedTool, ToolArguments, ToolChoice, ToolDefinition, ToolHandler, ToolInvocation,
    ToolKind, ToolParameters, ToolRegistry,
};
pub use crate::transport::{HttpTransport, ReplayTransport, ScriptedRound, Transport};
pub use crate::types::{
    Input, InputItem, InputMessage, OutputItem, Response, ResponseEvent, ResponseStatus,
    ToolOutput, ToolOutputPayload, Usage,
};
