//! Tool definitions, handlers and the registry.

pub mod arguments;
pub mod builtin;
pub mod definition;
pub mod handler;
pub mod parameters;
pub mod registry;

pub use arguments::ToolArguments;
pub use definition::{ToolChoice, ToolDefinition, ToolKind};
pub use handler::{FnTool, HostedTool, ToolHandler, ToolInvocation};
pub use parameters::ToolParameters;
pub use registry::ToolRegistry;
