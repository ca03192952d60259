//! Handler trait, invocation context and closure-based handlers.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::arguments::ToolArguments;
use super::definition::{ToolDefinition, ToolKind};
use crate::error::RondoError;
use crate::types::{OutputItem, ToolOutput, ToolOutputKind, ToolOutputPayload, ToolOutputStatus};

/// One call handed to a handler.
///
/// Outputs are built through [`ToolInvocation::output`] and
/// [`ToolInvocation::failed`] so they always carry this call's id.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    item: OutputItem,
    call_id: String,
    kind: ToolKind,
    tool_name: String,
    output_kind: ToolOutputKind,
    arguments: ToolArguments,
}

impl ToolInvocation {
    /// Build the invocation for a call item, parsing its arguments.
    ///
    /// Function arguments must be valid JSON. Other kinds carry their action
    /// payload (or raw argument string) as arguments.
    pub fn from_item(item: OutputItem) -> Result<Self, RondoError> {
        let not_a_call =
            || RondoError::Protocol(format!("{} item is not a tool call", item.type_name()));
        let call_id = item.call_id().ok_or_else(not_a_call)?.to_string();
        let kind = item.tool_kind().ok_or_else(not_a_call)?;
        let output_kind = ToolOutputKind::for_item(&item).ok_or_else(not_a_call)?;
        let tool_name = item.tool_name().unwrap_or_default().to_string();

        let arguments = match &item {
            OutputItem::FunctionCall(call) => ToolArguments::parse(&call_id, &call.arguments)?,
            OutputItem::McpCall(_) | OutputItem::McpApprovalRequest(_) => {
                let raw = item.arguments().unwrap_or_default();
                ToolArguments::parse(&call_id, raw).unwrap_or_else(|_| {
                    ToolArguments::new(&call_id, Value::String(raw.to_string()))
                })
            }
            OutputItem::LocalShellCall(call) => {
                ToolArguments::new(&call_id, serde_json::to_value(&call.action)?)
            }
            OutputItem::ComputerCall(call) => {
                ToolArguments::new(&call_id, serde_json::to_value(&call.action)?)
            }
            _ => ToolArguments::new(&call_id, Value::Object(Default::default())),
        };

        Ok(Self {
            item,
            call_id,
            kind,
            tool_name,
            output_kind,
            arguments,
        })
    }

    pub fn item(&self) -> &OutputItem {
        &self.item
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn kind(&self) -> ToolKind {
        self.kind
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn arguments(&self) -> &ToolArguments {
        &self.arguments
    }

    /// Successful output for this call.
    pub fn output(&self, payload: ToolOutputPayload) -> ToolOutput {
        ToolOutput::new(
            self.output_kind,
            &self.call_id,
            payload,
            ToolOutputStatus::Completed,
        )
    }

    /// Successful output carrying a JSON result as text.
    pub fn json(&self, value: &Value) -> ToolOutput {
        self.output(ToolOutputPayload::json(value))
    }

    pub fn text(&self, text: impl Into<String>) -> ToolOutput {
        self.output(ToolOutputPayload::text(text))
    }

    /// Failed output carrying an error message.
    pub fn failed(&self, message: impl Into<String>) -> ToolOutput {
        ToolOutput::new(
            self.output_kind,
            &self.call_id,
            ToolOutputPayload::text(message),
            ToolOutputStatus::Failed,
        )
    }
}

/// A registered tool: immutable metadata plus an async entry point.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn definition(&self) -> &ToolDefinition;

    fn name(&self) -> &str {
        &self.definition().name
    }

    fn kind(&self) -> ToolKind {
        self.definition().kind
    }

    /// Whether this handler answers `item`. Items it declines are treated as
    /// if no handler were registered.
    fn accepts(&self, _item: &OutputItem) -> bool {
        true
    }

    async fn execute(&self, invocation: &ToolInvocation) -> Result<ToolOutput, RondoError>;
}

type InvocationHandler = dyn Fn(ToolInvocation) -> Pin<Box<dyn Future<Output = Result<ToolOutput, RondoError>> + Send>>
    + Send
    + Sync;

/// Closure-backed handler of any kind.
pub struct FnTool {
    definition: ToolDefinition,
    handler: Arc<InvocationHandler>,
}

impl FnTool {
    /// Handler that receives the full invocation.
    pub fn new<F, Fut>(definition: ToolDefinition, handler: F) -> Self
    where
        F: Fn(ToolInvocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutput, RondoError>> + Send + 'static,
    {
        Self {
            definition,
            handler: Arc::new(move |invocation| Box::pin(handler(invocation))),
        }
    }

    /// Function tool whose closure maps arguments to a JSON result.
    pub fn function<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RondoError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        Self::new(
            ToolDefinition::function(name, description, parameters),
            move |invocation: ToolInvocation| {
                let handler = Arc::clone(&handler);
                async move {
                    let value = handler(invocation.arguments().clone()).await?;
                    Ok(invocation.json(&value))
                }
            },
        )
    }
}

#[async_trait]
impl ToolHandler for FnTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, invocation: &ToolInvocation) -> Result<ToolOutput, RondoError> {
        (self.handler)(invocation.clone()).await
    }
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("kind", &self.definition.kind)
            .field("name", &self.definition.name)
            .finish()
    }
}

/// Declares a hosted tool to the remote API without local post-processing.
#[derive(Debug, Clone)]
pub struct HostedTool {
    definition: ToolDefinition,
}

impl HostedTool {
    pub fn new(definition: ToolDefinition) -> Self {
        Self { definition }
    }
}

#[async_trait]
impl ToolHandler for HostedTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn accepts(&self, _item: &OutputItem) -> bool {
        false
    }

    async fn execute(&self, invocation: &ToolInvocation) -> Result<ToolOutput, RondoError> {
        Err(RondoError::InvalidState(format!(
            "{} is resolved remotely; call {} has no local output",
            self.definition.name,
            invocation.call_id()
        )))
    }
}
