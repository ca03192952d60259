//! Computer-use handler driven through the [`Computer`] trait.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::error::RondoError;
use crate::tools::{ToolDefinition, ToolHandler, ToolInvocation};
use crate::types::{
    ComputerAction, ComputerScreenshot, OutputItem, Point, ToolOutput, ToolOutputPayload,
};

/// A display the model can operate. Coordinates are in screen pixels.
#[async_trait]
pub trait Computer: Send + Sync {
    /// `browser`, `mac`, `windows` or `ubuntu`.
    fn environment(&self) -> &str {
        "browser"
    }

    fn dimensions(&self) -> (u32, u32);

    async fn click(&self, x: i64, y: i64, button: &str) -> Result<(), RondoError>;
    async fn double_click(&self, x: i64, y: i64) -> Result<(), RondoError>;
    async fn scroll(&self, x: i64, y: i64, scroll_x: i64, scroll_y: i64) -> Result<(), RondoError>;
    async fn type_text(&self, text: &str) -> Result<(), RondoError>;
    async fn keypress(&self, keys: &[String]) -> Result<(), RondoError>;
    async fn move_to(&self, x: i64, y: i64) -> Result<(), RondoError>;
    async fn drag(&self, path: &[Point]) -> Result<(), RondoError>;

    async fn wait(&self) -> Result<(), RondoError> {
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        Ok(())
    }

    /// PNG screenshot, base64 encoded.
    async fn screenshot(&self) -> Result<String, RondoError>;
}

/// What to do with pending safety checks on a computer call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SafetyCheckPolicy {
    /// Refuse to act; the call gets a failed output.
    #[default]
    Refuse,
    /// Act and acknowledge every pending check in the output.
    AcknowledgeAll,
}

/// Answers `computer_call` items with a screenshot taken after the action.
pub struct ComputerTool<C> {
    computer: Arc<C>,
    definition: ToolDefinition,
    policy: SafetyCheckPolicy,
}

impl<C: Computer> ComputerTool<C> {
    pub fn new(computer: C) -> Self {
        let (width, height) = computer.dimensions();
        let definition = ToolDefinition::computer_use(width, height, computer.environment());
        Self {
            computer: Arc::new(computer),
            definition,
            policy: SafetyCheckPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SafetyCheckPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn perform(&self, action: &ComputerAction) -> Result<(), RondoError> {
        let computer = &self.computer;
        match action {
            ComputerAction::Click { x, y, button } => computer.click(*x, *y, button).await,
            ComputerAction::DoubleClick { x, y } => computer.double_click(*x, *y).await,
            ComputerAction::Drag { path } => computer.drag(path).await,
            ComputerAction::Keypress { keys } => computer.keypress(keys).await,
            ComputerAction::Move { x, y } => computer.move_to(*x, *y).await,
            ComputerAction::Screenshot => Ok(()),
            ComputerAction::Scroll {
                x,
                y,
                scroll_x,
                scroll_y,
            } => computer.scroll(*x, *y, *scroll_x, *scroll_y).await,
            ComputerAction::Type { text } => computer.type_text(text).await,
            ComputerAction::Wait => computer.wait().await,
        }
    }
}

#[async_trait]
impl<C: Computer + 'static> ToolHandler for ComputerTool<C> {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, invocation: &ToolInvocation) -> Result<ToolOutput, RondoError> {
        let OutputItem::ComputerCall(call) = invocation.item() else {
            return Err(RondoError::HandlerExecution {
                tool_name: self.definition.name.clone(),
                message: format!("cannot run {} item", invocation.item().type_name()),
            });
        };

        if !call.pending_safety_checks.is_empty() && self.policy == SafetyCheckPolicy::Refuse {
            let codes: Vec<&str> = call
                .pending_safety_checks
                .iter()
                .map(|check| check.code.as_deref().unwrap_or(check.id.as_str()))
                .collect();
            return Ok(invocation.failed(
                json!({"error": "safety checks not acknowledged", "checks": codes}).to_string(),
            ));
        }

        self.perform(&call.action).await?;
        let encoded = self.computer.screenshot().await?;
        let mut screenshot = ComputerScreenshot::png_base64(&encoded);
        screenshot.acknowledged_safety_checks = call.pending_safety_checks.clone();
        Ok(invocation.output(ToolOutputPayload::Screenshot(screenshot)))
    }
}
