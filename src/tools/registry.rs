//! Name-unique collection of tool handlers.

use std::collections::HashMap;
use std::sync::Arc;

use super::definition::{ToolChoice, ToolDefinition, ToolKind};
use super::handler::ToolHandler;
use crate::error::RondoError;
use crate::types::OutputItem;

/// Handlers keyed by their declared name, in registration order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    handlers: Vec<Arc<dyn ToolHandler>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Names are unique across all kinds.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) -> Result<(), RondoError> {
        let name = handler.name().to_string();
        if name.is_empty() {
            return Err(RondoError::Configuration(format!(
                "{} tool registered without a name",
                handler.kind()
            )));
        }
        if self.by_name.contains_key(&name) {
            return Err(RondoError::DuplicateTool(name));
        }
        self.by_name.insert(name, self.handlers.len());
        self.handlers.push(handler);
        Ok(())
    }

    /// Builder-style registration.
    pub fn with(mut self, handler: impl ToolHandler + 'static) -> Result<Self, RondoError> {
        self.register(Arc::new(handler))?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.by_name.get(name).map(|&index| &self.handlers[index])
    }

    /// Handler registered under `(kind, name)`.
    pub fn lookup(&self, kind: ToolKind, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.get(name).filter(|handler| handler.kind() == kind)
    }

    /// Handler that answers `item`, if any.
    pub fn resolve(&self, item: &OutputItem) -> Option<Arc<dyn ToolHandler>> {
        let kind = item.tool_kind()?;
        let name = item.tool_name()?;
        self.lookup(kind, name)
            .filter(|handler| handler.accepts(item))
            .cloned()
    }

    pub fn has_kind(&self, kind: ToolKind) -> bool {
        self.handlers.iter().any(|handler| handler.kind() == kind)
    }

    /// Definitions in registration order, as sent in each request.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.handlers
            .iter()
            .map(|handler| handler.definition().clone())
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|handler| handler.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Check that a forced tool choice references a registered tool.
    pub fn validate_choice(&self, choice: &ToolChoice) -> Result<(), RondoError> {
        match choice {
            ToolChoice::Auto | ToolChoice::None => Ok(()),
            ToolChoice::Required if self.is_empty() => Err(RondoError::UnknownToolChoice(
                "required (no tools registered)".into(),
            )),
            ToolChoice::Required => Ok(()),
            ToolChoice::Function { name } => self
                .lookup(ToolKind::Function, name)
                .map(|_| ())
                .ok_or_else(|| RondoError::UnknownToolChoice(name.clone())),
            ToolChoice::Hosted(kind) => {
                if self.has_kind(*kind) {
                    Ok(())
                } else {
                    Err(RondoError::UnknownToolChoice(kind.to_string()))
                }
            }
            ToolChoice::Mcp { server_label, .. } => self
                .lookup(ToolKind::Mcp, server_label)
                .map(|_| ())
                .ok_or_else(|| RondoError::UnknownToolChoice(server_label.clone())),
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{FnTool, HostedTool, ToolParameters};
    use crate::types::{FunctionCallItem, ImageGenerationCallItem};
    use serde_json::json;

    fn echo(name: &str) -> FnTool {
        FnTool::function(name, "echo", ToolParameters::empty(), |args| async move {
            Ok(args.raw().clone())
        })
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let registry = ToolRegistry::new().with(echo("dup")).unwrap();
        let err = registry.with(echo("dup")).unwrap_err();
        assert!(matches!(err, RondoError::DuplicateTool(name) if name == "dup"));
    }

    #[test]
    fn tool_choice_must_reference_registered_tool() {
        let registry = ToolRegistry::new().with(echo("add_two_ints")).unwrap();
        assert!(registry
            .validate_choice(&ToolChoice::function("add_two_ints"))
            .is_ok());
        assert!(matches!(
            registry.validate_choice(&ToolChoice::function("missing")),
            Err(RondoError::UnknownToolChoice(_))
        ));
        assert!(registry
            .validate_choice(&ToolChoice::Hosted(ToolKind::WebSearch))
            .is_err());
        assert!(ToolRegistry::new()
            .validate_choice(&ToolChoice::Required)
            .is_err());
    }

    #[test]
    fn resolve_matches_kind_and_name() {
        let registry = ToolRegistry::new()
            .with(echo("lookup"))
            .unwrap()
            .with(HostedTool::new(ToolDefinition::image_generation()))
            .unwrap();
        let call = OutputItem::FunctionCall(FunctionCallItem {
            id: None,
            call_id: "c1".into(),
            name: "lookup".into(),
            arguments: json!({}).to_string(),
            status: None,
        });
        assert!(registry.resolve(&call).is_some());

        let image = OutputItem::ImageGenerationCall(ImageGenerationCallItem {
            id: "ig_1".into(),
            status: None,
            result: None,
            revised_prompt: None,
            output_format: None,
            size: None,
            partial_image_index: None,
        });
        // declared but declines local post-processing
        assert!(registry.resolve(&image).is_none());
        assert!(registry.has_kind(ToolKind::ImageGeneration));
    }
}
