//! Tool capabilities, wire definitions and tool-choice constraints.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Capability a handler declares. Dispatch matches on `(kind, name)`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolKind {
    Function,
    LocalShell,
    ImageGeneration,
    ComputerUse,
    Mcp,
    CodeInterpreter,
    WebSearch,
}

impl ToolKind {
    /// Registry name of kinds that have a single, fixed name.
    pub fn default_name(self) -> Option<&'static str> {
        match self {
            Self::Function | Self::Mcp => None,
            Self::LocalShell => Some("local_shell"),
            Self::ImageGeneration => Some("image_generation"),
            Self::ComputerUse => Some("computer_use_preview"),
            Self::CodeInterpreter => Some("code_interpreter"),
            Self::WebSearch => Some("web_search"),
        }
    }

    /// Whether the remote API runs this tool itself.
    pub fn is_hosted(self) -> bool {
        matches!(
            self,
            Self::ImageGeneration | Self::CodeInterpreter | Self::WebSearch
        )
    }
}

/// Immutable metadata of a registered tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub kind: ToolKind,
    /// Function name, MCP server label, or the kind's default name.
    pub name: String,
    pub description: String,
    /// JSON Schema of function parameters.
    pub parameters: Option<Value>,
    /// Extra wire fields merged into the definition (for example
    /// `partial_images` for image generation).
    pub options: Map<String, Value>,
}

impl ToolDefinition {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            kind: ToolKind::Function,
            name: name.into(),
            description: description.into(),
            parameters: Some(parameters),
            options: Map::new(),
        }
    }

    /// Definition for a kind with a fixed name.
    pub fn builtin(kind: ToolKind) -> Self {
        Self {
            kind,
            name: kind.default_name().unwrap_or_default().to_string(),
            description: String::new(),
            parameters: None,
            options: Map::new(),
        }
    }

    pub fn local_shell() -> Self {
        Self::builtin(ToolKind::LocalShell)
    }

    pub fn computer_use(display_width: u32, display_height: u32, environment: &str) -> Self {
        Self::builtin(ToolKind::ComputerUse)
            .with_option("display_width", json!(display_width))
            .with_option("display_height", json!(display_height))
            .with_option("environment", json!(environment))
    }

    pub fn image_generation() -> Self {
        Self::builtin(ToolKind::ImageGeneration)
    }

    pub fn code_interpreter() -> Self {
        Self::builtin(ToolKind::CodeInterpreter).with_option("container", json!({"type": "auto"}))
    }

    pub fn web_search() -> Self {
        Self::builtin(ToolKind::WebSearch)
    }

    pub fn mcp(server_label: impl Into<String>, server_url: impl Into<String>) -> Self {
        Self {
            kind: ToolKind::Mcp,
            name: server_label.into(),
            description: String::new(),
            parameters: None,
            options: Map::new(),
        }
        .with_option("server_url", Value::String(server_url.into()))
    }

    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Entry of the request's `tools` array.
    pub fn to_wire(&self) -> Value {
        let mut body = match self.kind {
            ToolKind::Function => json!({
                "type": "function",
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters.clone().unwrap_or_else(|| json!({
                    "type": "object",
                    "properties": {},
                })),
                "strict": false,
            }),
            ToolKind::Mcp => json!({
                "type": "mcp",
                "server_label": self.name,
            }),
            ToolKind::ComputerUse => json!({"type": "computer_use_preview"}),
            other => json!({"type": other.to_string()}),
        };
        if let Some(obj) = body.as_object_mut() {
            for (key, value) in &self.options {
                obj.insert(key.clone(), value.clone());
            }
        }
        body
    }
}

/// Constraint on which tool the model may or must call.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Required,
    Function {
        name: String,
    },
    /// Force a built-in kind (image generation, web search...).
    Hosted(ToolKind),
    Mcp {
        server_label: String,
        name: Option<String>,
    },
}

impl ToolChoice {
    pub fn function(name: impl Into<String>) -> Self {
        Self::Function { name: name.into() }
    }

    /// Whether the choice forces a call rather than leaving it to the model.
    pub fn is_forced(&self) -> bool {
        !matches!(self, Self::Auto | Self::None)
    }

    pub fn to_wire(&self) -> Value {
        match self {
            Self::Auto => json!("auto"),
            Self::None => json!("none"),
            Self::Required => json!("required"),
            Self::Function { name } => json!({"type": "function", "name": name}),
            Self::Hosted(kind) => match kind {
                ToolKind::ComputerUse => json!({"type": "computer_use_preview"}),
                other => json!({"type": other.to_string()}),
            },
            Self::Mcp { server_label, name } => {
                let mut body = json!({"type": "mcp", "server_label": server_label});
                if let Some(name) = name {
                    body["name"] = json!(name);
                }
                body
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    #[test]
    fn kinds_parse_from_snake_case() {
        assert_eq!(ToolKind::from_str("local_shell").unwrap(), ToolKind::LocalShell);
        assert_eq!(ToolKind::ImageGeneration.to_string(), "image_generation");
    }

    #[test]
    fn image_generation_definition_carries_options() {
        let def = ToolDefinition::image_generation().with_option("partial_images", json!(1));
        assert_eq!(
            def.to_wire(),
            json!({"type": "image_generation", "partial_images": 1})
        );
    }

    #[test]
    fn forced_function_choice_wire_shape() {
        let choice = ToolChoice::function("add_two_ints");
        assert!(choice.is_forced());
        assert_eq!(
            choice.to_wire(),
            json!({"type": "function", "name": "add_two_ints"})
        );
        assert!(!ToolChoice::Auto.is_forced());
    }
}
