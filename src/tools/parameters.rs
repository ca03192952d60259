//! JSON Schema builder for function tool parameters.

use serde_json::{json, Map, Value};

/// Builder for an object schema.
#[derive(Debug, Default)]
pub struct ToolParameters {
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl ToolParameters {
    pub fn object() -> Self {
        Self::default()
    }

    /// Schema with no parameters.
    pub fn empty() -> Value {
        Self::default().build()
    }

    fn property(mut self, name: &str, schema: Value, required: bool) -> Self {
        self.properties.insert(name.to_string(), schema);
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    pub fn string(self, name: &str, description: &str, required: bool) -> Self {
        self.property(
            name,
            json!({"type": "string", "description": description}),
            required,
        )
    }

    pub fn integer(self, name: &str, description: &str, required: bool) -> Self {
        self.property(
            name,
            json!({"type": "integer", "description": description}),
            required,
        )
    }

    pub fn number(self, name: &str, description: &str, required: bool) -> Self {
        self.property(
            name,
            json!({"type": "number", "description": description}),
            required,
        )
    }

    pub fn boolean(self, name: &str, description: &str, required: bool) -> Self {
        self.property(
            name,
            json!({"type": "boolean", "description": description}),
            required,
        )
    }

    pub fn string_enum(self, name: &str, description: &str, values: &[&str], required: bool) -> Self {
        self.property(
            name,
            json!({"type": "string", "description": description, "enum": values}),
            required,
        )
    }

    pub fn build(self) -> Value {
        json!({
            "type": "object",
            "properties": self.properties,
            "required": self.required,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_required_list_in_declaration_order() {
        let schema = ToolParameters::object()
            .integer("a", "first", true)
            .integer("b", "second", true)
            .string("note", "optional", false)
            .build();
        assert_eq!(schema["required"], json!(["a", "b"]));
        assert_eq!(schema["properties"]["a"]["type"], "integer");
    }
}
