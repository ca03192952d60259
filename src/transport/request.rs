//! The request sent for each round.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::tools::{ToolChoice, ToolDefinition};
use crate::types::{InputItem, ToolOutput};

/// Everything a transport needs to issue one round.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRequest {
    pub model: String,
    pub input: Vec<InputItem>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
    pub store: bool,
    pub stream: bool,
    pub previous_response_id: Option<String>,
    pub instructions: Option<String>,
    pub parallel_tool_calls: Option<bool>,
    pub metadata: BTreeMap<String, String>,
}

impl CreateRequest {
    pub fn new(model: impl Into<String>, input: Vec<InputItem>) -> Self {
        Self {
            model: model.into(),
            input,
            tools: Vec::new(),
            tool_choice: ToolChoice::Auto,
            store: true,
            stream: false,
            previous_response_id: None,
            instructions: None,
            parallel_tool_calls: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Tool outputs carried by this request, in input order.
    pub fn tool_outputs(&self) -> impl Iterator<Item = &ToolOutput> {
        self.input.iter().filter_map(InputItem::as_tool_output)
    }

    /// JSON body for `POST /responses`.
    pub fn to_body(&self) -> Value {
        let input: Vec<Value> = self.input.iter().map(InputItem::to_wire).collect();
        let mut body = json!({
            "model": self.model,
            "input": input,
            "store": self.store,
            "stream": self.stream,
        });
        let Some(obj) = body.as_object_mut() else {
            return body;
        };
        if !self.tools.is_empty() {
            let tools: Vec<Value> = self.tools.iter().map(ToolDefinition::to_wire).collect();
            obj.insert("tools".into(), Value::Array(tools));
            obj.insert("tool_choice".into(), self.tool_choice.to_wire());
        }
        if let Some(id) = &self.previous_response_id {
            obj.insert("previous_response_id".into(), json!(id));
        }
        if let Some(instructions) = &self.instructions {
            obj.insert("instructions".into(), json!(instructions));
        }
        if let Some(parallel) = self.parallel_tool_calls {
            obj.insert("parallel_tool_calls".into(), json!(parallel));
        }
        if !self.metadata.is_empty() {
            obj.insert("metadata".into(), json!(self.metadata));
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolParameters;
    use crate::types::Input;
    use pretty_assertions::assert_eq;

    #[test]
    fn body_includes_tools_choice_and_continuation() {
        let mut request = CreateRequest::new("gpt-4.1", Input::from("add 2 and 3").into_items());
        request.tools.push(ToolDefinition::function(
            "add_two_ints",
            "Add two integers",
            ToolParameters::object().integer("a", "a", true).build(),
        ));
        request.tool_choice = ToolChoice::function("add_two_ints");
        request.previous_response_id = Some("resp_0".into());
        request.instructions = Some("be terse".into());

        let body = request.to_body();
        assert_eq!(body["model"], "gpt-4.1");
        assert_eq!(body["store"], true);
        assert_eq!(body["stream"], false);
        assert_eq!(body["tools"][0]["name"], "add_two_ints");
        assert_eq!(
            body["tool_choice"],
            json!({"type": "function", "name": "add_two_ints"})
        );
        assert_eq!(body["previous_response_id"], "resp_0");
        assert_eq!(body["instructions"], "be terse");
        assert_eq!(
            body["input"],
            json!([{"type": "message", "role": "user", "content": "add 2 and 3"}])
        );
    }

    #[test]
    fn body_omits_empty_optionals() {
        let body = CreateRequest::new("m", Vec::new()).to_body();
        let obj = body.as_object().unwrap();
        assert!(!obj.contains_key("tools"));
        assert!(!obj.contains_key("tool_choice"));
        assert!(!obj.contains_key("previous_response_id"));
        assert!(!obj.contains_key("metadata"));
    }
}
