//! Allowlist-based answers to MCP approval requests.

use async_trait::async_trait;
use regex::Regex;

use crate::error::RondoError;
use crate::tools::{ToolDefinition, ToolHandler, ToolInvocation};
use crate::types::{McpApprovalDecision, OutputItem, ToolOutput, ToolOutputPayload};

/// Declares a remote MCP server and answers its approval requests.
///
/// A request is approved when the requested tool name fully matches one of
/// the allowlist patterns. Hosted `mcp_call` results are not post-processed.
#[derive(Debug, Clone)]
pub struct McpApprovalTool {
    definition: ToolDefinition,
    allow: Vec<Regex>,
}

impl McpApprovalTool {
    pub fn new(server_label: impl Into<String>, server_url: impl Into<String>) -> Self {
        Self {
            definition: ToolDefinition::mcp(server_label, server_url),
            allow: Vec::new(),
        }
    }

    /// Approve tool names matching `pattern` (anchored at both ends).
    pub fn allow(mut self, pattern: &str) -> Result<Self, RondoError> {
        let anchored = format!("^(?:{pattern})$");
        let regex = Regex::new(&anchored)
            .map_err(|e| RondoError::Configuration(format!("invalid MCP allow pattern {pattern:?}: {e}")))?;
        self.allow.push(regex);
        Ok(self)
    }

    /// Extra `mcp` tool fields, such as `require_approval` or `headers`.
    pub fn with_option(mut self, key: &str, value: serde_json::Value) -> Self {
        self.definition = self.definition.with_option(key, value);
        self
    }

    pub fn is_allowed(&self, tool_name: &str) -> bool {
        self.allow.iter().any(|regex| regex.is_match(tool_name))
    }
}

#[async_trait]
impl ToolHandler for McpApprovalTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn accepts(&self, item: &OutputItem) -> bool {
        matches!(item, OutputItem::McpApprovalRequest(_))
    }

    async fn execute(&self, invocation: &ToolInvocation) -> Result<ToolOutput, RondoError> {
        let OutputItem::McpApprovalRequest(request) = invocation.item() else {
            return Err(RondoError::HandlerExecution {
                tool_name: self.definition.name.clone(),
                message: format!("cannot answer {} item", invocation.item().type_name()),
            });
        };
        let approve = self.is_allowed(&request.name);
        let reason = (!approve).then(|| format!("{} is not on the allowlist", request.name));
        tracing::debug!(
            server = %request.server_label,
            tool = %request.name,
            approve,
            "answering MCP approval request"
        );
        Ok(invocation.output(ToolOutputPayload::Approval(McpApprovalDecision {
            approve,
            reason,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{McpApprovalRequestItem, McpCallItem};

    fn request(name: &str) -> OutputItem {
        OutputItem::McpApprovalRequest(McpApprovalRequestItem {
            id: "mcpr_1".into(),
            server_label: "docs".into(),
            name: name.into(),
            arguments: "{}".into(),
        })
    }

    #[tokio::test]
    async fn approves_only_allowlisted_names() {
        let tool = McpApprovalTool::new("docs", "https://example.test/mcp")
            .allow("search_.*")
            .unwrap();

        let output = tool
            .execute(&ToolInvocation::from_item(request("search_docs")).unwrap())
            .await
            .unwrap();
        assert_eq!(output.to_wire()["approve"], true);

        let output = tool
            .execute(&ToolInvocation::from_item(request("delete_everything")).unwrap())
            .await
            .unwrap();
        assert_eq!(output.to_wire()["approve"], false);
        assert_eq!(output.to_wire()["approval_request_id"], "mcpr_1");
    }

    #[test]
    fn patterns_are_anchored() {
        let tool = McpApprovalTool::new("docs", "https://example.test/mcp")
            .allow("search")
            .unwrap();
        assert!(tool.is_allowed("search"));
        assert!(!tool.is_allowed("search_and_destroy"));
        assert!(McpApprovalTool::new("docs", "u").allow("(").is_err());
    }

    #[test]
    fn hosted_mcp_calls_are_declined() {
        let tool = McpApprovalTool::new("docs", "https://example.test/mcp");
        let call = OutputItem::McpCall(McpCallItem {
            id: "mcp_1".into(),
            server_label: "docs".into(),
            name: "search".into(),
            arguments: "{}".into(),
            output: Some("ok".into()),
            error: None,
            approval_request_id: None,
            status: None,
        });
        assert!(!tool.accepts(&call));
        assert!(tool.accepts(&request("search")));
    }
}
