//! Tool dispatch: match call items to handlers and collect their outputs.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::RondoError;
use crate::tools::{ToolInvocation, ToolKind, ToolRegistry};
use crate::types::{
    CallResolution, OutputItem, Response, ToolOutput, ToolOutputKind, ToolOutputPayload,
    ToolOutputStatus,
};
use crate::util::timeout::with_timeout;

/// A client-resolved call still waiting for an answer.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCall {
    item: OutputItem,
    call_id: String,
    kind: ToolKind,
    tool_name: String,
    output_kind: ToolOutputKind,
}

impl PendingCall {
    pub fn from_item(item: &OutputItem) -> Option<Self> {
        Some(Self {
            call_id: item.call_id()?.to_string(),
            kind: item.tool_kind()?,
            tool_name: item.tool_name().unwrap_or_default().to_string(),
            output_kind: ToolOutputKind::for_item(item)?,
            item: item.clone(),
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

    pub fn output_kind(&self) -> ToolOutputKind {
        self.output_kind
    }

    /// Parsed invocation, for callers answering calls themselves.
    pub fn invocation(&self) -> Result<ToolInvocation, RondoError> {
        ToolInvocation::from_item(self.item.clone())
    }

    pub fn output(&self, payload: ToolOutputPayload) -> ToolOutput {
        ToolOutput::new(
            self.output_kind,
            &self.call_id,
            payload,
            ToolOutputStatus::Completed,
        )
    }

    pub fn json(&self, value: &Value) -> ToolOutput {
        self.output(ToolOutputPayload::json(value))
    }

    pub fn failed(&self, message: impl Into<String>) -> ToolOutput {
        ToolOutput::new(
            self.output_kind,
            &self.call_id,
            ToolOutputPayload::text(message),
            ToolOutputStatus::Failed,
        )
    }

    pub(crate) fn unhandled_error(&self) -> RondoError {
        RondoError::UnhandledToolCall {
            call_id: self.call_id.clone(),
            tool_name: self.tool_name.clone(),
            kind: self.kind,
        }
    }
}

/// Progress notices raised while a dispatch pass runs.
#[derive(Debug, Clone)]
pub enum DispatchNotice {
    Started {
        call_id: String,
        tool_name: String,
        kind: ToolKind,
    },
    Finished {
        output: ToolOutput,
    },
}

/// Result of one dispatch pass.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// Answers to client-resolved calls, in item order.
    pub outputs: Vec<ToolOutput>,
    /// Local post-processing results of hosted calls. Never resubmitted.
    pub hosted: Vec<ToolOutput>,
    /// Client-resolved calls with no handler.
    pub unhandled: Vec<PendingCall>,
}

impl DispatchReport {
    /// Report that leaves every unanswered client call to the caller.
    pub fn manual(response: &Response, answered: &HashSet<String>) -> Self {
        Self {
            unhandled: pending_calls(response, answered),
            ..Default::default()
        }
    }
}

/// Client-resolved calls of `response` that are not in `answered`.
pub fn pending_calls(response: &Response, answered: &HashSet<String>) -> Vec<PendingCall> {
    response
        .client_calls()
        .filter(|item| item.call_id().is_some_and(|id| !answered.contains(id)))
        .filter_map(PendingCall::from_item)
        .collect()
}

/// Runs registered handlers for the calls of a response.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    tool_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            tool_timeout: None,
        }
    }

    pub fn with_tool_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute every unanswered call that has a handler, one task per call.
    ///
    /// Returns `Cancelled` as soon as `cancel` fires; running tasks are
    /// detached and their results dropped.
    pub async fn dispatch(
        &self,
        response: &Response,
        answered: &HashSet<String>,
        cancel: &CancellationToken,
        observer: &(dyn Fn(DispatchNotice) + Send + Sync),
    ) -> Result<DispatchReport, RondoError> {
        let mut report = DispatchReport::default();
        let mut jobs: Vec<BoxFuture<'static, (CallResolution, ToolOutput)>> = Vec::new();

        for item in &response.output {
            let (Some(resolution), Some(call_id)) = (item.resolution(), item.call_id()) else {
                continue;
            };
            if answered.contains(call_id) {
                continue;
            }
            let Some(handler) = self.registry.resolve(item) else {
                if resolution == CallResolution::Client {
                    report.unhandled.extend(PendingCall::from_item(item));
                }
                continue;
            };
            let Some(pending) = PendingCall::from_item(item) else {
                continue;
            };

            observer(DispatchNotice::Started {
                call_id: pending.call_id.clone(),
                tool_name: pending.tool_name.clone(),
                kind: pending.kind,
            });

            let invocation = match ToolInvocation::from_item(item.clone()) {
                Ok(invocation) => invocation,
                Err(err) => {
                    warn!(call_id, tool = pending.tool_name.as_str(), error = %err, "tool call rejected");
                    let output = pending.failed(err.to_string());
                    jobs.push(future::ready((resolution, output)).boxed());
                    continue;
                }
            };

            debug!(
                call_id,
                tool = invocation.tool_name(),
                kind = %invocation.kind(),
                "dispatching tool call"
            );
            let timeout = self.tool_timeout;
            let task = tokio::spawn(async move {
                let result = match timeout {
                    Some(limit) => with_timeout(limit, handler.execute(&invocation)).await,
                    None => handler.execute(&invocation).await,
                };
                settle(&invocation, result)
            });
            jobs.push(
                async move {
                    let output = match task.await {
                        Ok(output) => output,
                        Err(e) => pending.failed(format!("tool task failed: {e}")),
                    };
                    (resolution, output)
                }
                .boxed(),
            );
        }

        let results = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RondoError::Cancelled),
            results = future::join_all(jobs) => results,
        };

        for (resolution, output) in results {
            observer(DispatchNotice::Finished {
                output: output.clone(),
            });
            match resolution {
                CallResolution::Client => report.outputs.push(output),
                CallResolution::Hosted => report.hosted.push(output),
            }
        }
        Ok(report)
    }
}

/// Fold a handler result into an output for the invoked call.
fn settle(invocation: &ToolInvocation, result: Result<ToolOutput, RondoError>) -> ToolOutput {
    match result {
        Ok(output) if output.call_id() == invocation.call_id() => output,
        Ok(output) => {
            warn!(
                call_id = invocation.call_id(),
                returned = output.call_id(),
                "handler answered a different call"
            );
            invocation.failed(format!(
                "handler answered call {} instead of {}",
                output.call_id(),
                invocation.call_id()
            ))
        }
        Err(err) => {
            let err = match err {
                err @ (RondoError::InvalidArguments { .. } | RondoError::HandlerExecution { .. }) => err,
                other => RondoError::HandlerExecution {
                    tool_name: invocation.tool_name().to_string(),
                    message: other.to_string(),
                },
            };
            debug!(call_id = invocation.call_id(), error = %err, "tool call failed");
            invocation.failed(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{FnTool, ToolDefinition, ToolParameters};
    use crate::types::{FunctionCallItem, ResponseStatus};
    use serde_json::json;
    use std::sync::Mutex;

    fn call(call_id: &str, name: &str, arguments: &str) -> OutputItem {
        OutputItem::FunctionCall(FunctionCallItem {
            id: None,
            call_id: call_id.into(),
            name: name.into(),
            arguments: arguments.into(),
            status: None,
        })
    }

    fn response(output: Vec<OutputItem>) -> Response {
        Response {
            id: "resp_1".into(),
            status: ResponseStatus::Completed,
            output,
            ..Default::default()
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let add = FnTool::function(
            "add",
            "Add",
            ToolParameters::object()
                .integer("a", "a", true)
                .integer("b", "b", true)
                .build(),
            |args| async move { Ok(json!({"result": args.get_i64("a")? + args.get_i64("b")?})) },
        );
        let boom = FnTool::function("boom", "Fails", ToolParameters::empty(), |_| async {
            Err(RondoError::HandlerExecution {
                tool_name: "boom".into(),
                message: "exploded".into(),
            })
        });
        let forger = FnTool::new(
            ToolDefinition::function("forger", "Answers the wrong call", ToolParameters::empty()),
            |_invocation| async move {
                let other = ToolInvocation::from_item(call("zzz", "forger", "{}"))?;
                Ok(other.text("forged"))
            },
        );
        Arc::new(
            ToolRegistry::new()
                .with(add)
                .unwrap()
                .with(boom)
                .unwrap()
                .with(forger)
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn outputs_follow_item_order_and_fold_failures() {
        let dispatcher = Dispatcher::new(registry());
        let response = response(vec![
            call("c1", "add", r#"{"a":2,"b":3}"#),
            call("c2", "boom", "{}"),
            call("c3", "add", "{\"a\":"),
            call("c4", "forger", "{}"),
            call("c5", "missing", "{}"),
        ]);
        let notices = Mutex::new(Vec::new());
        let report = dispatcher
            .dispatch(
                &response,
                &HashSet::new(),
                &CancellationToken::new(),
                &|notice| notices.lock().unwrap().push(notice),
            )
            .await
            .unwrap();

        let ids: Vec<&str> = report.outputs.iter().map(ToolOutput::call_id).collect();
        assert_eq!(ids, ["c1", "c2", "c3", "c4"]);
        assert_eq!(report.outputs[0].payload().as_text(), Some("{\"result\":5}"));
        assert!(report.outputs[1].is_failed());
        assert!(report.outputs[1].payload().as_text().unwrap().contains("exploded"));
        assert!(report.outputs[2].is_failed());
        assert!(report.outputs[3].is_failed());
        assert_eq!(report.unhandled.len(), 1);
        assert_eq!(report.unhandled[0].call_id(), "c5");
        assert_eq!(notices.lock().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn answered_calls_are_skipped() {
        let dispatcher = Dispatcher::new(registry());
        let response = response(vec![call("c1", "add", r#"{"a":1,"b":1}"#)]);
        let answered = HashSet::from(["c1".to_string()]);
        let report = dispatcher
            .dispatch(&response, &answered, &CancellationToken::new(), &|_| {})
            .await
            .unwrap();
        assert!(report.outputs.is_empty());
        assert!(pending_calls(&response, &answered).is_empty());
    }

    #[tokio::test]
    async fn cancellation_abandons_running_handlers() {
        let slow = FnTool::function("slow", "Sleeps", ToolParameters::empty(), |_| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(json!("late"))
        });
        let dispatcher = Dispatcher::new(Arc::new(ToolRegistry::new().with(slow).unwrap()));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let err = dispatcher
            .dispatch(
                &response(vec![call("c1", "slow", "{}")]),
                &HashSet::new(),
                &cancel,
                &|_| {},
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RondoError::Cancelled));
    }

    #[tokio::test]
    async fn tool_timeout_fails_the_call() {
        let slow = FnTool::function("slow", "Sleeps", ToolParameters::empty(), |_| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(json!("late"))
        });
        let dispatcher = Dispatcher::new(Arc::new(ToolRegistry::new().with(slow).unwrap()))
            .with_tool_timeout(Some(Duration::from_millis(20)));
        let report = dispatcher
            .dispatch(
                &response(vec![call("c1", "slow", "{}")]),
                &HashSet::new(),
                &CancellationToken::new(),
                &|_| {},
            )
            .await
            .unwrap();
        assert!(report.outputs[0].is_failed());
        assert!(report.outputs[0].payload().as_text().unwrap().contains("Timeout"));
    }
}
