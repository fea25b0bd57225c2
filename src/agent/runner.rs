//! The bounded tool-call loop shared by every policy

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::guard::{TaskGuard, Verdict};
use super::model::{ChatMessage, ChatModel, ModelRequest, ModelSettings, ModelTurn, ToolCall};
use super::policy::Policy;
use super::{FinalOutput, StepRole, StepStatus, Transcript};
use crate::error::{AutomationFailure, ErrorCode};
use crate::events::EventEmitter;
use crate::session::BrowserSession;
use crate::tools::{ToolName, ToolRegistry};

/// Model turns allowed for a whole run, handoffs included
#[derive(Debug, Clone, Copy)]
pub(crate) struct StepBudget {
    max: usize,
    used: usize,
}

impl StepBudget {
    pub fn new(max: usize) -> Self {
        Self { max, used: 0 }
    }

    fn take(&mut self) -> Result<(), AutomationFailure> {
        if self.used >= self.max {
            return Err(AutomationFailure::automation(
                ErrorCode::StepLimitExceeded,
                format!("Step limit of {} model turns reached before the task finished", self.max),
            ));
        }
        self.used += 1;
        Ok(())
    }

    pub fn used(&self) -> usize {
        self.used
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PolicyOutcome {
    /// The model answered in plain text
    Finished(String),
    /// The guard ended the run
    Stopped(FinalOutput),
}

/// Everything one run threads through its policies
pub(crate) struct PolicyRunner<'a> {
    pub session: &'a BrowserSession,
    pub tools: &'a ToolRegistry,
    pub model: &'a dyn ChatModel,
    pub settings: &'a ModelSettings,
    pub emitter: &'a EventEmitter,
    pub guard: &'a mut TaskGuard,
    pub transcript: &'a mut Transcript,
    pub budget: &'a mut StepBudget,
}

impl PolicyRunner<'_> {
    /// Drive `policy` from `input` until it answers, is stopped, or fails
    pub async fn run(&mut self, policy: &Policy, input: String) -> Result<PolicyOutcome, AutomationFailure> {
        let specs = self.tools.specs_for(&policy.allowed_tools);
        let mut messages = vec![ChatMessage::User(input)];
        info!(session_id = %self.session.id(), policy = %policy.kind, "Policy started");

        loop {
            self.budget.take()?;
            let turn = self
                .model
                .complete(ModelRequest {
                    instructions: policy.instructions,
                    messages: &messages,
                    tools: &specs,
                    settings: self.settings,
                })
                .await
                .map_err(|e| AutomationFailure::automation(ErrorCode::ModelError, e.to_string()))?;

            let (content, calls) = match turn {
                ModelTurn::Final(text) => {
                    self.transcript.push(
                        StepRole::Assistant,
                        policy.kind,
                        None,
                        None,
                        Some(Value::String(text.clone())),
                        StepStatus::Completed,
                    );
                    return Ok(PolicyOutcome::Finished(text));
                }
                ModelTurn::ToolCalls { content, calls } => (content, calls),
            };

            if let Some(text) = &content {
                self.transcript.push(
                    StepRole::Assistant,
                    policy.kind,
                    None,
                    None,
                    Some(Value::String(text.clone())),
                    StepStatus::Completed,
                );
            }
            messages.push(ChatMessage::Assistant {
                content,
                tool_calls: calls.clone(),
            });

            for call in calls {
                self.inspect_click_target(&call).await;
                match self.guard.review(policy, &call) {
                    Verdict::Allow { tool, arguments } => {
                        let (reply, stop) = self.invoke(policy, tool, arguments).await?;
                        messages.push(ChatMessage::Tool {
                            tool_call_id: call.id,
                            content: reply,
                        });
                        if let Some(stop) = stop {
                            return Ok(PolicyOutcome::Stopped(stop));
                        }
                    }
                    Verdict::Reject(reason) => {
                        warn!(tool = %call.name, %reason, "Tool call rejected");
                        self.transcript.push(
                            StepRole::Guard,
                            policy.kind,
                            None,
                            Some(json!({ "tool": call.name, "arguments": call.arguments })),
                            Some(Value::String(reason.clone())),
                            StepStatus::Rejected,
                        );
                        let body = json!({ "success": false, "message": reason, "error": "rejected" });
                        messages.push(ChatMessage::Tool {
                            tool_call_id: call.id,
                            content: body.to_string(),
                        });
                    }
                    Verdict::Stop(output) => {
                        info!(tool = %call.name, "Run stopped by guard");
                        self.transcript.push(
                            StepRole::Guard,
                            policy.kind,
                            None,
                            Some(json!({ "tool": call.name, "arguments": call.arguments })),
                            serde_json::to_value(&output).ok(),
                            StepStatus::Rejected,
                        );
                        return Ok(PolicyOutcome::Stopped(output));
                    }
                }
            }
        }
    }

    /// Ask the page whether a requested click would submit a form
    async fn inspect_click_target(&mut self, call: &ToolCall) {
        if ToolName::from_name(&call.name) != Some(ToolName::ClickElement) {
            return;
        }
        let Some(selector) = call.arguments.get("selector").and_then(Value::as_str) else {
            return;
        };
        match self.session.is_submit_control(selector).await {
            Ok(true) => self.guard.note_submit_control(selector),
            Ok(false) => {}
            Err(e) => debug!(selector, error = %e, "Click target not inspected"),
        }
    }

    /// Run one allowed tool; returns the reply for the model and a possible stop
    async fn invoke(
        &mut self,
        policy: &Policy,
        tool: ToolName,
        arguments: Value,
    ) -> Result<(String, Option<FinalOutput>), AutomationFailure> {
        debug!(session_id = %self.session.id(), tool = %tool, "Executing tool call");
        let result = match self.tools.call(tool, self.session, arguments.clone()).await {
            Ok(result) => result,
            Err(e) => {
                self.transcript.push(
                    StepRole::Tool,
                    policy.kind,
                    Some(tool),
                    Some(arguments),
                    Some(Value::String(e.to_string())),
                    StepStatus::Failed,
                );
                self.emitter
                    .error(format!("{tool} failed: {e}"), Some(json!({ "tool": tool })));
                return Err(e.into());
            }
        };

        let output = serde_json::to_value(&result).unwrap_or(Value::Null);
        let status = if result.success {
            StepStatus::Completed
        } else {
            StepStatus::Failed
        };
        self.transcript
            .push(StepRole::Tool, policy.kind, Some(tool), Some(arguments), Some(output.clone()), status);

        if result.success {
            self.emitter
                .success(result.message.clone(), Some(json!({ "tool": tool })));
            if tool == ToolName::TakeScreenshot {
                if let Some(url) = result.data_str("screenshotUrl") {
                    self.emitter.screenshot(url);
                }
            }
        } else {
            self.emitter.error(
                result.message.clone(),
                Some(json!({ "tool": tool, "error": result.error })),
            );
        }

        let stop = self.guard.observe(tool, &result);
        Ok((output.to_string(), stop))
    }
}
