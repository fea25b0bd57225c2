//! Checks every model tool request against the active policy and the task
//!
//! The model is told the rules; the guard enforces the ones that can be
//! checked mechanically: tool subset, no unrequested submission, no partial
//! fill when required values are missing, stop on an ambiguous target.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::policy::Policy;
use super::task::TaskIntent;
use super::{CandidateSummary, FinalOutput, ToolCall};
use crate::discovery::{ButtonDescriptor, Candidate, FieldDescriptor};
use crate::session::ActionResult;
use crate::tools::ToolName;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Verdict {
    Allow { tool: ToolName, arguments: Value },
    /// Refuse this call and tell the model why; the run continues
    Reject(String),
    /// End the run with this output
    Stop(FinalOutput),
}

#[derive(Debug, Clone)]
struct TargetForm {
    selector: String,
    url: String,
    fields: Vec<FieldDescriptor>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FoundReport {
    #[serde(default)]
    url: String,
    selector: String,
    #[serde(default)]
    fields: Vec<FieldDescriptor>,
    #[serde(default)]
    submit_selectors: Vec<String>,
}

#[derive(Deserialize)]
struct AmbiguousReport {
    #[serde(default)]
    url: String,
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct ButtonsReport {
    #[serde(default)]
    buttons: Vec<ButtonDescriptor>,
}

/// Per-run state; lives across handoffs
#[derive(Debug)]
pub(crate) struct TaskGuard {
    intent: TaskIntent,
    target: Option<TargetForm>,
    discovery_failed: bool,
    submit_selectors: Vec<String>,
}

impl TaskGuard {
    pub fn new(intent: TaskIntent) -> Self {
        Self {
            intent,
            target: None,
            discovery_failed: false,
            submit_selectors: Vec::new(),
        }
    }

    pub fn review(&mut self, policy: &Policy, call: &ToolCall) -> Verdict {
        let Some(tool) = ToolName::from_name(&call.name) else {
            return Verdict::Reject(format!("Unknown tool {}", call.name));
        };
        if !policy.allows(tool) {
            return Verdict::Reject(format!(
                "Tool {tool} is not available to the {}",
                policy.name()
            ));
        }

        let mut arguments = match &call.arguments {
            Value::Null => json!({}),
            other => other.clone(),
        };

        match tool {
            ToolName::DiscoverTargetForm => {
                if let (Some(hint), Some(map)) = (&self.intent.selector_hint, arguments.as_object_mut()) {
                    if !map.contains_key("selector") {
                        map.insert("selector".to_string(), Value::String(hint.clone()));
                    }
                }
            }
            ToolName::FillInput | ToolName::SelectOption => {
                if self.target.is_none() && self.discovery_failed {
                    return Verdict::Reject(
                        "No matching form was found on this page, so there is nothing to fill"
                            .to_string(),
                    );
                }
                if let Some(stop) = self.missing_fields_stop() {
                    return Verdict::Stop(stop);
                }
            }
            ToolName::ClickElement => {
                let selector = arguments
                    .get("selector")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if self.is_submit_selector(selector) {
                    if !self.intent.submission_requested {
                        warn!(selector, "Refusing unrequested form submission");
                        return Verdict::Reject(
                            "Submission was not requested by the task; leave the form unsubmitted"
                                .to_string(),
                        );
                    }
                    if let Some(stop) = self.missing_fields_stop() {
                        return Verdict::Stop(stop);
                    }
                }
            }
            _ => {}
        }

        Verdict::Allow { tool, arguments }
    }

    /// Learn from a tool result; may end the run
    pub fn observe(&mut self, tool: ToolName, result: &ActionResult) -> Option<FinalOutput> {
        let data = result.data.as_ref()?;
        match tool {
            ToolName::DiscoverTargetForm => match data.get("outcome").and_then(Value::as_str)? {
                "found" => {
                    let report: FoundReport = serde_json::from_value(data.clone()).ok()?;
                    info!(selector = %report.selector, "Target form chosen");
                    self.discovery_failed = false;
                    self.add_submit_selectors(report.submit_selectors);
                    self.target = Some(TargetForm {
                        selector: report.selector,
                        url: report.url,
                        fields: report.fields,
                    });
                    // Only a task that supplies values is about filling the form
                    if self.intent.has_form_values() {
                        self.missing_fields_stop()
                    } else {
                        None
                    }
                }
                "ambiguous" => {
                    let report: AmbiguousReport = serde_json::from_value(data.clone()).ok()?;
                    let candidates: Vec<CandidateSummary> =
                        report.candidates.iter().map(CandidateSummary::from).collect();
                    let selectors: Vec<&str> =
                        candidates.iter().map(|c| c.selector.as_str()).collect();
                    Some(FinalOutput::AmbiguousTarget {
                        message: format!(
                            "{} forms on {} match equally well ({}); name the one to use",
                            candidates.len(),
                            report.url,
                            selectors.join(", ")
                        ),
                        url: report.url,
                        candidates,
                    })
                }
                _ => {
                    self.discovery_failed = true;
                    None
                }
            },
            ToolName::DiscoverButtons => {
                let report: ButtonsReport = serde_json::from_value(data.clone()).ok()?;
                let submits = report
                    .buttons
                    .into_iter()
                    .filter(|b| b.is_submit() && !b.selector.is_empty())
                    .map(|b| b.selector)
                    .collect();
                self.add_submit_selectors(submits);
                None
            }
            _ => None,
        }
    }

    /// The page reported that `selector` is a submit control
    pub fn note_submit_control(&mut self, selector: &str) {
        self.add_submit_selectors(vec![selector.trim().to_string()]);
    }

    fn add_submit_selectors(&mut self, selectors: Vec<String>) {
        for selector in selectors {
            if !self.submit_selectors.contains(&selector) {
                self.submit_selectors.push(selector);
            }
        }
    }

    fn is_submit_selector(&self, selector: &str) -> bool {
        let selector = selector.trim();
        let lowered = selector.to_lowercase();
        if self.submit_selectors.iter().any(|s| s == selector) || lowered.contains("submit") {
            return true;
        }

        // A button addressed inside a form submits it unless typed otherwise
        let parts: Vec<&str> = lowered
            .split(|c: char| c.is_whitespace() || c == '>')
            .filter(|p| !p.is_empty())
            .collect();
        let Some((last, scope)) = parts.split_last() else {
            return false;
        };
        let in_target = self
            .target
            .as_ref()
            .is_some_and(|t| lowered.starts_with(&t.selector.to_lowercase()) && lowered.len() > t.selector.len());
        let in_form = in_target || scope.iter().any(|p| p.starts_with("form"));
        let plain_button = last.starts_with("button")
            && !last.contains("type=\"button\"")
            && !last.contains("type=button")
            && !last.contains("reset");
        in_form && plain_button
    }

    fn missing_fields_stop(&self) -> Option<FinalOutput> {
        let target = self.target.as_ref()?;
        let missing: Vec<String> = target
            .fields
            .iter()
            .filter(|f| f.required && !self.intent.covers(f))
            .map(|f| f.display_name().to_string())
            .collect();
        if missing.is_empty() {
            return None;
        }
        warn!(form = %target.selector, missing = ?missing, "Required fields have no value");
        Some(FinalOutput::MissingRequiredFields {
            message: format!(
                "Stopped before filling {}: no value was given for required field(s) {}",
                target.selector,
                missing.join(", ")
            ),
            url: target.url.clone(),
            form_selector: target.selector.clone(),
            missing_fields: missing,
        })
    }
}
