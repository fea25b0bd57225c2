//! Orchestrator: task routing, the tool-call loop and run bookkeeping

mod guard;
pub mod model;
pub mod openai;
mod orchestrator;
pub mod policy;
mod registry;
mod router;
mod runner;
mod session;
pub mod task;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::discovery::Candidate;
use crate::tools::ToolName;

pub use model::{ChatMessage, ChatModel, ModelError, ModelSettings, ModelTurn, ToolCall};
pub use openai::OpenAiChatModel;
pub use orchestrator::{
    Mode, Orchestrator, OrchestratorSettings, PreparedTask, RunFailure, RunResult,
};
pub use policy::{Policy, PolicyKind};
pub use registry::{TaskInfo, TaskRegistry};
pub use router::route;
pub use session::{TaskSession, TaskSnapshot};
pub use task::{FieldValue, TaskIntent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRole {
    User,
    Assistant,
    Tool,
    /// The orchestrator refused or cut short a model request
    Guard,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed,
    Rejected,
}

/// One transcript entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptStep {
    pub index: usize,
    pub role: StepRole,
    /// Name of the policy that was active
    pub policy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<ToolName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    pub status: StepStatus,
    pub timestamp: DateTime<Utc>,
}

/// Append-only record of a run, returned as `history`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    steps: Vec<TranscriptStep>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(
        &mut self,
        role: StepRole,
        policy: PolicyKind,
        tool_name: Option<ToolName>,
        arguments: Option<Value>,
        output: Option<Value>,
        status: StepStatus,
    ) {
        self.steps.push(TranscriptStep {
            index: self.steps.len(),
            role,
            policy: policy.name().to_string(),
            tool_name,
            arguments,
            output,
            status,
            timestamp: Utc::now(),
        });
    }

    pub fn steps(&self) -> &[TranscriptStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Tool steps that actually ran, in order
    pub fn tool_calls(&self) -> impl Iterator<Item = &TranscriptStep> {
        self.steps
            .iter()
            .filter(|s| s.role == StepRole::Tool && s.tool_name.is_some())
    }

    /// Names of the tools that ran, for quick assertions and logs
    pub fn tool_names(&self) -> Vec<ToolName> {
        self.tool_calls().filter_map(|s| s.tool_name).collect()
    }
}

/// A form the run could not choose between
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSummary {
    pub selector: String,
    pub strategy: String,
    pub score: f64,
    pub fields: Vec<String>,
    pub required_fields: Vec<String>,
}

impl From<&Candidate> for CandidateSummary {
    fn from(candidate: &Candidate) -> Self {
        Self {
            selector: candidate.selector.clone(),
            strategy: candidate.matched_strategy.as_str().to_string(),
            score: candidate.score,
            fields: candidate
                .fields
                .iter()
                .map(|f| f.display_name().to_string())
                .collect(),
            required_fields: candidate
                .fields
                .iter()
                .filter(|f| f.required)
                .map(|f| f.display_name().to_string())
                .collect(),
        }
    }
}

/// Terminal result of a successful run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum FinalOutput {
    Completed {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        screenshot_url: Option<String>,
    },
    /// Stopped before filling because the task lacks values for required fields
    MissingRequiredFields {
        message: String,
        url: String,
        form_selector: String,
        missing_fields: Vec<String>,
    },
    /// Several forms matched equally well
    AmbiguousTarget {
        message: String,
        url: String,
        candidates: Vec<CandidateSummary>,
    },
}

impl FinalOutput {
    pub fn message(&self) -> &str {
        match self {
            FinalOutput::Completed { message, .. }
            | FinalOutput::MissingRequiredFields { message, .. }
            | FinalOutput::AmbiguousTarget { message, .. } => message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transcript_indexes_and_shape() {
        let mut transcript = Transcript::new();
        transcript.push(
            StepRole::User,
            PolicyKind::Gateway,
            None,
            None,
            Some(json!("open example.com")),
            StepStatus::Completed,
        );
        transcript.push(
            StepRole::Tool,
            PolicyKind::Navigation,
            Some(ToolName::NavigateToUrl),
            Some(json!({ "url": "example.com" })),
            Some(json!({ "success": true })),
            StepStatus::Completed,
        );

        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.tool_names(), vec![ToolName::NavigateToUrl]);

        let wire = serde_json::to_value(&transcript).unwrap();
        assert_eq!(wire[1]["index"], 1);
        assert_eq!(wire[1]["toolName"], "navigate_to_url");
        assert_eq!(wire[1]["policy"], "Browser Navigation Agent");
        assert!(wire[0].get("toolName").is_none());
    }

    #[test]
    fn test_final_output_is_tagged() {
        let output = FinalOutput::MissingRequiredFields {
            message: "missing".into(),
            url: "https://example.com/contact".into(),
            form_selector: "#contact-form".into(),
            missing_fields: vec!["message".into()],
        };
        let wire = serde_json::to_value(&output).unwrap();
        assert_eq!(wire["kind"], "missing_required_fields");
        assert_eq!(wire["formSelector"], "#contact-form");
        assert_eq!(wire["missingFields"], json!(["message"]));
    }
}
