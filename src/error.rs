//! Error taxonomy surfaced to callers of the automation service
//!
//! Expected per-action failures never reach this layer; they travel inside
//! `ActionResult::success == false`. What lands here aborts a task.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Stable codes carried by [`AutomationFailure::Automation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AutomationError,
    BrowserLaunchFailed,
    DriverCrashed,
    StepLimitExceeded,
    ModelError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AutomationError => "AUTOMATION_ERROR",
            ErrorCode::BrowserLaunchFailed => "BROWSER_LAUNCH_FAILED",
            ErrorCode::DriverCrashed => "DRIVER_CRASHED",
            ErrorCode::StepLimitExceeded => "STEP_LIMIT_EXCEEDED",
            ErrorCode::ModelError => "MODEL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single rejected input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

/// Malformed input, rejected before any browser or model work begins
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            issues: Vec::new(),
        }
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            message: message.clone(),
            issues: vec![FieldIssue {
                field: field.into(),
                message,
            }],
        }
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(FieldIssue {
            field: field.into(),
            message: message.into(),
        });
    }
}

/// Top-level failure of an automation task
#[derive(Error, Debug, Clone)]
pub enum AutomationFailure {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Session error ({session_id}): {message}")]
    Session { session_id: String, message: String },

    #[error("Automation error [{code}]: {message}")]
    Automation { code: ErrorCode, message: String },

    /// Engine used out of lifecycle order. Integration bug, fails loudly.
    #[error("Structural error: {0}")]
    Structural(String),
}

/// Discriminant used in the outbound error body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Session,
    Automation,
    Structural,
}

impl AutomationFailure {
    pub fn automation(code: ErrorCode, message: impl Into<String>) -> Self {
        AutomationFailure::Automation {
            code,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AutomationFailure::Validation(_) => ErrorKind::Validation,
            AutomationFailure::Session { .. } => ErrorKind::Session,
            AutomationFailure::Automation { .. } => ErrorKind::Automation,
            AutomationFailure::Structural(_) => ErrorKind::Structural,
        }
    }

    /// HTTP status the routing layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            AutomationFailure::Validation(_) => 400,
            AutomationFailure::Session { .. } => 404,
            AutomationFailure::Automation { .. } | AutomationFailure::Structural(_) => 500,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        let mut response = ErrorResponse {
            kind: self.kind(),
            message: self.to_string(),
            code: None,
            session_id: None,
            details: None,
        };
        match self {
            AutomationFailure::Validation(err) => {
                response.message = err.message.clone();
                response.details = serde_json::to_value(&err.issues).ok();
            }
            AutomationFailure::Session {
                session_id,
                message,
            } => {
                response.message = message.clone();
                response.code = Some("SESSION_ERROR".to_string());
                response.session_id = Some(session_id.clone());
            }
            AutomationFailure::Automation { code, message } => {
                response.message = message.clone();
                response.code = Some(code.as_str().to_string());
            }
            AutomationFailure::Structural(message) => {
                response.message = message.clone();
            }
        }
        response
    }
}

/// Outbound error body: `{kind, message, code?, sessionId?, details?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_per_kind() {
        assert_eq!(
            AutomationFailure::from(ValidationError::new("bad")).status_code(),
            400
        );
        let session = AutomationFailure::Session {
            session_id: "abc".into(),
            message: "gone".into(),
        };
        assert_eq!(session.status_code(), 404);
        assert_eq!(
            AutomationFailure::automation(ErrorCode::DriverCrashed, "boom").status_code(),
            500
        );
    }

    #[test]
    fn test_session_error_response_references_session() {
        let failure = AutomationFailure::Session {
            session_id: "s-1".into(),
            message: "Session s-1 is closed".into(),
        };
        let body = serde_json::to_value(failure.to_response()).unwrap();
        assert_eq!(body["kind"], "session");
        assert_eq!(body["sessionId"], "s-1");
        assert_eq!(body["code"], "SESSION_ERROR");
    }

    #[test]
    fn test_automation_error_carries_stable_code() {
        let failure = AutomationFailure::automation(ErrorCode::StepLimitExceeded, "too many steps");
        let response = failure.to_response();
        assert_eq!(response.code.as_deref(), Some("STEP_LIMIT_EXCEEDED"));
        assert_eq!(response.kind, ErrorKind::Automation);
        assert!(response.session_id.is_none());
    }

    #[test]
    fn test_validation_details_list_issues() {
        let mut err = ValidationError::new("Invalid request data");
        err.push("prompt", "Prompt must be at least 10 characters long");
        let body = serde_json::to_value(AutomationFailure::from(err).to_response()).unwrap();
        assert_eq!(body["details"][0]["field"], "prompt");
    }
}
