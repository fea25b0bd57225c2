//! Uniform outcome of a single browser action

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{success, message, data?, error?}`
///
/// Built only through [`ActionResult::ok`], [`ActionResult::ok_with`] and
/// [`ActionResult::fail`], so a successful result never carries an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            error: None,
        }
    }

    pub fn ok_with(message: impl Into<String>, data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::ok(message)
        }
    }

    pub fn fail(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error: Some(error.into()),
        }
    }

    /// Attach structured context to a failure
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Field lookup on `data`, used by callers reacting to results
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.as_ref()?.get(key)?.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_never_carries_error() {
        let result = ActionResult::ok_with("done", json!({"url": "https://a.test"}));
        assert!(result.success && result.error.is_none());
        assert_eq!(result.data_str("url"), Some("https://a.test"));

        let wire = serde_json::to_value(ActionResult::ok("done")).unwrap();
        assert!(wire.get("error").is_none());
        assert!(wire.get("data").is_none());
    }

    #[test]
    fn test_failure_keeps_context() {
        let result = ActionResult::fail("Failed to click", "timeout")
            .with_data(json!({"selector": "#x"}));
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("timeout"));
        assert_eq!(result.data_str("selector"), Some("#x"));
    }
}
