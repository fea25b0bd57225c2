//! Inbound task request and its validation

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Shortest prompt worth sending to a browser
pub const MIN_PROMPT_CHARS: usize = 10;

/// `{prompt, config?}` as posted by a caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<RequestConfig>,
}

/// Per-request overrides merged onto the loaded [`crate::Config`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headless: Option<bool>,
    /// Navigation timeout in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl TaskRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            config: None,
        }
    }

    pub fn with_config(mut self, config: RequestConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Collects every problem rather than stopping at the first
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut error = ValidationError::new("Invalid task request");

        if self.prompt.trim().chars().count() < MIN_PROMPT_CHARS {
            error.push(
                "prompt",
                format!("Prompt must be at least {MIN_PROMPT_CHARS} characters"),
            );
        }

        if let Some(config) = &self.config {
            if let Some(model) = &config.model {
                if model.trim().is_empty() {
                    error.push("config.model", "Model name cannot be empty");
                }
            }
            if let Some(temperature) = config.temperature {
                if !(0.0..=2.0).contains(&temperature) {
                    error.push("config.temperature", "Temperature must be between 0 and 2");
                }
            }
            if config.max_tokens == Some(0) {
                error.push("config.maxTokens", "maxTokens must be positive");
            }
            if config.timeout == Some(0) {
                error.push("config.timeout", "Timeout must be positive");
            }
        }

        if error.issues.is_empty() {
            Ok(())
        } else {
            if let [only] = error.issues.as_slice() {
                error.message = only.message.clone();
            }
            Err(error)
        }
    }
}
