//! Chat-model seam used by the tool-call loop

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::tools::ToolSpec;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Model request failed: {0}")]
    Http(String),

    #[error("Model API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Unreadable model response: {0}")]
    Malformed(String),

    #[error("Model call timed out after {0}s")]
    Timeout(u64),

    #[error("Model returned no choices")]
    Empty,
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatMessage {
    User(String),
    Assistant {
        content: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

/// One model reply: more work, or the answer
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    ToolCalls {
        content: Option<String>,
        calls: Vec<ToolCall>,
    },
    Final(String),
}

/// Per-request sampling overrides; `None` keeps the client default
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelSettings {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub instructions: &'a str,
    pub messages: &'a [ChatMessage],
    pub tools: &'a [ToolSpec],
    pub settings: &'a ModelSettings,
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelTurn, ModelError>;
}
