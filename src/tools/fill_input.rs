//! Type a value into an input or textarea

use schemars::JsonSchema;
use serde::Deserialize;

use super::{BrowserTool, ToolName, require_selector};
use crate::session::{ActionResult, BrowserSession, EngineError};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FillInputArgs {
    /// CSS selector of the field
    pub selector: String,
    /// Text to put in the field; replaces any existing value
    pub value: String,
}

#[derive(Clone)]
pub struct FillInputTool;

impl BrowserTool for FillInputTool {
    type Args = FillInputArgs;

    fn name() -> ToolName {
        ToolName::FillInput
    }

    fn description() -> &'static str {
        "Fill a form field with a value, replacing its current content.\n\n\
         Example: fill_input({\"selector\": \"#email\", \"value\": \"user@example.com\"})"
    }

    async fn execute(
        &self,
        session: &BrowserSession,
        args: FillInputArgs,
    ) -> Result<ActionResult, EngineError> {
        match require_selector(&args.selector) {
            Ok(selector) => session.fill(selector, &args.value).await,
            Err(rejected) => Ok(rejected),
        }
    }
}
