//! Choose an option in a `<select>`

use schemars::JsonSchema;
use serde::Deserialize;

use super::{BrowserTool, ToolName, require_selector};
use crate::session::{ActionResult, BrowserSession, EngineError};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SelectOptionArgs {
    /// CSS selector of the select element
    pub selector: String,
    /// Option value or visible label
    pub value: String,
}

#[derive(Clone)]
pub struct SelectOptionTool;

impl BrowserTool for SelectOptionTool {
    type Args = SelectOptionArgs;

    fn name() -> ToolName {
        ToolName::SelectOption
    }

    fn description() -> &'static str {
        "Select an option in a dropdown by its value or visible label."
    }

    async fn execute(
        &self,
        session: &BrowserSession,
        args: SelectOptionArgs,
    ) -> Result<ActionResult, EngineError> {
        match require_selector(&args.selector) {
            Ok(selector) => session.select_option(selector, &args.value).await,
            Err(rejected) => Ok(rejected),
        }
    }
}
