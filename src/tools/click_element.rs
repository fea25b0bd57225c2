//! Click an element by CSS selector

use schemars::JsonSchema;
use serde::Deserialize;

use super::{BrowserTool, ToolName, require_selector};
use crate::session::{ActionResult, BrowserSession, EngineError};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ClickElementArgs {
    /// CSS selector of the element to click
    pub selector: String,
}

#[derive(Clone)]
pub struct ClickElementTool;

impl BrowserTool for ClickElementTool {
    type Args = ClickElementArgs;

    fn name() -> ToolName {
        ToolName::ClickElement
    }

    fn description() -> &'static str {
        "Click an element using a CSS selector. Waits for the element, scrolls it into view, \
         then clicks its centre.\n\n\
         Example: click_element({\"selector\": \"a.next\"})"
    }

    async fn execute(
        &self,
        session: &BrowserSession,
        args: ClickElementArgs,
    ) -> Result<ActionResult, EngineError> {
        match require_selector(&args.selector) {
            Ok(selector) => session.click(selector).await,
            Err(rejected) => Ok(rejected),
        }
    }
}
