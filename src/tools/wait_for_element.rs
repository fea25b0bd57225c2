//! Block until an element is attached

use schemars::JsonSchema;
use serde::Deserialize;
use std::time::Duration;

use super::{BrowserTool, ToolName, require_selector};
use crate::session::{ActionResult, BrowserSession, EngineError};
use crate::utils::constants::DEFAULT_WAIT_TIMEOUT_MS;
use crate::utils::validate_interaction_timeout;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct WaitForElementArgs {
    /// CSS selector to wait for
    pub selector: String,
    /// Upper bound in milliseconds (default 20000, max 30000)
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Clone)]
pub struct WaitForElementTool;

impl BrowserTool for WaitForElementTool {
    type Args = WaitForElementArgs;

    fn name() -> ToolName {
        ToolName::WaitForElement
    }

    fn description() -> &'static str {
        "Wait until an element matching the selector appears on the page. \
         Use after clicks that load content dynamically."
    }

    fn read_only() -> bool {
        true
    }

    async fn execute(
        &self,
        session: &BrowserSession,
        args: WaitForElementArgs,
    ) -> Result<ActionResult, EngineError> {
        let selector = match require_selector(&args.selector) {
            Ok(selector) => selector,
            Err(rejected) => return Ok(rejected),
        };
        let timeout: Duration =
            match validate_interaction_timeout(args.timeout_ms, DEFAULT_WAIT_TIMEOUT_MS) {
                Ok(timeout) => timeout,
                Err(e) => return Ok(ActionResult::fail("Invalid wait timeout", e.to_string())),
            };
        session.wait_for_element(selector, Some(timeout)).await
    }
}
