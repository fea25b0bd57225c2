//! Tear the session down

use super::{BrowserTool, NoArgs, ToolName};
use crate::session::{ActionResult, BrowserSession, EngineError};

#[derive(Clone)]
pub struct CloseBrowserTool;

impl BrowserTool for CloseBrowserTool {
    type Args = NoArgs;

    fn name() -> ToolName {
        ToolName::CloseBrowser
    }

    fn description() -> &'static str {
        "Close the browser. Call when the task is finished or cannot continue."
    }

    async fn execute(
        &self,
        session: &BrowserSession,
        _args: NoArgs,
    ) -> Result<ActionResult, EngineError> {
        session.close().await;
        Ok(ActionResult::ok("Browser closed"))
    }
}
