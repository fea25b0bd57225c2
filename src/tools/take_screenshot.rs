//! Capture and upload a screenshot

use super::{BrowserTool, NoArgs, ToolName};
use crate::session::{ActionResult, BrowserSession, EngineError};

#[derive(Clone)]
pub struct TakeScreenshotTool;

impl BrowserTool for TakeScreenshotTool {
    type Args = NoArgs;

    fn name() -> ToolName {
        ToolName::TakeScreenshot
    }

    fn description() -> &'static str {
        "Capture the first form on the page (or the full page when there is none) and return \
         the URL of the uploaded image. Take one after every navigation or interaction."
    }

    fn read_only() -> bool {
        true
    }

    async fn execute(
        &self,
        session: &BrowserSession,
        _args: NoArgs,
    ) -> Result<ActionResult, EngineError> {
        session.screenshot().await
    }
}
