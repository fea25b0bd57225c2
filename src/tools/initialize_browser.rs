//! Launch the session's browser

use serde_json::json;

use super::{BrowserTool, NoArgs, ToolName};
use crate::browser::LaunchOptions;
use crate::session::{ActionResult, BrowserSession, EngineError, SessionStatus};

#[derive(Clone)]
pub struct InitializeBrowserTool {
    launch: LaunchOptions,
}

impl InitializeBrowserTool {
    pub fn new(launch: LaunchOptions) -> Self {
        Self { launch }
    }
}

impl BrowserTool for InitializeBrowserTool {
    type Args = NoArgs;

    fn name() -> ToolName {
        ToolName::InitializeBrowser
    }

    fn description() -> &'static str {
        "Start the browser for this session. Call once before any other browser tool; \
         calling it again on a running browser is a no-op."
    }

    async fn execute(
        &self,
        session: &BrowserSession,
        _args: NoArgs,
    ) -> Result<ActionResult, EngineError> {
        if session.status() == SessionStatus::Ready {
            return Ok(ActionResult::ok("Browser already initialized"));
        }
        session.initialize(&self.launch).await?;
        Ok(ActionResult::ok_with(
            "Browser initialized",
            json!({
                "headless": self.launch.headless,
                "viewport": self.launch.viewport,
            }),
        ))
    }
}
