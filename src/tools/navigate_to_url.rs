//! Load a URL in the session page

use schemars::JsonSchema;
use serde::Deserialize;

use super::{BrowserTool, ToolName};
use crate::session::{ActionResult, BrowserSession, EngineError};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct NavigateToUrlArgs {
    /// Absolute http(s) URL; a bare host gets https://
    pub url: String,
}

#[derive(Clone)]
pub struct NavigateToUrlTool;

impl BrowserTool for NavigateToUrlTool {
    type Args = NavigateToUrlArgs;

    fn name() -> ToolName {
        ToolName::NavigateToUrl
    }

    fn description() -> &'static str {
        "Navigate to a URL and wait for the page to load. Returns the final URL and page title.\n\n\
         Example: navigate_to_url({\"url\": \"https://example.com\"})"
    }

    async fn execute(
        &self,
        session: &BrowserSession,
        args: NavigateToUrlArgs,
    ) -> Result<ActionResult, EngineError> {
        if args.url.trim().is_empty() {
            return Ok(ActionResult::fail("URL cannot be empty", "invalid arguments: empty url"));
        }
        session.navigate(&args.url).await
    }
}
