//! Scroll the window

use schemars::JsonSchema;
use serde::Deserialize;

use super::{BrowserTool, ToolName};
use crate::session::{ActionResult, BrowserSession, EngineError};

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ScrollPageArgs {
    /// Horizontal pixels, negative scrolls left
    #[serde(default)]
    pub x: i64,
    /// Vertical pixels, negative scrolls up
    #[serde(default)]
    pub y: i64,
}

#[derive(Clone)]
pub struct ScrollPageTool;

impl BrowserTool for ScrollPageTool {
    type Args = ScrollPageArgs;

    fn name() -> ToolName {
        ToolName::ScrollPage
    }

    fn description() -> &'static str {
        "Scroll the page by a pixel offset.\n\n\
         Example: scroll_page({\"y\": 800}) scrolls down 800px"
    }

    async fn execute(
        &self,
        session: &BrowserSession,
        args: ScrollPageArgs,
    ) -> Result<ActionResult, EngineError> {
        session.scroll(args.x, args.y).await
    }
}
