//! Collect link targets

use super::{BrowserTool, OptionalSelectorArgs, ToolName};
use crate::session::{ActionResult, BrowserSession, EngineError};

#[derive(Clone)]
pub struct ExtractLinksTool;

impl BrowserTool for ExtractLinksTool {
    type Args = OptionalSelectorArgs;

    fn name() -> ToolName {
        ToolName::ExtractLinks
    }

    fn description() -> &'static str {
        "List the absolute URLs of links on the page, de-duplicated. \
         Optionally restrict to links matching a CSS selector (default: a[href])."
    }

    fn read_only() -> bool {
        true
    }

    async fn execute(
        &self,
        session: &BrowserSession,
        args: OptionalSelectorArgs,
    ) -> Result<ActionResult, EngineError> {
        let selector = args.selector.as_deref().map(str::trim).filter(|s| !s.is_empty());
        session.extract_links(selector).await
    }
}
