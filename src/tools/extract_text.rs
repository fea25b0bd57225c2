//! Read visible text

use super::{BrowserTool, OptionalSelectorArgs, ToolName};
use crate::session::{ActionResult, BrowserSession, EngineError};

#[derive(Clone)]
pub struct ExtractTextTool;

impl BrowserTool for ExtractTextTool {
    type Args = OptionalSelectorArgs;

    fn name() -> ToolName {
        ToolName::ExtractText
    }

    fn description() -> &'static str {
        "Extract visible text from an element, or from the whole page when no selector is given."
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
        session.extract_text(selector).await
    }
}
