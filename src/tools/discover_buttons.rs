//! List clickable controls

use super::{BrowserTool, NoArgs, ToolName};
use crate::session::{ActionResult, BrowserSession, EngineError};

#[derive(Clone)]
pub struct DiscoverButtonsTool;

impl BrowserTool for DiscoverButtonsTool {
    type Args = NoArgs;

    fn name() -> ToolName {
        ToolName::DiscoverButtons
    }

    fn description() -> &'static str {
        "List buttons and submit inputs on the page with their text, type and selector."
    }

    fn read_only() -> bool {
        true
    }

    async fn execute(
        &self,
        session: &BrowserSession,
        _args: NoArgs,
    ) -> Result<ActionResult, EngineError> {
        session.discover_buttons().await
    }
}
