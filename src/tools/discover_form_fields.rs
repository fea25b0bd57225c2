//! List every input-like element on the page

use super::{BrowserTool, NoArgs, ToolName};
use crate::session::{ActionResult, BrowserSession, EngineError};

#[derive(Clone)]
pub struct DiscoverFormFieldsTool;

impl BrowserTool for DiscoverFormFieldsTool {
    type Args = NoArgs;

    fn name() -> ToolName {
        ToolName::DiscoverFormFields
    }

    fn description() -> &'static str {
        "List all form fields on the page with tag, type, name, id, placeholder, label, \
         required flag and a usable selector (id first, then name)."
    }

    fn read_only() -> bool {
        true
    }

    async fn execute(
        &self,
        session: &BrowserSession,
        _args: NoArgs,
    ) -> Result<ActionResult, EngineError> {
        session.discover_form_fields().await
    }
}
