//! Find the contact-like form on the current page

use super::{BrowserTool, OptionalSelectorArgs, ToolName};
use crate::discovery::DiscoveryIntent;
use crate::session::{ActionResult, BrowserSession, EngineError};

#[derive(Clone)]
pub struct DiscoverTargetFormTool;

impl BrowserTool for DiscoverTargetFormTool {
    type Args = OptionalSelectorArgs;

    fn name() -> ToolName {
        ToolName::DiscoverTargetForm
    }

    fn description() -> &'static str {
        "Locate the contact-like form on the page. Tries the given selector and well-known ids, \
         then form actions, field makeup, nearby headings and submit buttons. Returns the chosen \
         selector, the strategy that matched, its fields and submit selectors; or the list of \
         tied candidates when the choice is ambiguous."
    }

    fn read_only() -> bool {
        true
    }

    async fn execute(
        &self,
        session: &BrowserSession,
        args: OptionalSelectorArgs,
    ) -> Result<ActionResult, EngineError> {
        let mut intent = DiscoveryIntent::contact_form();
        if let Some(selector) = args.selector.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            intent = intent.with_selector(selector);
        }
        session.discover_target_form(&intent).await
    }
}
