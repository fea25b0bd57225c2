//! Current URL and title

use serde_json::json;

use super::{BrowserTool, NoArgs, ToolName};
use crate::session::{ActionResult, BrowserSession, EngineError};

#[derive(Clone)]
pub struct GetPageInfoTool;

impl BrowserTool for GetPageInfoTool {
    type Args = NoArgs;

    fn name() -> ToolName {
        ToolName::GetPageInfo
    }

    fn description() -> &'static str {
        "Return the current page URL and title."
    }

    fn read_only() -> bool {
        true
    }

    async fn execute(
        &self,
        session: &BrowserSession,
        _args: NoArgs,
    ) -> Result<ActionResult, EngineError> {
        let info = session.page_info().await?;
        Ok(ActionResult::ok_with(
            format!("Current page: {} ({})", info.title, info.url),
            json!({ "url": info.url, "title": info.title }),
        ))
    }
}
