//! Capability registry: every session action as a named tool with a JSON schema
//!
//! Tools are stateless wrappers; the session they act on is passed per call.
//! Malformed arguments are an expected failure (`success: false`), never a
//! panic or an engine error.

mod click_element;
mod close_browser;
mod discover_buttons;
mod discover_form_fields;
mod discover_target_form;
mod extract_links;
mod extract_text;
mod fill_input;
mod get_page_info;
mod initialize_browser;
mod navigate_to_url;
mod scroll_page;
mod select_option;
mod take_screenshot;
mod wait_for_element;

pub use click_element::ClickElementTool;
pub use close_browser::CloseBrowserTool;
pub use discover_buttons::DiscoverButtonsTool;
pub use discover_form_fields::DiscoverFormFieldsTool;
pub use discover_target_form::DiscoverTargetFormTool;
pub use extract_links::ExtractLinksTool;
pub use extract_text::ExtractTextTool;
pub use fill_input::FillInputTool;
pub use get_page_info::GetPageInfoTool;
pub use initialize_browser::InitializeBrowserTool;
pub use navigate_to_url::NavigateToUrlTool;
pub use scroll_page::ScrollPageTool;
pub use select_option::SelectOptionTool;
pub use take_screenshot::TakeScreenshotTool;
pub use wait_for_element::WaitForElementTool;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::future::Future;
use tracing::{debug, warn};

use crate::browser::LaunchOptions;
use crate::session::{ActionResult, BrowserSession, EngineError};

/// Stable tool identifiers, as the model sees them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    InitializeBrowser,
    NavigateToUrl,
    ClickElement,
    FillInput,
    ExtractText,
    WaitForElement,
    DiscoverFormFields,
    DiscoverButtons,
    DiscoverTargetForm,
    ScrollPage,
    SelectOption,
    ExtractLinks,
    TakeScreenshot,
    GetPageInfo,
    CloseBrowser,
}

impl ToolName {
    pub const ALL: [ToolName; 15] = [
        ToolName::InitializeBrowser,
        ToolName::NavigateToUrl,
        ToolName::ClickElement,
        ToolName::FillInput,
        ToolName::ExtractText,
        ToolName::WaitForElement,
        ToolName::DiscoverFormFields,
        ToolName::DiscoverButtons,
        ToolName::DiscoverTargetForm,
        ToolName::ScrollPage,
        ToolName::SelectOption,
        ToolName::ExtractLinks,
        ToolName::TakeScreenshot,
        ToolName::GetPageInfo,
        ToolName::CloseBrowser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::InitializeBrowser => "initialize_browser",
            ToolName::NavigateToUrl => "navigate_to_url",
            ToolName::ClickElement => "click_element",
            ToolName::FillInput => "fill_input",
            ToolName::ExtractText => "extract_text",
            ToolName::WaitForElement => "wait_for_element",
            ToolName::DiscoverFormFields => "discover_form_fields",
            ToolName::DiscoverButtons => "discover_buttons",
            ToolName::DiscoverTargetForm => "discover_target_form",
            ToolName::ScrollPage => "scroll_page",
            ToolName::SelectOption => "select_option",
            ToolName::ExtractLinks => "extract_links",
            ToolName::TakeScreenshot => "take_screenshot",
            ToolName::GetPageInfo => "get_page_info",
            ToolName::CloseBrowser => "close_browser",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One browser capability with typed arguments
pub trait BrowserTool: Send + Sync + 'static {
    type Args: DeserializeOwned + JsonSchema + Send;

    fn name() -> ToolName;

    fn description() -> &'static str;

    fn read_only() -> bool {
        false
    }

    fn execute(
        &self,
        session: &BrowserSession,
        args: Self::Args,
    ) -> impl Future<Output = Result<ActionResult, EngineError>> + Send;
}

/// For tools that take nothing
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct NoArgs {}

/// Optional selector scoping a read
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct OptionalSelectorArgs {
    /// CSS selector; omit for the whole page
    #[serde(default)]
    pub selector: Option<String>,
}

/// A selector argument that must not be blank
pub(crate) fn require_selector(selector: &str) -> Result<&str, ActionResult> {
    let trimmed = selector.trim();
    if trimmed.is_empty() {
        Err(ActionResult::fail(
            "Selector cannot be empty",
            "invalid arguments: empty selector",
        ))
    } else {
        Ok(trimmed)
    }
}

/// Name, description and JSON schema as advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: ToolName,
    pub description: &'static str,
    pub parameters: Value,
    pub read_only: bool,
}

impl ToolSpec {
    /// OpenAI-style `{"type":"function", ...}` entry
    pub fn to_function(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name.as_str(),
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

#[async_trait]
trait ErasedTool: Send + Sync {
    fn spec(&self) -> &ToolSpec;

    async fn call(&self, session: &BrowserSession, args: Value)
    -> Result<ActionResult, EngineError>;
}

struct Registered<T: BrowserTool> {
    tool: T,
    spec: ToolSpec,
}

#[async_trait]
impl<T: BrowserTool> ErasedTool for Registered<T> {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(
        &self,
        session: &BrowserSession,
        args: Value,
    ) -> Result<ActionResult, EngineError> {
        let args = if args.is_null() { json!({}) } else { args };
        match serde_json::from_value::<T::Args>(args) {
            Ok(parsed) => self.tool.execute(session, parsed).await,
            Err(e) => {
                warn!(tool = %T::name(), error = %e, "Rejected tool arguments");
                Ok(ActionResult::fail(
                    format!("Invalid arguments for {}", T::name()),
                    e.to_string(),
                ))
            }
        }
    }
}

fn parameters_for<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_else(|_| json!({ "type": "object" }))
}

/// Every tool, in registration order
pub struct ToolRegistry {
    tools: Vec<Box<dyn ErasedTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// The full action set; `initialize_browser` launches with `launch`
    pub fn with_defaults(launch: LaunchOptions) -> Self {
        let mut registry = Self::new();
        registry.register(InitializeBrowserTool::new(launch));
        registry.register(NavigateToUrlTool);
        registry.register(ClickElementTool);
        registry.register(FillInputTool);
        registry.register(ExtractTextTool);
        registry.register(WaitForElementTool);
        registry.register(DiscoverFormFieldsTool);
        registry.register(DiscoverButtonsTool);
        registry.register(DiscoverTargetFormTool);
        registry.register(ScrollPageTool);
        registry.register(SelectOptionTool);
        registry.register(ExtractLinksTool);
        registry.register(TakeScreenshotTool);
        registry.register(GetPageInfoTool);
        registry.register(CloseBrowserTool);
        registry
    }

    /// Add a tool; a later registration under the same name replaces it
    pub fn register<T: BrowserTool>(&mut self, tool: T) {
        self.tools.retain(|t| t.spec().name != T::name());
        self.tools.push(Box::new(Registered {
            tool,
            spec: ToolSpec {
                name: T::name(),
                description: T::description(),
                parameters: parameters_for::<T::Args>(),
                read_only: T::read_only(),
            },
        }));
    }

    pub fn spec(&self, name: ToolName) -> Option<&ToolSpec> {
        self.tools
            .iter()
            .map(|t| t.spec())
            .find(|spec| spec.name == name)
    }

    /// Specs for `names`, in the order given; unknown names are skipped
    pub fn specs_for(&self, names: &[ToolName]) -> Vec<ToolSpec> {
        names
            .iter()
            .filter_map(|name| self.spec(*name).cloned())
            .collect()
    }

    pub fn names(&self) -> Vec<ToolName> {
        self.tools.iter().map(|t| t.spec().name).collect()
    }

    pub async fn call(
        &self,
        name: ToolName,
        session: &BrowserSession,
        args: Value,
    ) -> Result<ActionResult, EngineError> {
        let Some(tool) = self.tools.iter().find(|t| t.spec().name == name) else {
            return Ok(ActionResult::fail(
                format!("Unknown tool {name}"),
                "tool is not registered",
            ));
        };
        debug!(session_id = %session.id(), tool = %name, "Calling tool");
        tool.call(session, args).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_defaults(LaunchOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeLauncher, FakePage, contact_form};
    use crate::image_store::testing::MemoryImageStore;
    use crate::session::{ActionTimeouts, SessionStatus};
    use std::sync::Arc;

    fn session() -> BrowserSession {
        let launcher = FakeLauncher::new()
            .with_page(FakePage::new("https://example.com/", "Example Domain").with_elements(&["#go"]))
            .with_page(
                FakePage::new("https://example.com/contact", "Contact")
                    .with_form(contact_form("#contact-form")),
            );
        BrowserSession::new(
            "tools",
            Arc::new(launcher),
            Arc::new(MemoryImageStore::default()),
            ActionTimeouts::default(),
        )
    }

    #[test]
    fn test_every_name_round_trips() {
        for name in ToolName::ALL {
            assert_eq!(ToolName::from_name(name.as_str()), Some(name));
        }
        assert_eq!(ToolName::from_name("browser_research"), None);
    }

    #[test]
    fn test_specs_carry_schemas() {
        let registry = ToolRegistry::default();
        assert_eq!(registry.names().len(), ToolName::ALL.len());

        let fill = registry.spec(ToolName::FillInput).unwrap();
        let properties = &fill.parameters["properties"];
        assert!(properties.get("selector").is_some());
        assert!(properties.get("value").is_some());
        assert!(registry.spec(ToolName::ExtractText).unwrap().read_only);

        let function = fill.to_function();
        assert_eq!(function["function"]["name"], "fill_input");

        let subset = registry.specs_for(&[ToolName::TakeScreenshot, ToolName::NavigateToUrl]);
        let names: Vec<_> = subset.iter().map(|s| s.name).collect();
        assert_eq!(names, vec![ToolName::TakeScreenshot, ToolName::NavigateToUrl]);
    }

    #[tokio::test]
    async fn test_lifecycle_through_tools() {
        let registry = ToolRegistry::default();
        let session = session();

        let init = registry
            .call(ToolName::InitializeBrowser, &session, Value::Null)
            .await
            .unwrap();
        assert!(init.success);
        let again = registry
            .call(ToolName::InitializeBrowser, &session, json!({}))
            .await
            .unwrap();
        assert!(again.success);
        assert_eq!(session.status(), SessionStatus::Ready);

        let nav = registry
            .call(ToolName::NavigateToUrl, &session, json!({ "url": "https://example.com/" }))
            .await
            .unwrap();
        assert!(nav.success);

        let info = registry
            .call(ToolName::GetPageInfo, &session, Value::Null)
            .await
            .unwrap();
        assert_eq!(info.data_str("title"), Some("Example Domain"));

        let closed = registry
            .call(ToolName::CloseBrowser, &session, Value::Null)
            .await
            .unwrap();
        assert!(closed.success);
        assert_eq!(session.status(), SessionStatus::Closed);
    }

    #[tokio::test]
    async fn test_bad_arguments_are_reported_not_raised() {
        let registry = ToolRegistry::default();
        let session = session();
        registry
            .call(ToolName::InitializeBrowser, &session, Value::Null)
            .await
            .unwrap();

        let missing = registry
            .call(ToolName::ClickElement, &session, json!({ "sel": "#go" }))
            .await
            .unwrap();
        assert!(!missing.success);
        assert_eq!(missing.message, "Invalid arguments for click_element");

        let blank = registry
            .call(ToolName::FillInput, &session, json!({ "selector": "  ", "value": "x" }))
            .await
            .unwrap();
        assert!(!blank.success);

        let timeout = registry
            .call(
                ToolName::WaitForElement,
                &session,
                json!({ "selector": "#go", "timeout_ms": 600000 }),
            )
            .await
            .unwrap();
        assert!(!timeout.success);
        assert_eq!(session.status(), SessionStatus::Ready);
    }

    #[tokio::test]
    async fn test_discover_target_form_tool() {
        let registry = ToolRegistry::default();
        let session = session();
        registry
            .call(ToolName::InitializeBrowser, &session, Value::Null)
            .await
            .unwrap();
        registry
            .call(
                ToolName::NavigateToUrl,
                &session,
                json!({ "url": "https://example.com/contact" }),
            )
            .await
            .unwrap();

        let found = registry
            .call(ToolName::DiscoverTargetForm, &session, Value::Null)
            .await
            .unwrap();
        assert!(found.success);
        assert_eq!(found.data_str("selector"), Some("#contact-form"));
        assert_eq!(found.data_str("url"), Some("https://example.com/contact"));
    }
}
