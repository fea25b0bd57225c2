//! Fixed automation policies: instructions plus an allowed tool subset

use serde::{Deserialize, Serialize};

use crate::tools::ToolName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    Navigation,
    FormAutomation,
    DataExtraction,
    UnifiedWebsiteAutomation,
    /// Router; never runs tools itself
    Gateway,
}

impl PolicyKind {
    pub fn name(&self) -> &'static str {
        match self {
            PolicyKind::Navigation => "Browser Navigation Agent",
            PolicyKind::FormAutomation => "Form Automation Agent",
            PolicyKind::DataExtraction => "Data Extraction Agent",
            PolicyKind::UnifiedWebsiteAutomation => "Website Automation Agent",
            PolicyKind::Gateway => "Browser Automation Gateway",
        }
    }
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

const NAVIGATION_TOOLS: &[ToolName] = &[
    ToolName::NavigateToUrl,
    ToolName::TakeScreenshot,
    ToolName::ClickElement,
    ToolName::WaitForElement,
    ToolName::ScrollPage,
    ToolName::GetPageInfo,
];

const FORM_TOOLS: &[ToolName] = &[
    ToolName::TakeScreenshot,
    ToolName::DiscoverTargetForm,
    ToolName::DiscoverFormFields,
    ToolName::DiscoverButtons,
    ToolName::FillInput,
    ToolName::SelectOption,
    ToolName::ClickElement,
    ToolName::WaitForElement,
    ToolName::GetPageInfo,
];

const EXTRACTION_TOOLS: &[ToolName] = &[
    ToolName::TakeScreenshot,
    ToolName::ExtractText,
    ToolName::ExtractLinks,
    ToolName::WaitForElement,
    ToolName::ScrollPage,
    ToolName::GetPageInfo,
];

const ALL_TOOLS: &[ToolName] = &ToolName::ALL;

const NO_TOOLS: &[ToolName] = &[];

const NAVIGATION_INSTRUCTIONS: &str = "\
You are a browser navigation agent. The browser is already running.

- Navigate with navigate_to_url, then take a screenshot to confirm the page loaded.
- Wait for elements before interacting with them and prefer precise CSS selectors.
- Use get_page_info when the task asks about the current URL or title.
- Report navigation errors and timeouts plainly. Do not retry a failing URL more than once.

Finish with a short plain-text summary of where the browser ended up.";

const FORM_INSTRUCTIONS: &str = "\
You are a form automation agent. The browser is already running and on the right page.

- Call discover_target_form first. If the task names a form selector, pass it.
- Fill only fields whose values appear in the task, using the selectors discovery returned.
- Map task values to fields by name, id, placeholder or label; prefer email, name, then message.
- Never click a submit control unless the task explicitly asks for submission.
- If a required field has no value in the task, stop and list the missing fields.
- If several forms match equally, stop and list them with their URL and required fields.
- Take a screenshot after filling and after any submission.

Finish with a summary naming the form selector, the fields filled and whether it was submitted.";

const EXTRACTION_INSTRUCTIONS: &str = "\
You are a data extraction agent. The browser is already running and on the right page.

- Wait for the content you need, then use extract_text or extract_links with specific selectors.
- Scroll when content loads lazily.
- Take a screenshot to document the source of extracted data.

Finish with the extracted data as JSON where possible, plus how much was found.";

const UNIFIED_INSTRUCTIONS: &str = "\
You are a website automation agent holding every browser tool.

Sequence: initialize_browser, navigate_to_url, take_screenshot, discover, act field by field
with a screenshot after each interaction, then close_browser.

Finding a contact-like form: call discover_target_form (pass a selector if the task names one).
It tries exact ids, form actions, field makeup, nearby headings and submit buttons, and reports
the chosen selector and why.

Rules:
- Do not submit anything unless the task explicitly requests submission.
- If a required field has no value in the task, stop, close the browser and list the missing fields.
- If several forms match equally, stop, close the browser and list them with URL and required fields.
- After any failed step, take a screenshot before cleaning up.
- Never print secrets and stop if a login or one-time code is required.

Finish with a human-readable report: page title, chosen selector, fields filled, whether it was
submitted, and the last screenshot URL.";

const GATEWAY_INSTRUCTIONS: &str = "\
Route browser tasks: navigation (go to, open, click, scroll) to the navigation agent, form work
(fill, submit, sign up) to the form agent, and extraction (extract, scrape, collect links) to the
data extraction agent. Multi-part tasks navigate first, then fill or extract.";

/// Immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    pub kind: PolicyKind,
    pub instructions: &'static str,
    pub allowed_tools: Vec<ToolName>,
}

impl Policy {
    pub fn for_kind(kind: PolicyKind) -> Self {
        let (instructions, tools): (&'static str, &[ToolName]) = match kind {
            PolicyKind::Navigation => (NAVIGATION_INSTRUCTIONS, NAVIGATION_TOOLS),
            PolicyKind::FormAutomation => (FORM_INSTRUCTIONS, FORM_TOOLS),
            PolicyKind::DataExtraction => (EXTRACTION_INSTRUCTIONS, EXTRACTION_TOOLS),
            PolicyKind::UnifiedWebsiteAutomation => (UNIFIED_INSTRUCTIONS, ALL_TOOLS),
            PolicyKind::Gateway => (GATEWAY_INSTRUCTIONS, NO_TOOLS),
        };
        Self {
            kind,
            instructions,
            allowed_tools: tools.to_vec(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn allows(&self, tool: ToolName) -> bool {
        self.allowed_tools.contains(&tool)
    }
}
