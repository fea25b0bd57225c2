//! Plain-data view of a page, gathered in one round trip by the driver

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An input-like element (`input`, `textarea`, `select`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldDescriptor {
    pub tag: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub name: String,
    pub id: String,
    pub placeholder: String,
    pub label: String,
    pub required: bool,
    /// `#id`, else `[name="..."]`, else a structural `:nth-of-type` path
    pub selector: String,
}

impl FieldDescriptor {
    /// Selector preference: id, then name, then nothing
    pub fn synthesize_selector(id: &str, name: &str) -> String {
        if !id.is_empty() {
            format!("#{id}")
        } else if !name.is_empty() {
            format!("[name=\"{name}\"]")
        } else {
            String::new()
        }
    }

    /// Human-facing name used when reporting missing fields
    pub fn display_name(&self) -> &str {
        [&self.name, &self.id, &self.label, &self.placeholder]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(String::as_str)
            .unwrap_or(self.tag.as_str())
    }
}

/// A clickable control (`button`, submit/button inputs)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ButtonDescriptor {
    pub tag: String,
    #[serde(rename = "type")]
    pub button_type: String,
    pub text: String,
    pub id: String,
    pub class_name: String,
    pub selector: String,
}

impl ButtonDescriptor {
    pub fn is_submit(&self) -> bool {
        if self.button_type.eq_ignore_ascii_case("submit") {
            return true;
        }
        let text = self.text.trim().to_lowercase();
        matches!(text.as_str(), "submit" | "send" | "send message")
    }
}

/// A form, or form-like container, with everything discovery scores on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerSnapshot {
    /// Document order
    pub index: usize,
    pub tag: String,
    pub selector: String,
    pub id: String,
    pub class_name: String,
    pub action: String,
    pub fields: Vec<FieldDescriptor>,
    pub buttons: Vec<ButtonDescriptor>,
    /// Headings, legends and labels in and around the container
    pub nearby_text: String,
    /// Queried selectors that resolved to this container
    pub matched_selectors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageSnapshot {
    pub url: String,
    pub title: String,
    pub containers: Vec<ContainerSnapshot>,
}
