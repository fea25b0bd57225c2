//! Features read off the task text: target URL, supplied field values,
//! whether submission was requested

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::discovery::{FieldCategory, FieldDescriptor, categorize};

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?:^|[^\w])(?:'[^']*'|"[^"]*")"#).expect("valid regex"));

static FIELD_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\b(full[ _-]?name|first[ _-]?name|last[ _-]?name|name|e-?mail(?: address)?|phone(?: number)?|telephone|mobile|message|subject|company|website|comment)\b\s*(?:is|=|:|as|of|to)?\s*(?:'([^']*)'|"([^"]*)"|([\w.+-]+@[\w-]+(?:\.[\w-]+)+))"#,
    )
    .expect("valid regex")
});

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w.+-]+@[\w-]+(?:\.[\w-]+)+").expect("valid regex"));

static ABSOLUTE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s'"<>)]+"#).expect("valid regex"));

static BARE_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:www\.)?[a-z0-9-]+(?:\.[a-z0-9-]+)*\.(?:com|org|net|io|dev|app|co|edu|gov|ai|uk|de)\b(?:/[^\s'\x22<>)]*)?",
    )
    .expect("valid regex")
});

static SELECTOR_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bselector\s*[:=]?\s*(?:'([^']+)'|"([^"]+)"|(\S+))|(?:^|\s)(#[A-Za-z][\w-]*)"#)
        .expect("valid regex")
});

static SUBMIT_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(submit|submitting|submission|send|sending)\b").expect("valid regex")
});

const NEGATIONS: &[&str] = &["not", "no", "don't", "dont", "never", "without", "avoid", "skip"];

/// A value the task supplies for some form field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldValue {
    /// As written in the task, e.g. "email" or "full name"
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskIntent {
    pub text: String,
    pub url: Option<String>,
    pub field_values: Vec<FieldValue>,
    pub submission_requested: bool,
    pub selector_hint: Option<String>,
}

impl TaskIntent {
    pub fn parse(text: &str) -> Self {
        Self {
            text: text.to_string(),
            url: find_url(text),
            field_values: find_field_values(text),
            submission_requested: requests_submission(text),
            selector_hint: find_selector_hint(text),
        }
    }

    /// Value supplied for `field`, matched by name/id/label/placeholder, then by kind
    pub fn value_for(&self, field: &FieldDescriptor) -> Option<&str> {
        let identifiers: Vec<String> = [&field.name, &field.id, &field.label, &field.placeholder]
            .into_iter()
            .map(|s| normalize(s))
            .filter(|s| !s.is_empty())
            .collect();

        if let Some(exact) = self
            .field_values
            .iter()
            .find(|v| identifiers.contains(&normalize(&v.key)))
        {
            return Some(&exact.value);
        }

        let category = categorize(field)?;
        self.field_values
            .iter()
            .find(|v| key_category(&v.key) == Some(category))
            .map(|v| v.value.as_str())
    }

    pub fn covers(&self, field: &FieldDescriptor) -> bool {
        self.value_for(field).is_some()
    }

    pub fn has_form_values(&self) -> bool {
        !self.field_values.is_empty()
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn key_category(key: &str) -> Option<FieldCategory> {
    categorize(&FieldDescriptor {
        name: key.to_string(),
        ..Default::default()
    })
}

fn find_url(text: &str) -> Option<String> {
    if let Some(m) = ABSOLUTE_URL.find(text) {
        return Some(m.as_str().trim_end_matches(['.', ',', ';']).to_string());
    }
    BARE_HOST
        .find_iter(text)
        // Skip the domain part of an email address
        .find(|m| !text[..m.start()].ends_with('@'))
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';']).to_string())
}

fn find_field_values(text: &str) -> Vec<FieldValue> {
    let mut values: Vec<FieldValue> = Vec::new();
    for caps in FIELD_VALUE.captures_iter(text) {
        let key = caps[1].to_lowercase();
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        if values.iter().any(|v| v.key == key) {
            continue;
        }
        values.push(FieldValue { key, value });
    }

    let has_email = values
        .iter()
        .any(|v| key_category(&v.key) == Some(FieldCategory::Email));
    if !has_email {
        if let Some(email) = EMAIL.find(text) {
            values.push(FieldValue {
                key: "email".to_string(),
                value: email.as_str().to_string(),
            });
        }
    }
    values
}

fn find_selector_hint(text: &str) -> Option<String> {
    let caps = SELECTOR_HINT.captures(text)?;
    (1..=4)
        .find_map(|i| caps.get(i))
        .map(|m| m.as_str().to_string())
}

/// A submit/send word outside quotes that is not negated by one of the
/// three words before it
fn requests_submission(text: &str) -> bool {
    let unquoted = QUOTED.replace_all(text, " ").to_lowercase();
    SUBMIT_WORD.find_iter(&unquoted).any(|m| {
        let negated = unquoted[..m.start()]
            .split_whitespace()
            .rev()
            .take(3)
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\''))
            .any(|w| NEGATIONS.contains(&w));
        !negated
    })
}
