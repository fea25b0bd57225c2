//! Gateway routing: a pure function from task features to a policy plan

use regex::Regex;
use std::sync::LazyLock;

use super::policy::PolicyKind;
use super::task::TaskIntent;

static NAVIGATION_VERBS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(go to|navigate|open|visit|browse|click|scroll|load)\b").expect("valid regex")
});

static FORM_VERBS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(forms?|fill|submit|sign ?up|register|log ?in|subscribe)\b").expect("valid regex")
});

static EXTRACTION_VERBS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(extract|scrape|collect|gather|get all|find all|list|links|prices)\b")
        .expect("valid regex")
});

/// Ordered handoffs for `intent`: navigate first, then fill, then extract
///
/// Tasks with no recognizable signal go to navigation.
pub fn route(intent: &TaskIntent) -> Vec<PolicyKind> {
    let text = intent.text.as_str();
    let navigation = intent.url.is_some() || NAVIGATION_VERBS.is_match(text);
    let form = FORM_VERBS.is_match(text) || intent.has_form_values();
    let extraction = EXTRACTION_VERBS.is_match(text);

    let mut plan = Vec::new();
    if navigation {
        plan.push(PolicyKind::Navigation);
    }
    if form {
        plan.push(PolicyKind::FormAutomation);
    }
    if extraction {
        plan.push(PolicyKind::DataExtraction);
    }
    if plan.is_empty() {
        plan.push(PolicyKind::Navigation);
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(text: &str) -> Vec<PolicyKind> {
        route(&TaskIntent::parse(text))
    }

    #[test]
    fn test_single_category_tasks() {
        assert_eq!(
            plan("Go to https://example.com and read the page title"),
            vec![PolicyKind::Navigation]
        );
        assert_eq!(
            plan("Fill the form with email 'a@b.co'"),
            vec![PolicyKind::FormAutomation]
        );
        assert_eq!(
            plan("Extract every heading on this page"),
            vec![PolicyKind::DataExtraction]
        );
    }

    #[test]
    fn test_compound_task_navigates_first() {
        assert_eq!(
            plan("Open example.com/contact and fill the contact form with name 'A'"),
            vec![PolicyKind::Navigation, PolicyKind::FormAutomation]
        );
        assert_eq!(
            plan("Visit https://shop.example.com and collect all product prices"),
            vec![PolicyKind::Navigation, PolicyKind::DataExtraction]
        );
    }

    #[test]
    fn test_unrecognized_task_defaults_to_navigation() {
        assert_eq!(plan("What is on the screen right now?"), vec![PolicyKind::Navigation]);
    }
}
