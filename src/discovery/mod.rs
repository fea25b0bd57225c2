//! Target-form discovery
//!
//! A pure function over a [`PageSnapshot`]: strategies are tried in a fixed
//! trust order and every admitted container accumulates a score. The same
//! snapshot and intent always produce the same outcome.

mod snapshot;

pub use snapshot::{ButtonDescriptor, ContainerSnapshot, FieldDescriptor, PageSnapshot};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::cmp::Ordering;

const EXACT_SCORE: f64 = 10.0;
const ATTRIBUTE_SCORE: f64 = 3.0;
const SEMANTIC_BONUS: f64 = 2.0;
const BUTTON_BONUS: f64 = 1.0;
const FALLBACK_SCORE: f64 = 0.5;
/// Containers below this field score are not admitted on field evidence alone
const FIELD_SCORE_THRESHOLD: u32 = 2;

/// Discovery strategies, declared in trust order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Exact,
    Attribute,
    FieldScore,
    SemanticText,
    ButtonAdjacency,
    Fallback,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Exact => "exact",
            Strategy::Attribute => "attribute",
            Strategy::FieldScore => "field_score",
            Strategy::SemanticText => "semantic_text",
            Strategy::ButtonAdjacency => "button_adjacency",
            Strategy::Fallback => "fallback",
        }
    }
}

/// What the caller is looking for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryIntent {
    pub label: String,
    /// Exact selectors, tried in order. Caller-supplied ones go first.
    pub selectors: Vec<String>,
    /// Substrings matched against a form's `action`
    pub action_keywords: Vec<String>,
    /// Visible phrases that mark a container as relevant
    pub phrases: Vec<String>,
    pub button_labels: Vec<String>,
    /// Substrings matched against container id/class as a last resort
    pub fallback_keywords: Vec<String>,
}

impl DiscoveryIntent {
    pub fn contact_form() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            label: "contact form".to_string(),
            selectors: strings(&[
                "form#contact",
                "form#contact-form",
                "form#contact-us",
                "#contact",
                ".contact-form",
                ".contact-us",
            ]),
            action_keywords: strings(&["contact", "support", "feedback", "enquiry"]),
            phrases: strings(&[
                "contact us",
                "contact",
                "get in touch",
                "feedback",
                "support",
                "enquiry",
                "message us",
                "help",
                "reach us",
            ]),
            button_labels: strings(&["send message", "contact us", "send", "submit", "message"]),
            fallback_keywords: strings(&["contact", "enquiry", "feedback", "support"]),
        }
    }

    /// Put a caller-supplied selector ahead of the well-known ones
    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        let selector = selector.into();
        self.selectors.retain(|s| s != &selector);
        self.selectors.insert(0, selector);
        self
    }
}

/// One container that survived discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub selector: String,
    pub matched_strategy: Strategy,
    pub score: f64,
    pub fields: Vec<FieldDescriptor>,
    pub submit_selectors: Vec<String>,
    /// Document order of the container
    pub index: usize,
}

impl Candidate {
    fn new(container: &ContainerSnapshot, strategy: Strategy, score: f64) -> Self {
        Self {
            selector: container.selector.clone(),
            matched_strategy: strategy,
            score,
            fields: container.fields.clone(),
            submit_selectors: container
                .buttons
                .iter()
                .filter(|b| b.is_submit() && !b.selector.is_empty())
                .map(|b| b.selector.clone())
                .collect(),
            index: container.index,
        }
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.required)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryOutcome {
    Found {
        chosen: Candidate,
        candidates: Vec<Candidate>,
    },
    /// Two or more candidates tie on score and strategy
    Ambiguous { candidates: Vec<Candidate> },
    NotFound,
}

impl DiscoveryOutcome {
    pub fn tag(&self) -> &'static str {
        match self {
            DiscoveryOutcome::Found { .. } => "found",
            DiscoveryOutcome::Ambiguous { .. } => "ambiguous",
            DiscoveryOutcome::NotFound => "not_found",
        }
    }

    /// Structured payload attached to the discover action result
    pub fn to_data(&self, url: &str) -> Value {
        match self {
            DiscoveryOutcome::Found { chosen, candidates } => json!({
                "outcome": self.tag(),
                "url": url,
                "selector": chosen.selector,
                "strategy": chosen.matched_strategy,
                "score": chosen.score,
                "fields": chosen.fields,
                "submitSelectors": chosen.submit_selectors,
                "candidates": candidates,
            }),
            DiscoveryOutcome::Ambiguous { candidates } => json!({
                "outcome": self.tag(),
                "url": url,
                "candidates": candidates,
            }),
            DiscoveryOutcome::NotFound => json!({
                "outcome": self.tag(),
                "url": url,
            }),
        }
    }
}

/// Locate the container that best matches `intent`
pub fn discover(snapshot: &PageSnapshot, intent: &DiscoveryIntent) -> DiscoveryOutcome {
    let containers: Vec<&ContainerSnapshot> = snapshot
        .containers
        .iter()
        .filter(|c| !c.selector.is_empty())
        .collect();

    // Exact: first selector in order wins outright
    for wanted in &intent.selectors {
        if let Some(container) = containers
            .iter()
            .find(|c| c.matched_selectors.iter().any(|p| p == wanted))
        {
            let chosen = Candidate::new(container, Strategy::Exact, EXACT_SCORE);
            return DiscoveryOutcome::Found {
                candidates: vec![chosen.clone()],
                chosen,
            };
        }
    }

    let mut pool: Vec<Candidate> = Vec::new();

    let by_action: Vec<&&ContainerSnapshot> = containers
        .iter()
        .filter(|c| {
            let action = c.action.to_lowercase();
            intent
                .action_keywords
                .iter()
                .any(|k| action.contains(&k.to_lowercase()))
        })
        .collect();
    if let [only] = by_action.as_slice() {
        let chosen = Candidate::new(
            only,
            Strategy::Attribute,
            ATTRIBUTE_SCORE + field_score(&only.fields) as f64,
        );
        return DiscoveryOutcome::Found {
            candidates: vec![chosen.clone()],
            chosen,
        };
    }
    for container in by_action {
        pool.push(Candidate::new(
            container,
            Strategy::Attribute,
            ATTRIBUTE_SCORE + field_score(&container.fields) as f64,
        ));
    }

    for container in &containers {
        let score = field_score(&container.fields);
        if score >= FIELD_SCORE_THRESHOLD && position(&pool, container).is_none() {
            pool.push(Candidate::new(container, Strategy::FieldScore, score as f64));
        }
    }

    for container in &containers {
        let nearby = container.nearby_text.to_lowercase();
        if !intent
            .phrases
            .iter()
            .any(|p| contains_phrase(&nearby, &p.to_lowercase()))
        {
            continue;
        }
        admit_or_bonus(&mut pool, container, Strategy::SemanticText, SEMANTIC_BONUS);
    }

    for container in &containers {
        let has_label = container.buttons.iter().any(|b| {
            let text = b.text.trim().to_lowercase();
            intent
                .button_labels
                .iter()
                .any(|label| text == label.to_lowercase())
        });
        if has_label {
            admit_or_bonus(&mut pool, container, Strategy::ButtonAdjacency, BUTTON_BONUS);
        }
    }

    if pool.is_empty() {
        for container in &containers {
            let marker = format!("{} {}", container.id, container.class_name).to_lowercase();
            if intent
                .fallback_keywords
                .iter()
                .any(|k| marker.contains(&k.to_lowercase()))
            {
                pool.push(Candidate::new(container, Strategy::Fallback, FALLBACK_SCORE));
            }
        }
    }

    if pool.is_empty() {
        return DiscoveryOutcome::NotFound;
    }

    pool.sort_by(rank);
    let tied = pool.len() > 1
        && pool[1].score == pool[0].score
        && pool[1].matched_strategy == pool[0].matched_strategy;
    if tied {
        return DiscoveryOutcome::Ambiguous { candidates: pool };
    }

    DiscoveryOutcome::Found {
        chosen: pool[0].clone(),
        candidates: pool,
    }
}

/// Score descending, then trust order, then document order
fn rank(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then(a.matched_strategy.cmp(&b.matched_strategy))
        .then(a.index.cmp(&b.index))
}

fn position(pool: &[Candidate], container: &ContainerSnapshot) -> Option<usize> {
    pool.iter().position(|c| c.index == container.index)
}

/// Add `bonus` to an admitted container, or admit a real form on this evidence
fn admit_or_bonus(
    pool: &mut Vec<Candidate>,
    container: &ContainerSnapshot,
    strategy: Strategy,
    bonus: f64,
) {
    match position(pool, container) {
        Some(i) => pool[i].score += bonus,
        None if container.tag.eq_ignore_ascii_case("form") && !container.fields.is_empty() => {
            pool.push(Candidate::new(
                container,
                strategy,
                bonus + field_score(&container.fields) as f64,
            ));
        }
        None => {}
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldCategory {
    Email,
    Phone,
    Message,
    Name,
}

/// Classify a field by its type, tag and identifying text
pub(crate) fn categorize(field: &FieldDescriptor) -> Option<FieldCategory> {
    let text = format!(
        "{} {} {} {}",
        field.name, field.id, field.placeholder, field.label
    )
    .to_lowercase();
    let kind = field.field_type.to_lowercase();

    if kind == "email" || text.contains("email") || text.contains("e-mail") {
        Some(FieldCategory::Email)
    } else if kind == "tel" || text.contains("phone") || text.contains("mobile") {
        Some(FieldCategory::Phone)
    } else if field.tag.eq_ignore_ascii_case("textarea")
        || ["message", "comment", "enquiry", "inquiry"]
            .iter()
            .any(|k| text.contains(k))
    {
        Some(FieldCategory::Message)
    } else if text.contains("name") && !text.contains("user") {
        Some(FieldCategory::Name)
    } else {
        None
    }
}

/// +1 per name/email/phone/message category present, +1 for email with message
pub fn field_score(fields: &[FieldDescriptor]) -> u32 {
    let present = |category| fields.iter().any(|f| categorize(f) == Some(category));
    let email = present(FieldCategory::Email);
    let message = present(FieldCategory::Message);

    let mut score = [email, message, present(FieldCategory::Phone), present(FieldCategory::Name)]
        .iter()
        .filter(|p| **p)
        .count() as u32;
    if email && message {
        score += 1;
    }
    score
}

/// Phrase match bounded by non-alphanumeric characters
fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    haystack.match_indices(phrase).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + phrase.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(tag: &str, kind: &str, name: &str, required: bool) -> FieldDescriptor {
        FieldDescriptor {
            tag: tag.into(),
            field_type: kind.into(),
            name: name.into(),
            required,
            selector: FieldDescriptor::synthesize_selector("", name),
            ..Default::default()
        }
    }

    fn form(index: usize, selector: &str, fields: Vec<FieldDescriptor>) -> ContainerSnapshot {
        ContainerSnapshot {
            index,
            tag: "form".into(),
            selector: selector.into(),
            fields,
            ..Default::default()
        }
    }

    fn contact_fields() -> Vec<FieldDescriptor> {
        vec![
            field("input", "text", "name", true),
            field("input", "email", "email", true),
            field("textarea", "", "message", true),
        ]
    }

    fn snapshot(containers: Vec<ContainerSnapshot>) -> PageSnapshot {
        PageSnapshot {
            url: "https://example.com/contact".into(),
            title: "Contact".into(),
            containers,
        }
    }

    #[test]
    fn test_field_score_rewards_email_with_message() {
        let name_only = vec![field("input", "text", "full_name", false)];
        let email_message = vec![
            field("input", "email", "email", false),
            field("textarea", "", "body", false),
        ];
        assert_eq!(field_score(&name_only), 1);
        assert_eq!(field_score(&email_message), 3);
        assert!(field_score(&email_message) >= field_score(&name_only));
        assert_eq!(field_score(&contact_fields()), 4);
    }

    #[test]
    fn test_exact_selector_wins_in_listed_order() {
        let mut newsletter = form(0, "#newsletter", vec![field("input", "email", "email", false)]);
        newsletter.matched_selectors = vec![".contact-us".into()];
        let mut contact = form(1, "#contact-form", contact_fields());
        contact.matched_selectors = vec!["form#contact-form".into()];

        let outcome = discover(&snapshot(vec![newsletter, contact]), &DiscoveryIntent::contact_form());
        match outcome {
            DiscoveryOutcome::Found { chosen, .. } => {
                assert_eq!(chosen.selector, "#contact-form");
                assert_eq!(chosen.matched_strategy, Strategy::Exact);
            }
            other => panic!("expected found, got {other:?}"),
        }
    }

    #[test]
    fn test_caller_selector_tried_first() {
        let mut a = form(0, "#a", contact_fields());
        a.matched_selectors = vec!["#contact".into()];
        let mut b = form(1, "#custom", contact_fields());
        b.matched_selectors = vec!["#custom".into()];

        let intent = DiscoveryIntent::contact_form().with_selector("#custom");
        assert_eq!(intent.selectors[0], "#custom");
        match discover(&snapshot(vec![a, b]), &intent) {
            DiscoveryOutcome::Found { chosen, .. } => assert_eq!(chosen.selector, "#custom"),
            other => panic!("expected found, got {other:?}"),
        }
    }

    #[test]
    fn test_single_action_match_short_circuits() {
        let mut search = form(0, "#search", vec![field("input", "search", "q", false)]);
        search.action = "/search".into();
        let mut support = form(1, "form:nth-of-type(2)", vec![field("input", "email", "email", true)]);
        support.action = "https://example.com/support/submit".into();

        match discover(&snapshot(vec![search, support]), &DiscoveryIntent::contact_form()) {
            DiscoveryOutcome::Found { chosen, candidates } => {
                assert_eq!(chosen.matched_strategy, Strategy::Attribute);
                assert_eq!(chosen.selector, "form:nth-of-type(2)");
                assert_eq!(candidates.len(), 1);
            }
            other => panic!("expected found, got {other:?}"),
        }
    }

    #[test]
    fn test_field_score_beats_sparse_form() {
        let login = form(
            0,
            "#login",
            vec![
                field("input", "text", "username", true),
                field("input", "password", "password", true),
            ],
        );
        let contact = form(1, "#enquiries", contact_fields());

        match discover(&snapshot(vec![login, contact]), &DiscoveryIntent::contact_form()) {
            DiscoveryOutcome::Found { chosen, candidates } => {
                assert_eq!(chosen.selector, "#enquiries");
                assert_eq!(chosen.matched_strategy, Strategy::FieldScore);
                assert_eq!(candidates.len(), 1);
            }
            other => panic!("expected found, got {other:?}"),
        }
    }

    #[test]
    fn test_semantic_text_breaks_field_tie() {
        let mut quote = form(0, "#quote", contact_fields());
        quote.nearby_text = "Request a quote".into();
        let mut contact = form(1, "#reach", contact_fields());
        contact.nearby_text = "Get in touch with our team".into();

        match discover(&snapshot(vec![quote, contact]), &DiscoveryIntent::contact_form()) {
            DiscoveryOutcome::Found { chosen, .. } => {
                assert_eq!(chosen.selector, "#reach");
                assert_eq!(chosen.score, 6.0);
            }
            other => panic!("expected found, got {other:?}"),
        }
    }

    #[test]
    fn test_identical_forms_are_ambiguous() {
        let a = form(0, "#first", contact_fields());
        let b = form(1, "#second", contact_fields());

        match discover(&snapshot(vec![a, b]), &DiscoveryIntent::contact_form()) {
            DiscoveryOutcome::Ambiguous { candidates } => {
                let selectors: Vec<_> = candidates.iter().map(|c| c.selector.as_str()).collect();
                assert_eq!(selectors, vec!["#first", "#second"]);
            }
            other => panic!("expected ambiguous, got {other:?}"),
        }
    }

    #[test]
    fn test_equal_score_orders_by_strategy_trust() {
        // Attribute (3 + 0) vs field score (3), two action matches so no short circuit
        let mut feedback = form(0, "#feedback", vec![field("input", "search", "q", false)]);
        feedback.action = "/feedback".into();
        let mut support = form(1, "#support", vec![field("input", "checkbox", "agree", false)]);
        support.action = "/support".into();
        let mut scored = form(
            2,
            "#scored",
            vec![field("input", "email", "email", false), field("textarea", "", "msg", false)],
        );
        scored.nearby_text = String::new();

        let outcome = discover(
            &snapshot(vec![scored, feedback, support]),
            &DiscoveryIntent::contact_form(),
        );
        match outcome {
            DiscoveryOutcome::Ambiguous { candidates } => {
                assert_eq!(candidates[0].matched_strategy, Strategy::Attribute);
                assert_eq!(candidates[1].matched_strategy, Strategy::Attribute);
                assert_eq!(candidates[2].matched_strategy, Strategy::FieldScore);
            }
            other => panic!("expected ambiguous attribute tie, got {other:?}"),
        }
    }

    #[test]
    fn test_equal_score_earlier_strategy_wins() {
        let mut near_text = form(0, "#near-text", vec![field("input", "text", "q", false)]);
        near_text.nearby_text = "Contact".into();
        let mut near_button = form(1, "#near-button", vec![field("input", "text", "full_name", false)]);
        near_button.buttons = vec![ButtonDescriptor {
            tag: "button".into(),
            text: "Send".into(),
            selector: "#send".into(),
            ..Default::default()
        }];

        match discover(&snapshot(vec![near_text, near_button]), &DiscoveryIntent::contact_form()) {
            DiscoveryOutcome::Found { chosen, candidates } => {
                assert_eq!(chosen.selector, "#near-text");
                assert_eq!(chosen.matched_strategy, Strategy::SemanticText);
                assert_eq!(candidates[1].score, chosen.score);
            }
            other => panic!("expected found, got {other:?}"),
        }
    }

    #[test]
    fn test_fallback_uses_class_keywords() {
        let mut container = form(0, "div.contact-block", vec![field("input", "text", "x", false)]);
        container.tag = "div".into();
        container.class_name = "contact-block".into();

        match discover(&snapshot(vec![container]), &DiscoveryIntent::contact_form()) {
            DiscoveryOutcome::Found { chosen, .. } => {
                assert_eq!(chosen.matched_strategy, Strategy::Fallback);
                assert_eq!(chosen.score, FALLBACK_SCORE);
            }
            other => panic!("expected fallback, got {other:?}"),
        }
    }

    #[test]
    fn test_no_candidate_is_not_found() {
        let search = form(0, "#search", vec![field("input", "search", "q", false)]);
        let outcome = discover(&snapshot(vec![search]), &DiscoveryIntent::contact_form());
        assert_eq!(outcome, DiscoveryOutcome::NotFound);
        assert_eq!(outcome.to_data("https://x.test")["outcome"], "not_found");
    }

    #[test]
    fn test_discovery_is_deterministic() {
        let mut a = form(0, "#a", contact_fields());
        a.nearby_text = "Contact us".into();
        let mut b = form(1, "#b", contact_fields());
        b.buttons = vec![ButtonDescriptor {
            tag: "button".into(),
            button_type: "submit".into(),
            text: "Send".into(),
            selector: "#b button".into(),
            ..Default::default()
        }];
        let page = snapshot(vec![a, b]);
        let intent = DiscoveryIntent::contact_form();
        assert_eq!(discover(&page, &intent), discover(&page, &intent));
    }

    #[test]
    fn test_phrase_needs_word_boundaries() {
        assert!(contains_phrase("please contact us today", "contact us"));
        assert!(!contains_phrase("helpful tips", "help"));
        assert!(contains_phrase("help.", "help"));
    }
}
