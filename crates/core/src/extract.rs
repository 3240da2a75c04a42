//! Card extraction.
//!
//! Every element matched by the card selector yields one [`Record`]. Field
//! selectors run scoped to that card, so a value never leaks in from a
//! neighbouring card or from the page around it. Cards with fewer than
//! `min_filled` non-empty fields are counted as skipped.

use crate::error::ExtractionError;
use crate::parse::{Document, Element};
use crate::record::Record;
use crate::selectors::{FieldSelector, SelectorConfig};

/// A repeating card element, borrowed from its [`Document`].
pub type Card<'a> = Element<'a>;

/// Attributes tried, in order, when a matched element has no text.
const FALLBACK_ATTRIBUTES: &[&str] = &["content", "value", "title", "alt"];

/// Link schemes whose target is itself a contact value.
const CONTACT_SCHEMES: &[&str] = &["mailto", "tel"];

/// The result of extracting cards from one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResult {
    /// Emitted records in document order
    pub records: Vec<Record>,
    /// Cards dropped by the skip policy
    pub skipped_cards: usize,
    /// Cards matched by the card selector
    pub total_cards: usize,
    /// Non-fatal conditions, in the order found
    pub errors: Vec<ExtractionError>,
}

impl RunResult {
    /// True when the card selector matched nothing.
    pub fn no_cards_found(&self) -> bool {
        self.errors.iter().any(|e| matches!(e, ExtractionError::NoCardsFound { .. }))
    }

    /// Appends another page's result, keeping record order.
    pub fn merge(&mut self, other: RunResult) {
        self.records.extend(other.records);
        self.skipped_cards += other.skipped_cards;
        self.total_cards += other.total_cards;
        self.errors.extend(other.errors);
    }
}

/// Extracts one record per card.
///
/// Each field selector is applied inside its card only and the first match in
/// document order wins. A field that matches nothing is empty, never an error.
/// Cards with fewer than [`SelectorConfig::min_filled`] non-empty fields are
/// counted in `skipped_cards` instead of being emitted, so
/// `records.len() + skipped_cards == total_cards` always holds.
pub fn extract_cards(doc: &Document, config: &SelectorConfig) -> RunResult {
    let cards: Vec<Card<'_>> = doc.query(config.card_selector(), None);

    if cards.is_empty() {
        tracing::debug!(selector = config.card(), "no cards matched");
        return RunResult {
            errors: vec![ExtractionError::NoCardsFound { selector: config.card().to_string() }],
            ..Default::default()
        };
    }

    let required = config.min_filled();
    let mut result = RunResult { total_cards: cards.len(), ..Default::default() };

    for (index, card) in cards.iter().enumerate() {
        let values: Vec<String> = config.fields().iter().map(|field| field_value(doc, card, field)).collect();
        let filled = values.iter().filter(|v| !v.is_empty()).count();

        if filled < required {
            tracing::debug!(index, filled, required, "skipping card");
            result.skipped_cards += 1;
            result.errors.push(ExtractionError::EmptyCard { index, filled, required });
            continue;
        }

        let record = config
            .fields()
            .iter()
            .zip(values)
            .map(|(field, value)| {
                let value = if value.is_empty() { config.missing_value().to_string() } else { value };
                (field.name(), value)
            })
            .collect();
        result.records.push(record);
    }

    result
}

/// Reads one field from a card.
fn field_value(doc: &Document, card: &Card<'_>, field: &FieldSelector) -> String {
    let Some(element) = doc.query_first(field.compiled(), Some(card)) else {
        return String::new();
    };

    if let Some(attribute) = field.attribute() {
        return element.attr(attribute).map(collapse_whitespace).unwrap_or_default();
    }

    let text = element.normalized_text();
    if !text.is_empty() {
        return text;
    }

    attribute_fallback(&element).unwrap_or_default()
}

/// Value for an element whose text is empty, e.g. `<a href="mailto:..">` around an icon.
fn attribute_fallback(element: &Element<'_>) -> Option<String> {
    if let Some(contact) = element.attr("href").and_then(contact_from_href) {
        return Some(contact);
    }

    FALLBACK_ATTRIBUTES
        .iter()
        .filter_map(|name| element.attr(name))
        .map(collapse_whitespace)
        .find(|value| !value.is_empty())
}

/// `mailto:a@x.com?subject=hi` -> `a@x.com`; `tel:+15550100` -> `+15550100`.
fn contact_from_href(href: &str) -> Option<String> {
    let (scheme, rest) = href.trim().split_once(':')?;
    if !CONTACT_SCHEMES.iter().any(|s| scheme.eq_ignore_ascii_case(s)) {
        return None;
    }

    let target = rest.split('?').next().unwrap_or_default().trim();
    (!target.is_empty()).then(|| target.to_string())
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
