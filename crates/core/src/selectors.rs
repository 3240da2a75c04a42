//! Selector configuration for card extraction.
//!
//! A [`SelectorConfig`] names the repeating card element and, in declaration
//! order, the fields to read from inside each card. Every selector is compiled
//! when the config is built, so a typo is reported before any page is fetched.
//!
//! # Example
//!
//! ```rust
//! use rolodex_core::SelectorConfig;
//!
//! let config = SelectorConfig::builder()
//!     .card("div.business-card")
//!     .field("name", "h2")
//!     .field("email", "span.email")
//!     .field("website", "a.site@href")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.columns(), ["name", "email", "website"]);
//! ```

use std::collections::HashSet;

use scraper::Selector;

use crate::parse::compile_selector;
use crate::{Result, ScrapeError};

/// Reserved field name for the card selector.
pub const CARD_FIELD: &str = "card";

pub const DEFAULT_CARD_SELECTOR: &str = "div.business-card";
pub const DEFAULT_NAME_SELECTOR: &str = "h2";
pub const DEFAULT_EMAIL_SELECTOR: &str = "span.email";

/// One named field, scoped to the card it is read from.
#[derive(Debug, Clone)]
pub struct FieldSelector {
    name: String,
    selector: String,
    attribute: Option<String>,
    compiled: Selector,
}

impl FieldSelector {
    /// Parses a field spec of the form `css` or `css@attribute`.
    ///
    /// The `@attribute` suffix is only recognised when it is a plain
    /// attribute name, so selectors such as `a[href*="@"]` are left intact.
    pub fn new(name: impl Into<String>, spec: &str) -> Result<Self> {
        let (selector, attribute) = split_attribute(spec);
        Self::with_attribute(name, selector, attribute)
    }

    /// Builds a field that reads `attribute` (or text, when `None`).
    pub fn with_attribute(name: impl Into<String>, selector: &str, attribute: Option<&str>) -> Result<Self> {
        let name = name.into();
        let selector = selector.trim();
        let compiled = compile_field(&name, selector)?;

        Ok(Self {
            name,
            selector: selector.to_string(),
            attribute: attribute.map(str::to_string),
            compiled,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The CSS part of the field spec.
    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    pub fn compiled(&self) -> &Selector {
        &self.compiled
    }
}

/// Splits `css@attr` into its parts.
pub fn split_attribute(spec: &str) -> (&str, Option<&str>) {
    let is_attr_name = |s: &str| {
        !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'))
    };

    match spec.rsplit_once('@') {
        Some((css, attr)) if !css.trim().is_empty() && is_attr_name(attr) => (css, Some(attr)),
        _ => (spec, None),
    }
}

fn compile_field(field: &str, selector: &str) -> Result<Selector> {
    if selector.is_empty() {
        return Err(ScrapeError::InvalidSelector {
            field: field.to_string(),
            selector: selector.to_string(),
            reason: "selector is empty".to_string(),
        });
    }

    compile_selector(selector).map_err(|reason| ScrapeError::InvalidSelector {
        field: field.to_string(),
        selector: selector.to_string(),
        reason,
    })
}

/// Validated card and field selectors plus the card skip policy.
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    card: String,
    card_compiled: Selector,
    fields: Vec<FieldSelector>,
    min_filled: usize,
    missing_value: String,
}

impl SelectorConfig {
    /// Creates a new builder.
    pub fn builder() -> SelectorConfigBuilder {
        SelectorConfigBuilder::new()
    }

    /// Builds a config from `(name, selector)` pairs.
    ///
    /// The pair named `card` is the card selector; every other pair is a
    /// field, kept in iteration order.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut builder = Self::builder();
        for (name, selector) in pairs {
            let name = name.into();
            builder = if name == CARD_FIELD { builder.card(selector) } else { builder.field(name, selector) };
        }
        builder.build()
    }

    pub fn card(&self) -> &str {
        &self.card
    }

    pub fn card_selector(&self) -> &Selector {
        &self.card_compiled
    }

    pub fn fields(&self) -> &[FieldSelector] {
        &self.fields
    }

    /// Field names in declaration order; the CSV header.
    pub fn columns(&self) -> Vec<&str> {
        self.fields.iter().map(FieldSelector::name).collect()
    }

    /// Non-empty fields a card needs to be kept.
    ///
    /// Zero when no fields are configured, so field-less configs keep every card.
    pub fn min_filled(&self) -> usize {
        self.min_filled.min(self.fields.len())
    }

    /// Value written for fields that matched nothing.
    pub fn missing_value(&self) -> &str {
        &self.missing_value
    }
}

/// Builder for [`SelectorConfig`].
///
/// Errors are deferred to [`SelectorConfigBuilder::build`].
#[derive(Debug, Clone)]
pub struct SelectorConfigBuilder {
    card: Option<String>,
    fields: Vec<(String, String)>,
    min_filled: usize,
    missing_value: String,
}

impl SelectorConfigBuilder {
    /// Creates a builder with no selectors, `min_filled` 1 and an empty
    /// missing value.
    pub fn new() -> Self {
        Self { card: None, fields: Vec::new(), min_filled: 1, missing_value: String::new() }
    }

    /// Sets the card selector.
    pub fn card(mut self, selector: impl Into<String>) -> Self {
        self.card = Some(selector.into());
        self
    }

    /// Appends a field; `spec` is `css` or `css@attribute`.
    pub fn field(mut self, name: impl Into<String>, spec: impl Into<String>) -> Self {
        self.fields.push((name.into(), spec.into()));
        self
    }

    /// Sets how many non-empty fields a card needs to be kept (0 keeps all).
    pub fn min_filled(mut self, value: usize) -> Self {
        self.min_filled = value;
        self
    }

    /// Sets the placeholder for unmatched fields.
    pub fn missing_value(mut self, value: impl Into<String>) -> Self {
        self.missing_value = value.into();
        self
    }

    /// Validates and compiles every selector.
    ///
    /// # Errors
    ///
    /// - [`ScrapeError::Config`] when the card selector is missing, a field
    ///   name is empty, reserved, or repeated, or `min_filled` exceeds the
    ///   number of fields.
    /// - [`ScrapeError::InvalidSelector`] when a selector does not compile.
    pub fn build(self) -> Result<SelectorConfig> {
        let card = self
            .card
            .map(|c| c.trim().to_string())
            .ok_or_else(|| ScrapeError::Config("a card selector is required".to_string()))?;
        let card_compiled = compile_field(CARD_FIELD, &card)?;

        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(self.fields.len());
        for (name, spec) in self.fields {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(ScrapeError::Config("field names must not be empty".to_string()));
            }
            if name == CARD_FIELD {
                return Err(ScrapeError::Config(format!("'{}' is reserved for the card selector", CARD_FIELD)));
            }
            if !seen.insert(name.clone()) {
                return Err(ScrapeError::Config(format!("field '{}' is defined more than once", name)));
            }
            fields.push(FieldSelector::new(name, &spec)?);
        }

        if !fields.is_empty() && self.min_filled > fields.len() {
            return Err(ScrapeError::Config(format!(
                "min_filled is {} but only {} field(s) are configured",
                self.min_filled,
                fields.len()
            )));
        }

        Ok(SelectorConfig {
            card,
            card_compiled,
            fields,
            min_filled: self.min_filled,
            missing_value: self.missing_value,
        })
    }
}

impl Default for SelectorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_builder_keeps_declaration_order() {
        let config = SelectorConfig::builder()
            .card("li.listing")
            .field("phone", ".tel")
            .field("name", "h3")
            .field("email", "a.mail")
            .build()
            .unwrap();

        assert_eq!(config.card(), "li.listing");
        assert_eq!(config.columns(), ["phone", "name", "email"]);
        assert_eq!(config.min_filled(), 1);
        assert_eq!(config.missing_value(), "");
    }

    #[test]
    fn test_from_pairs_routes_card() {
        let config =
            SelectorConfig::from_pairs([("name", "h2"), ("card", "div.business-card"), ("email", "span.email")])
                .unwrap();
        assert_eq!(config.card(), "div.business-card");
        assert_eq!(config.columns(), ["name", "email"]);
    }

    #[test]
    fn test_card_is_required() {
        let err = SelectorConfig::builder().field("name", "h2").build().unwrap_err();
        assert!(matches!(err, ScrapeError::Config(_)));
    }

    #[test]
    fn test_invalid_selector_names_field() {
        let err = SelectorConfig::builder().card("div").field("email", "span[[").build().unwrap_err();
        match err {
            ScrapeError::InvalidSelector { field, selector, .. } => {
                assert_eq!(field, "email");
                assert_eq!(selector, "span[[");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_card_selector_is_invalid() {
        let err = SelectorConfig::builder().card("   ").build().unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidSelector { ref field, .. } if field == CARD_FIELD));
    }

    #[rstest]
    #[case("card")]
    #[case("")]
    fn test_bad_field_names(#[case] name: &str) {
        let err = SelectorConfig::builder().card("div").field(name, "h2").build().unwrap_err();
        assert!(matches!(err, ScrapeError::Config(_)));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let err = SelectorConfig::builder()
            .card("div")
            .field("name", "h2")
            .field("name", "h3")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_min_filled_bounds() {
        let err = SelectorConfig::builder().card("div").field("name", "h2").min_filled(2).build().unwrap_err();
        assert!(matches!(err, ScrapeError::Config(_)));

        let config = SelectorConfig::builder().card("div").min_filled(3).build().unwrap();
        assert_eq!(config.min_filled(), 0);
    }

    #[rstest]
    #[case("a.site@href", "a.site", Some("href"))]
    #[case("meta[itemprop=email]@content", "meta[itemprop=email]", Some("content"))]
    #[case("img@data-src", "img", Some("data-src"))]
    #[case("span.email", "span.email", None)]
    #[case(r#"a[href*="@"]"#, r#"a[href*="@"]"#, None)]
    #[case(r#"a[title="x@y.com"]"#, r#"a[title="x@y.com"]"#, None)]
    #[case("@href", "@href", None)]
    fn test_split_attribute(#[case] spec: &str, #[case] css: &str, #[case] attr: Option<&str>) {
        assert_eq!(split_attribute(spec), (css, attr));
    }

    #[test]
    fn test_attribute_field() {
        // whitespace around the css part is trimmed
        let config = SelectorConfig::builder().card("div").field("site", " a.site @href").build().unwrap();
        let field = &config.fields()[0];
        assert_eq!(field.selector(), "a.site");
        assert_eq!(field.attribute(), Some("href"));
    }
}
