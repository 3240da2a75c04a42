//! HTML parsing and element queries.
//!
//! This module provides the [`Document`] and [`Element`] types. Parsing is
//! lenient: unclosed tags, stray end tags, and missing doctypes are repaired
//! by the html5ever tree builder behind `scraper`. Only input that is empty
//! or clearly not text is rejected.
//!
//! # Example
//!
//! ```rust
//! use rolodex_core::parse::{Document, compile_selector};
//!
//! let html = r#"<div class="card"><h2>Acme</h2></div><div class="card"><h2>Beta</h2></div>"#;
//! let doc = Document::parse(html).unwrap();
//!
//! let cards = doc.query(&compile_selector("div.card").unwrap(), None);
//! let heading = compile_selector("h2").unwrap();
//! let names: Vec<String> = cards
//!     .iter()
//!     .map(|card| doc.query(&heading, Some(card))[0].normalized_text())
//!     .collect();
//! assert_eq!(names, ["Acme", "Beta"]);
//! ```

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use scraper::{Html, Selector};

use crate::{Result, ScrapeError};

/// Bytes inspected when deciding whether a body is binary.
const SNIFF_LEN: usize = 8192;

/// Bytes searched for a `<meta>` charset declaration.
const PRESCAN_LEN: usize = 1024;

/// Compiles a CSS selector, returning the parser's message on failure.
pub fn compile_selector(selector: &str) -> std::result::Result<Selector, String> {
    Selector::parse(selector).map_err(|e| e.to_string())
}

/// Value of the first `charset=` parameter in `s`, unquoted.
///
/// Works on a `Content-Type` header value as well as on the text of a
/// `<meta>` tag.
///
/// ```rust
/// use rolodex_core::parse::charset_param;
///
/// assert_eq!(charset_param("text/html; charset=\"Shift_JIS\""), Some("Shift_JIS"));
/// assert_eq!(charset_param("<meta charset=utf-8>"), Some("utf-8"));
/// assert_eq!(charset_param("text/html"), None);
/// ```
pub fn charset_param(s: &str) -> Option<&str> {
    const KEY: &[u8] = b"charset=";
    let start = s.as_bytes().windows(KEY.len()).position(|w| w.eq_ignore_ascii_case(KEY))? + KEY.len();
    let value = s[start..].trim_start_matches(['"', '\'', ' ']);
    let end = value
        .find(|c: char| matches!(c, '"' | '\'' | ';' | ',' | '/' | '>') || c.is_ascii_whitespace())
        .unwrap_or(value.len());
    Some(&value[..end]).filter(|label| !label.is_empty())
}

/// Decodes a response body into text.
///
/// The encoding is picked in this order:
///
/// 1. a byte order mark (UTF-8, UTF-16LE, UTF-16BE)
/// 2. the `charset` hint, usually taken from the `Content-Type` header
/// 3. a `<meta charset>` or `<meta http-equiv>` declaration near the top
/// 4. UTF-8 if the bytes are valid UTF-8
/// 5. windows-1252, the usual label of unmarked legacy pages
///
/// Unknown labels are ignored. Malformed sequences decode to U+FFFD.
///
/// # Errors
///
/// Returns [`ScrapeError::Parse`] when the body is empty, whitespace only,
/// or looks like binary data.
pub fn decode_body<'a>(body: &'a [u8], charset: Option<&str>) -> Result<Cow<'a, str>> {
    let (encoding, content) = match Encoding::for_bom(body) {
        Some((encoding, bom_len)) => (encoding, &body[bom_len..]),
        None => (sniff_encoding(body, charset), body),
    };

    if encoding.is_ascii_compatible() && looks_binary(content) {
        return Err(ScrapeError::Parse("document is not text (binary content)".to_string()));
    }

    let (text, had_errors) = encoding.decode_without_bom_handling(content);
    if had_errors {
        tracing::debug!(encoding = encoding.name(), "replaced malformed byte sequences");
    }
    if text.trim().is_empty() {
        return Err(ScrapeError::Parse("document is empty".to_string()));
    }
    Ok(text)
}

fn sniff_encoding(body: &[u8], charset: Option<&str>) -> &'static Encoding {
    charset
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .or_else(|| meta_charset(body))
        .unwrap_or_else(|| if std::str::from_utf8(body).is_ok() { UTF_8 } else { WINDOWS_1252 })
}

/// Charset declared by a `<meta>` tag in the first [`PRESCAN_LEN`] bytes.
///
/// A declared UTF-16 is read as UTF-8: a page without a BOM that could
/// spell out the declaration in ASCII is not UTF-16.
fn meta_charset(body: &[u8]) -> Option<&'static Encoding> {
    let head = String::from_utf8_lossy(&body[..body.len().min(PRESCAN_LEN)]).to_ascii_lowercase();
    let label = head.match_indices("<meta").find_map(|(start, _)| {
        let tag = &head[start..];
        charset_param(&tag[..tag.find('>').unwrap_or(tag.len())])
    })?;
    Encoding::for_label(label.as_bytes()).map(Encoding::output_encoding)
}

/// NUL bytes, or more than 10% control characters, mean "not text".
fn looks_binary(body: &[u8]) -> bool {
    let sample = &body[..body.len().min(SNIFF_LEN)];
    if sample.contains(&0) {
        return true;
    }

    let controls = sample
        .iter()
        .filter(|&&b| b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0C))
        .count();
    controls * 10 > sample.len()
}

/// Represents a parsed HTML document.
///
/// A Document owns the parsed tree. [`Element`]s borrowed from it, including
/// the card handles used during extraction, cannot outlive it.
///
/// # Example
///
/// ```rust
/// use rolodex_core::parse::Document;
///
/// let html = "<html><body><div class='card'><p>Hello</p></div></body></html>";
/// let doc = Document::parse(html).unwrap();
/// let card = &doc.select("div.card").unwrap()[0];
/// assert_eq!(card.select("p").unwrap()[0].normalized_text(), "Hello");
/// ```
pub struct Document {
    html: Html,
}

impl Document {
    /// Parses HTML from a string.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Parse`] when the string is empty or whitespace.
    pub fn parse(html: &str) -> Result<Self> {
        if html.trim().is_empty() {
            return Err(ScrapeError::Parse("document is empty".to_string()));
        }
        Ok(Self { html: Html::parse_document(html) })
    }

    /// Decodes and parses a raw response body with no charset hint.
    pub fn parse_bytes(body: &[u8]) -> Result<Self> {
        Self::parse_bytes_with_charset(body, None)
    }

    /// Decodes and parses a raw response body.
    ///
    /// `charset` is the label from the `Content-Type` header, if any. See
    /// [`decode_body`] for the decoding rules.
    pub fn parse_bytes_with_charset(body: &[u8], charset: Option<&str>) -> Result<Self> {
        let text = decode_body(body, charset)?;
        Self::parse(&text)
    }

    /// Returns elements matching `selector` in document order.
    ///
    /// With a `scope`, only descendants of that element are searched; the
    /// scope element itself never matches.
    pub fn query<'a>(&'a self, selector: &Selector, scope: Option<&Element<'a>>) -> Vec<Element<'a>> {
        match scope {
            Some(scope) => scope.element.select(selector).map(Element::from).collect(),
            None => self.html.select(selector).map(Element::from).collect(),
        }
    }

    /// First match of `selector` in document order, see [`Document::query`].
    pub fn query_first<'a>(&'a self, selector: &Selector, scope: Option<&Element<'a>>) -> Option<Element<'a>> {
        match scope {
            Some(scope) => scope.element.select(selector).next().map(Element::from),
            None => self.html.select(selector).next().map(Element::from),
        }
    }

    /// Selects elements using a CSS selector string.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Parse`] if the selector is invalid.
    ///
    /// # Example
    ///
    /// ```rust
    /// use rolodex_core::parse::Document;
    ///
    /// let html = r#"<p class="content">First</p><p class="content">Second</p>"#;
    /// let doc = Document::parse(html).unwrap();
    /// let elements = doc.select("p.content").unwrap();
    /// assert_eq!(elements.len(), 2);
    /// ```
    pub fn select(&'_ self, selector: &str) -> Result<Vec<Element<'_>>> {
        let sel = compile_selector(selector).map_err(|e| ScrapeError::Parse(format!("Invalid selector: {}", e)))?;
        Ok(self.query(&sel, None))
    }
}

/// A wrapper around scraper's ElementRef.
///
/// # Example
///
/// ```rust
/// use rolodex_core::parse::Document;
///
/// let html = r#"<a href="mailto:info@acme.test"> Acme   Ltd </a>"#;
/// let doc = Document::parse(html).unwrap();
/// let link = &doc.select("a").unwrap()[0];
///
/// assert_eq!(link.normalized_text(), "Acme Ltd");
/// assert_eq!(link.attr("href"), Some("mailto:info@acme.test"));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Element<'a> {
    element: scraper::ElementRef<'a>,
}

impl<'a> From<scraper::ElementRef<'a>> for Element<'a> {
    fn from(element: scraper::ElementRef<'a>) -> Self {
        Self { element }
    }
}

impl<'a> Element<'a> {
    /// Gets the inner HTML of this element.
    pub fn inner_html(&self) -> String {
        self.element.inner_html()
    }

    /// Gets the outer HTML of this element.
    pub fn outer_html(&self) -> String {
        self.element.html()
    }

    /// Gets the raw concatenation of all text nodes within this element.
    pub fn text(&self) -> String {
        self.element.text().collect()
    }

    /// Text with runs of whitespace collapsed to one space and trimmed.
    ///
    /// Text nodes are joined before collapsing, so `<b>Acme</b> Ltd` reads
    /// `Acme Ltd` and `Ac<b>me</b>` reads `Acme`.
    pub fn normalized_text(&self) -> String {
        let raw = self.text();
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Gets the value of an attribute.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.value().attr(name)
    }

    /// Gets the lowercase tag name.
    pub fn tag_name(&self) -> String {
        self.element.value().name().to_lowercase()
    }

    /// Selects descendant elements using a CSS selector string.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Parse`] if the selector is invalid.
    pub fn select(&self, selector: &str) -> Result<Vec<Element<'a>>> {
        let sel = compile_selector(selector).map_err(|e| ScrapeError::Parse(format!("Invalid selector: {}", e)))?;
        Ok(self.element.select(&sel).map(Element::from).collect())
    }
}
