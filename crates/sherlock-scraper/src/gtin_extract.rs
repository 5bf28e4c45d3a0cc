//! Page-level GTIN extraction, tried in order of reliability: schema.org
//! JSON-LD, keyword regex, `itemprop` meta tag, then a literal search for the
//! code the caller expects. Every result is normalized to 14 digits.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use sherlock_core::normalise_gtin14;

static JSONLD_SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]+type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("valid regex")
});

// Up to five characters between keyword and number so `"gtin13": "..."` matches.
static KEYWORD_GTIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:upc|ean|gtin).{1,5}?(\d{12,14})").expect("valid regex"));

static GTIN13_META: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[itemprop='gtin13']").expect("valid selector"));

const SCHEMA_GTIN_KEYS: [&str; 4] = ["gtin", "gtin12", "gtin13", "gtin14"];

/// Runs every extractor over a retailer page and returns the first GTIN
/// found.
///
/// The literal fallback only fires for `expected_gtin`; a literal hit on
/// `expected_sku` is logged but yields nothing, since a SKU is not a GTIN.
#[must_use]
pub fn find_gtin_in_html(
    html: &str,
    expected_gtin: Option<&str>,
    expected_sku: Option<&str>,
) -> Option<String> {
    if let Some(gtin) = extract_gtin_from_schema_org(html) {
        tracing::debug!(gtin = %gtin, method = "schema.org", "found gtin");
        return Some(gtin);
    }
    if let Some(gtin) = extract_gtin_from_regex(html) {
        tracing::debug!(gtin = %gtin, method = "regex", "found gtin");
        return Some(gtin);
    }
    if let Some(gtin) = extract_gtin_from_meta(html) {
        tracing::debug!(gtin = %gtin, method = "meta", "found gtin");
        return Some(gtin);
    }

    let literal = expected_gtin.and_then(|gtin| search_literal(html, gtin));
    if let Some(gtin) = &literal {
        tracing::debug!(gtin = %gtin, method = "literal", "found expected gtin in page");
    }

    if let Some(sku) = expected_sku.and_then(|sku| search_literal(html, sku)) {
        tracing::info!(sku, "found expected sku in page");
    }

    literal.and_then(|gtin| normalise_gtin14(&gtin))
}

/// GTIN of the first schema.org `Product` object carrying a 12-14 character
/// `gtin`, `gtin12`, `gtin13` or `gtin14` field.
#[must_use]
pub fn extract_gtin_from_schema_org(html: &str) -> Option<String> {
    for cap in JSONLD_SCRIPT_RE.captures_iter(html) {
        let Some(json_text) = cap.get(1) else {
            continue;
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(json_text.as_str()) else {
            continue;
        };

        let mut candidates = match value {
            serde_json::Value::Array(items) => items,
            other => vec![other],
        };
        let graph: Vec<serde_json::Value> = candidates
            .iter()
            .filter_map(|item| item.get("@graph").and_then(serde_json::Value::as_array))
            .flatten()
            .cloned()
            .collect();
        candidates.extend(graph);

        for item in candidates.iter().filter(|item| is_product(item)) {
            let Some(raw) = SCHEMA_GTIN_KEYS
                .iter()
                .find_map(|key| item.get(*key))
                .and_then(json_scalar_to_string)
            else {
                continue;
            };
            // Sites put SKUs and article numbers in this field too.
            if !(12..=14).contains(&raw.len()) {
                continue;
            }
            return normalise_gtin14(&raw);
        }
    }
    None
}

/// Single GTIN-looking number next to a `upc`/`ean`/`gtin` keyword. Two or
/// more distinct candidates are ambiguous and yield `None`.
#[must_use]
pub fn extract_gtin_from_regex(html: &str) -> Option<String> {
    let candidates: BTreeSet<&str> = KEYWORD_GTIN_RE
        .captures_iter(html)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str()))
        .collect();

    match candidates.len() {
        0 => None,
        1 => candidates.into_iter().next().and_then(normalise_gtin14),
        n => {
            tracing::warn!(candidates = n, "multiple gtins found using regex");
            None
        }
    }
}

/// `content` of the first `<meta itemprop="gtin13">`.
#[must_use]
pub fn extract_gtin_from_meta(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&GTIN13_META)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .and_then(|content| normalise_gtin14(content.trim()))
}

/// `needle` when it occurs verbatim anywhere in `html`.
#[must_use]
pub fn search_literal(html: &str, needle: &str) -> Option<String> {
    (!needle.is_empty() && html.contains(needle)).then(|| needle.to_owned())
}

fn is_product(item: &serde_json::Value) -> bool {
    match item.get("@type") {
        Some(serde_json::Value::String(t)) => t == "Product",
        Some(serde_json::Value::Array(types)) => types.iter().any(|t| t == "Product"),
        _ => false,
    }
}

fn json_scalar_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.trim().to_owned()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
