//! The one currency table every parser resolves symbols through.
//!
//! Rules are keyed by symbol and, where the symbol is ambiguous, by the
//! request country. A country-specific rule wins over a country-agnostic one.
//! Already-ISO three-letter codes pass through uppercased; anything else is an
//! error so a wrong currency never reaches the output silently.

use crate::CoreError;

/// Bumped whenever a rule is added, removed or changes meaning.
pub const CURRENCY_TABLE_VERSION: u32 = 3;

struct CurrencyRule {
    symbol: &'static str,
    country: Option<&'static str>,
    iso: &'static str,
}

const fn rule(symbol: &'static str, country: Option<&'static str>, iso: &'static str) -> CurrencyRule {
    CurrencyRule {
        symbol,
        country,
        iso,
    }
}

static RULES: &[CurrencyRule] = &[
    rule("kr", Some("SE"), "SEK"),
    rule("kr", Some("NO"), "NOK"),
    rule("kr", Some("DK"), "DKK"),
    rule("kr", Some("IS"), "ISK"),
    rule("kr.", Some("DK"), "DKK"),
    rule("kr.", Some("NO"), "NOK"),
    rule("€", None, "EUR"),
    rule("£", None, "GBP"),
    rule("$", None, "USD"),
    rule("US$", None, "USD"),
    rule("NZ$", None, "NZD"),
    rule("A$", None, "AUD"),
    rule("AU$", None, "AUD"),
    rule("CA$", None, "CAD"),
    rule("C$", None, "CAD"),
    rule("MX$", None, "MXN"),
    rule("Mex$", None, "MXN"),
    rule("R$", None, "BRL"),
    rule("₪", None, "ILS"),
    rule("₹", None, "INR"),
    rule("₩", None, "KRW"),
    rule("¥", Some("JP"), "JPY"),
    rule("¥", Some("CN"), "CNY"),
    rule("zł", None, "PLN"),
    rule("Kč", None, "CZK"),
    rule("Ft", None, "HUF"),
    rule("lei", None, "RON"),
    rule("Fr.", None, "CHF"),
    rule("Fr", None, "CHF"),
];

fn symbol_matches(rule_symbol: &str, symbol: &str) -> bool {
    rule_symbol == symbol || rule_symbol.to_lowercase() == symbol.to_lowercase()
}

/// Resolves a currency symbol or abbreviation to its ISO 4217 code.
///
/// # Errors
///
/// Returns [`CoreError::UnknownCurrency`] when the symbol is not in the table
/// for `country` and is not itself an ISO code.
pub fn resolve_currency(symbol: &str, country: &str) -> Result<String, CoreError> {
    let symbol = symbol.trim();
    if let Some(iso) = lookup_symbol(symbol, country) {
        return Ok(iso.to_owned());
    }

    normalize_iso_code(symbol).map_err(|_| CoreError::UnknownCurrency {
        symbol: symbol.to_owned(),
        country: country.to_ascii_uppercase(),
    })
}

/// Table-only lookup: no ISO pass-through.
#[must_use]
pub fn lookup_symbol(symbol: &str, country: &str) -> Option<&'static str> {
    let symbol = symbol.trim();
    let country = country.to_ascii_uppercase();

    RULES
        .iter()
        .find(|r| r.country == Some(country.as_str()) && symbol_matches(r.symbol, symbol))
        .or_else(|| {
            RULES
                .iter()
                .find(|r| r.country.is_none() && symbol_matches(r.symbol, symbol))
        })
        .map(|r| r.iso)
}

/// Validates a code that is supposed to already be ISO 4217 and uppercases it.
///
/// # Errors
///
/// Returns [`CoreError::UnknownCurrency`] if `code` is not three ASCII letters.
pub fn normalize_iso_code(code: &str) -> Result<String, CoreError> {
    let code = code.trim();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code.to_ascii_uppercase())
    } else {
        Err(CoreError::UnknownCurrency {
            symbol: code.to_owned(),
            country: String::new(),
        })
    }
}
