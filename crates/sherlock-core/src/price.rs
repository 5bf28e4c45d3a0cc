//! Locale-aware price parsing.
//!
//! Price strings come in many shapes across sources and countries:
//! `"19 990,00 kr"`, `"€1,449.00"`, `"PLN 1,117.00"`, `"CHF 1'022.00"`.
//! [`extract_price_and_currency`] splits the text into the numeric span and the
//! currency marker next to it, decides which separator is the decimal one, and
//! returns the amount in minor units.

use std::str::FromStr;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::currency::{lookup_symbol, resolve_currency};
use crate::CoreError;

/// Whitespace characters that appear inside formatted prices.
const SPACE_LIKE: [char; 4] = ['\u{a0}', '\u{202f}', '\u{2009}', '\u{2007}'];

/// Parses a formatted price into `(minor_units, iso_currency)`.
///
/// # Errors
///
/// - [`CoreError::UnparseablePrice`] / [`CoreError::ZeroPrice`] /
///   [`CoreError::MissingCurrency`] for row-level noise; callers skip the row.
/// - [`CoreError::UnknownCurrency`] when the marker is not in the currency
///   table; callers abort the page (see [`CoreError::is_page_fatal`]).
pub fn extract_price_and_currency(
    price_text: &str,
    country: &str,
) -> Result<(i64, String), CoreError> {
    let normalized: String = price_text
        .chars()
        .filter(|c| *c != '\'' && *c != '’')
        .map(|c| if SPACE_LIKE.contains(&c) { ' ' } else { c })
        .collect();

    let (start, end) =
        numeric_span(&normalized).ok_or_else(|| CoreError::UnparseablePrice(price_text.to_owned()))?;

    let currency = currency_marker(price_text, &normalized[..start], &normalized[end..], country)?;
    let amount = parse_minor_units(&normalized[start..end])
        .map_err(|_| CoreError::UnparseablePrice(price_text.to_owned()))?;
    if amount == 0 {
        return Err(CoreError::ZeroPrice(price_text.to_owned()));
    }

    Ok((amount, currency))
}

/// Picks the currency from the tokens on either side of the number, so a
/// leading word as in `"ab 12,99 €"` is skipped. A table symbol wins, then an
/// uppercase ISO code, then anything [`resolve_currency`] accepts. When
/// nothing resolves, the error names the token nearest the number, preferring
/// a symbol over a word when both are equally close.
fn currency_marker(
    price_text: &str,
    before: &str,
    after: &str,
    country: &str,
) -> Result<String, CoreError> {
    let leading = before.split_whitespace().last();
    let trailing = after.split_whitespace().next();
    let candidates: Vec<&str> = [leading, trailing].into_iter().flatten().collect();

    if let Some(iso) = candidates.iter().find_map(|t| lookup_symbol(t, country)) {
        return Ok(iso.to_owned());
    }
    let iso_like = candidates
        .iter()
        .find(|t| t.len() == 3 && t.chars().all(|c| c.is_ascii_uppercase()));
    if let Some(code) = iso_like {
        return Ok((*code).to_owned());
    }
    if let Some(iso) = candidates.iter().find_map(|t| resolve_currency(t, country).ok()) {
        return Ok(iso);
    }

    let gap_before = before.len() - before.trim_end().len();
    let gap_after = after.len() - after.trim_start().len();
    let is_word = |t: &str| t.chars().all(char::is_alphabetic);
    let nearest = match (leading, trailing) {
        (Some(l), Some(t))
            if gap_after < gap_before
                || (gap_after == gap_before && is_word(l) && !is_word(t)) =>
        {
            t
        }
        (Some(token), _) | (None, Some(token)) => token,
        (None, None) => return Err(CoreError::MissingCurrency(price_text.to_owned())),
    };
    Err(CoreError::UnknownCurrency {
        symbol: nearest.to_owned(),
        country: country.to_ascii_uppercase(),
    })
}

/// Converts a bare amount such as `"1.126,65"`, `"19 990,00"` or `"1299.00"`
/// into minor units: `round(amount * 100)`.
///
/// # Errors
///
/// Returns [`CoreError::UnparseablePrice`] if no number can be read.
pub fn parse_minor_units(raw: &str) -> Result<i64, CoreError> {
    let canonical =
        canonical_decimal(raw).ok_or_else(|| CoreError::UnparseablePrice(raw.to_owned()))?;
    let amount =
        Decimal::from_str(&canonical).map_err(|_| CoreError::UnparseablePrice(raw.to_owned()))?;
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| CoreError::UnparseablePrice(raw.to_owned()))
}

/// Converts an amount that arrived as a JSON number into minor units.
///
/// # Errors
///
/// Returns [`CoreError::UnparseablePrice`] for non-finite amounts.
pub fn minor_units_from_amount(amount: f64) -> Result<i64, CoreError> {
    Decimal::from_f64(amount)
        .and_then(|d| (d * Decimal::ONE_HUNDRED).round().to_i64())
        .ok_or_else(|| CoreError::UnparseablePrice(amount.to_string()))
}

/// Byte range of the first number in `text`, including grouping spaces
/// that sit between digits.
fn numeric_span(text: &str) -> Option<(usize, usize)> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let mut end = start;
    let mut chars = text[start..].char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        let next_is_digit = chars.peek().is_some_and(|(_, n)| n.is_ascii_digit());
        let keep = c.is_ascii_digit() || ((c == '.' || c == ',' || c == ' ') && next_is_digit);
        if !keep {
            break;
        }
        end = start + offset + c.len_utf8();
    }

    Some((start, end))
}

/// Rewrites a locale-formatted number to `digits[.digits]`.
///
/// The last `.` or `,` is the decimal separator unless it is followed by
/// exactly three digits and is either the only separator or repeated
/// (`"1,449"`, `"1.234.567"`), in which case it groups thousands.
fn canonical_decimal(raw: &str) -> Option<String> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if !compact.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let Some(sep_idx) = compact.rfind(['.', ',']) else {
        return Some(compact);
    };

    let sep = &compact[sep_idx..=sep_idx];
    let integer_part = &compact[..sep_idx];
    let fraction = &compact[sep_idx + 1..];
    let other_sep = if sep == "." { ',' } else { '.' };

    let groups_thousands = fraction.len() == 3
        && (integer_part.contains(sep) || !integer_part.contains(other_sep));

    let integer_digits: String = integer_part.chars().filter(char::is_ascii_digit).collect();
    if groups_thousands || fraction.is_empty() {
        return Some(format!("{integer_digits}{fraction}"));
    }

    let integer_digits = if integer_digits.is_empty() {
        "0".to_owned()
    } else {
        integer_digits
    };
    Some(format!("{integer_digits}.{fraction}"))
}

#[cfg(test)]
#[path = "price_test.rs"]
mod tests;
