//! GTIN / EAN conversions.

use crate::CoreError;

/// Converts a GTIN to its EAN-13 form.
///
/// GTIN-14 drops its leading indicator digit, GTIN-13 passes through and
/// shorter codes are zero-left-padded to 13 characters.
///
/// # Errors
///
/// Returns [`CoreError::InvalidGtin`] for inputs longer than 14 characters.
pub fn gtin_to_ean(gtin: &str) -> Result<String, CoreError> {
    match gtin.chars().count() {
        14 => Ok(gtin.chars().skip(1).collect()),
        13 => Ok(gtin.to_owned()),
        n if n < 13 => Ok(format!("{gtin:0>13}")),
        _ => Err(CoreError::InvalidGtin(gtin.to_owned())),
    }
}

/// Left-pads a GTIN with zeros to 14 digits. Empty input yields `None`.
#[must_use]
pub fn normalise_gtin14(gtin: &str) -> Option<String> {
    let trimmed = gtin.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(format!("{trimmed:0>14}"))
}
