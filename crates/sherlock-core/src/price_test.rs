use super::*;

// -----------------------------------------------------------------------
// extract_price_and_currency
// -----------------------------------------------------------------------

#[test]
fn swedish_kronor_with_space_grouping() {
    assert_eq!(
        extract_price_and_currency("19 990,00 kr", "SE").unwrap(),
        (1_999_000, "SEK".to_owned())
    );
}

#[test]
fn swedish_kronor_with_non_breaking_spaces() {
    assert_eq!(
        extract_price_and_currency("19\u{a0}990,00\u{a0}kr", "SE").unwrap(),
        (1_999_000, "SEK".to_owned())
    );
}

#[test]
fn euro_prefix_with_comma_grouping() {
    assert_eq!(
        extract_price_and_currency("€1,449.00", "NL").unwrap(),
        (144_900, "EUR".to_owned())
    );
}

#[test]
fn iso_prefix_passes_through() {
    assert_eq!(
        extract_price_and_currency("PLN 1,117.00", "PL").unwrap(),
        (111_700, "PLN".to_owned())
    );
}

#[test]
fn euro_suffix_with_dot_grouping() {
    assert_eq!(
        extract_price_and_currency("1.126,65 €", "DE").unwrap(),
        (112_665, "EUR".to_owned())
    );
}

#[test]
fn swiss_apostrophe_grouping() {
    assert_eq!(
        extract_price_and_currency("CHF 1'022.00", "CH").unwrap(),
        (102_200, "CHF".to_owned())
    );
}

#[test]
fn new_zealand_dollar_on_portuguese_page() {
    assert_eq!(
        extract_price_and_currency("NZ$1,248.99", "PT").unwrap(),
        (124_899, "NZD".to_owned())
    );
}

#[test]
fn three_digit_tail_groups_thousands() {
    assert_eq!(
        extract_price_and_currency("€1,449", "IE").unwrap(),
        (144_900, "EUR".to_owned())
    );
}

#[test]
fn zero_price_is_rejected() {
    let err = extract_price_and_currency("€0.00", "NL").unwrap_err();
    assert!(matches!(err, CoreError::ZeroPrice(_)));
    assert!(!err.is_page_fatal());
}

#[test]
fn text_without_digits_is_unparseable() {
    let err = extract_price_and_currency("Free", "NL").unwrap_err();
    assert!(matches!(err, CoreError::UnparseablePrice(_)));
}

#[test]
fn missing_currency_is_row_level() {
    let err = extract_price_and_currency("12,99", "NL").unwrap_err();
    assert!(matches!(err, CoreError::MissingCurrency(_)));
    assert!(!err.is_page_fatal());
}

#[test]
fn unmapped_symbol_is_page_fatal() {
    let err = extract_price_and_currency("19 990,00 kr", "NL").unwrap_err();
    assert!(err.is_page_fatal());
}

#[test]
fn leading_word_before_euro_suffix() {
    assert_eq!(
        extract_price_and_currency("ab 12,99 €", "DE").unwrap(),
        (1299, "EUR".to_owned())
    );
}

#[test]
fn leading_word_before_kronor_suffix() {
    assert_eq!(
        extract_price_and_currency("Från 19 990 kr", "SE").unwrap(),
        (1_999_000, "SEK".to_owned())
    );
}

#[test]
fn leading_word_before_iso_suffix() {
    assert_eq!(
        extract_price_and_currency("von 12,99 EUR", "DE").unwrap(),
        (1299, "EUR".to_owned())
    );
}

#[test]
fn trailing_words_after_euro_suffix() {
    assert_eq!(
        extract_price_and_currency("12,99 € inkl. MwSt.", "DE").unwrap(),
        (1299, "EUR".to_owned())
    );
}

#[test]
fn unknown_currency_names_the_token_next_to_the_number() {
    let err = extract_price_and_currency("ab 12,99 ₿", "DE").unwrap_err();
    assert_eq!(
        err,
        CoreError::UnknownCurrency {
            symbol: "₿".to_owned(),
            country: "DE".to_owned(),
        }
    );
    assert!(err.is_page_fatal());
}

// -----------------------------------------------------------------------
// parse_minor_units
// -----------------------------------------------------------------------

#[test]
fn plain_decimal_amount() {
    assert_eq!(parse_minor_units("1299.00").unwrap(), 129_900);
    assert_eq!(parse_minor_units("19.99").unwrap(), 1999);
    assert_eq!(parse_minor_units("7,5").unwrap(), 750);
}

#[test]
fn integer_amount() {
    assert_eq!(parse_minor_units("42").unwrap(), 4200);
}

#[test]
fn rounds_sub_cent_amounts() {
    assert_eq!(parse_minor_units("10.00499").unwrap(), 1000);
    assert_eq!(parse_minor_units("10.0051").unwrap(), 1001);
}

#[test]
fn empty_amount_is_an_error() {
    assert!(parse_minor_units("").is_err());
    assert!(parse_minor_units(",").is_err());
}

// -----------------------------------------------------------------------
// minor_units_from_amount
// -----------------------------------------------------------------------

#[test]
fn json_amount_to_minor_units() {
    assert_eq!(minor_units_from_amount(799.0).unwrap(), 79_900);
    assert_eq!(minor_units_from_amount(19.99).unwrap(), 1999);
    assert_eq!(minor_units_from_amount(1.234).unwrap(), 123);
}

#[test]
fn non_finite_amount_is_an_error() {
    assert!(minor_units_from_amount(f64::NAN).is_err());
}
