//! Idealo offers-page parser.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use sherlock_core::{extract_price_and_currency, Offer, StockStatus};

use super::rot47::decode_obfuscated;
use crate::error::ScraperError;
use crate::types::PageOutcome;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

static CAPTCHA: LazyLock<Selector> = LazyLock::new(|| selector("div.captcha"));
static OFFER_ITEMS: LazyLock<Selector> =
    LazyLock::new(|| selector("ul.productOffers-list li.productOffers-listItem"));
static PRICE_LINK: LazyLock<Selector> =
    LazyLock::new(|| selector("a.productOffers-listItemOfferPrice"));
static LEADOUT_LINK: LazyLock<Selector> =
    LazyLock::new(|| selector("a.productOffers-listItemOfferCtaLeadout"));
static TITLE: LazyLock<Selector> =
    LazyLock::new(|| selector("span.productOffers-listItemTitleInner"));
static SCRIPT: LazyLock<Selector> = LazyLock::new(|| selector("script"));
static GRAY_DELIVERY_ICON: LazyLock<Selector> = LazyLock::new(|| {
    selector(".productOffers-listItemOfferDelivery.delivery.delivery--circle.out")
});
static DELIVERY_STATUS: LazyLock<Selector> =
    LazyLock::new(|| selector(".productOffers-listItemOfferDeliveryStatus"));

const CONTENTS_CALL: &str = "idealoApp.getContents('";

/// "Check with the shop" phrasings next to a gray delivery icon, per market.
/// The soft hyphens are part of the rendered text.
const UNKNOWN_AVAILABILITY: &[&str] = &[
    "Voir site",
    "Veuillez v\u{e9}\u{ad}ri\u{ad}fier",
    "Se ren\u{ad}sei\u{ad}gner aupr\u{e8}s",
    "Con\u{ad}sul\u{ad}tar",
    "In\u{ad}for\u{ad}ma\u{ad}ci\u{f3}n no dis\u{ad}po\u{ad}ni\u{ad}ble",
    "Check",
    "Shop er\u{ad}fra\u{ad}gen",
    "Con\u{ad}trol\u{ad}la\u{ad}re di\u{ad}spo\u{ad}ni\u{ad}bi\u{ad}li\u{ad}t\u{e0}",
    "con\u{ad}tat\u{ad}ta\u{ad}re il ri\u{ad}ven\u{ad}di\u{ad}to\u{ad}re",
];

#[derive(Debug, Deserialize)]
struct GtmPayload {
    shop_name: Option<String>,
}

/// Parses one Idealo offers page.
///
/// `origin` is the market's site origin; leadout links are relative to it.
///
/// # Errors
///
/// - [`ScraperError::Blocked`] on a captcha page.
/// - [`ScraperError::ParseMismatch`] when an offer lacks its title element or
///   the obfuscated title cannot be located.
/// - [`ScraperError::Deserialize`] when the tracking payload is not JSON.
/// - [`ScraperError::Normalize`] on an unmapped currency.
pub fn parse_offers_page(
    html: &str,
    country: &str,
    origin: &str,
) -> Result<PageOutcome, ScraperError> {
    let offer_source = format!("idealo_{country}");
    let document = Html::parse_document(html);

    if document.select(&CAPTCHA).next().is_some() {
        return Err(ScraperError::blocked(&offer_source, "captcha page"));
    }

    let mut items = document.select(&OFFER_ITEMS).peekable();
    if items.peek().is_none() {
        return Ok(PageOutcome::Empty);
    }

    let mut offers = Vec::new();
    for item in items {
        let (Some(price_link), Some(leadout)) = (
            item.select(&PRICE_LINK).next(),
            item.select(&LEADOUT_LINK).next(),
        ) else {
            continue;
        };

        let retail_prod_name = product_name(item, &offer_source)?;

        let price_text: String = price_link.text().collect();
        let (price, currency) = match extract_price_and_currency(price_text.trim(), country) {
            Ok(parsed) => parsed,
            Err(e) if e.is_page_fatal() => return Err(e.into()),
            Err(e) => {
                tracing::warn!(country, price_text = %price_text.trim(), error = %e, "skipping offer row");
                continue;
            }
        };

        let payload_raw = price_link.value().attr("data-gtm-payload").unwrap_or("{}");
        let payload: GtmPayload =
            serde_json::from_str(payload_raw).map_err(|e| ScraperError::Deserialize {
                context: format!("{offer_source} data-gtm-payload"),
                source: e,
            })?;
        let offer_url = format!("{origin}{}", leadout.value().attr("href").unwrap_or_default());
        let Some(retailer_name) = payload.shop_name.filter(|name| !name.trim().is_empty()) else {
            tracing::warn!(offer_url = %offer_url, retail_prod_name = %retail_prod_name, "retailer name is empty");
            continue;
        };

        offers.push(Offer {
            offer_source: offer_source.clone(),
            offer_url,
            retail_prod_name,
            retailer_name,
            country: country.to_owned(),
            price,
            currency,
            stock_status: stock_status(item),
            metadata: None,
        });
    }

    Ok(PageOutcome::Offers(offers))
}

/// The `title` attribute when present; otherwise the title is rendered by a
/// script from an obfuscated string.
fn product_name(item: ElementRef<'_>, offer_source: &str) -> Result<String, ScraperError> {
    let title = item
        .select(&TITLE)
        .next()
        .ok_or_else(|| ScraperError::parse_mismatch(offer_source, "offer without title element"))?;

    if let Some(name) = title.value().attr("title") {
        return Ok(name.to_owned());
    }

    let script: String = title
        .select(&SCRIPT)
        .next()
        .map(|s| s.text().collect())
        .unwrap_or_default();
    let ciphertext = script
        .find(CONTENTS_CALL)
        .map(|idx| &script[idx + CONTENTS_CALL.len()..])
        .and_then(|rest| rest.find("');").map(|end| &rest[..end]))
        .ok_or_else(|| {
            ScraperError::parse_mismatch(offer_source, "obfuscated title script not found")
        })?;

    // The decoded title may still carry markup.
    let decoded = decode_obfuscated(ciphertext);
    let fragment = Html::parse_fragment(&decoded);
    Ok(fragment.root_element().text().collect::<String>().trim().to_owned())
}

/// A gray delivery icon means out of stock unless the status text asks the
/// shopper to check with the shop.
fn stock_status(item: ElementRef<'_>) -> StockStatus {
    if item.select(&GRAY_DELIVERY_ICON).next().is_none() {
        return StockStatus::InStock;
    }
    let status_text: String = item
        .select(&DELIVERY_STATUS)
        .next()
        .map(|s| s.text().collect())
        .unwrap_or_default();
    if UNKNOWN_AVAILABILITY
        .iter()
        .any(|phrase| status_text.contains(phrase))
    {
        StockStatus::Unknown
    } else {
        StockStatus::OutOfStock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sherlock_core::CoreError;

    const UNMAPPED_CURRENCY: &str =
        include_str!("../../../tests/fixtures/idealo/unmapped_currency_de.html");

    #[test]
    fn unmapped_currency_aborts_the_whole_page() {
        let err = parse_offers_page(UNMAPPED_CURRENCY, "DE", "https://www.idealo.de").unwrap_err();
        assert!(matches!(
            err,
            ScraperError::Normalize(CoreError::UnknownCurrency { ref symbol, .. }) if symbol == "฿"
        ));
    }

    #[test]
    fn zero_price_row_is_skipped_without_aborting() {
        let html = UNMAPPED_CURRENCY.replace("29.900,00&nbsp;฿", "899,00&nbsp;€");
        let PageOutcome::Offers(offers) =
            parse_offers_page(&html, "DE", "https://www.idealo.de").unwrap()
        else {
            panic!("expected offers");
        };
        let prices: Vec<(&str, i64)> = offers
            .iter()
            .map(|o| (o.retailer_name.as_str(), o.price))
            .collect();
        assert_eq!(prices, vec![("MediaMarkt", 69_900), ("Power Buy", 89_900)]);
    }

    #[test]
    fn captcha_page_is_blocked() {
        let html = r#"<html><body><div class="captcha">Are you human?</div></body></html>"#;
        let err = parse_offers_page(html, "DE", "https://www.idealo.de").unwrap_err();
        assert!(matches!(err, ScraperError::Blocked { .. }));
    }

    #[test]
    fn page_without_offer_list_is_empty() {
        let html = "<html><body><h1>Keine Angebote</h1></body></html>";
        assert_eq!(
            parse_offers_page(html, "DE", "https://www.idealo.de").unwrap(),
            PageOutcome::Empty
        );
    }

    #[test]
    fn gray_icon_with_check_phrase_is_unknown() {
        let html = r#"<ul><li class="item">
            <span class="productOffers-listItemOfferDelivery delivery delivery--circle out"></span>
            <span class="productOffers-listItemOfferDeliveryStatus">Shop er&shy;fra&shy;gen</span>
            </li></ul>"#;
        let fragment = Html::parse_fragment(html);
        let item = fragment.select(&selector("li.item")).next().unwrap();
        assert_eq!(stock_status(item), StockStatus::Unknown);
    }

    #[test]
    fn gray_icon_without_phrase_is_out_of_stock() {
        let html = r#"<ul><li class="item">
            <span class="productOffers-listItemOfferDelivery delivery delivery--circle out"></span>
            <span class="productOffers-listItemOfferDeliveryStatus">Nicht lieferbar</span>
            </li></ul>"#;
        let fragment = Html::parse_fragment(html);
        let item = fragment.select(&selector("li.item")).next().unwrap();
        assert_eq!(stock_status(item), StockStatus::OutOfStock);
    }
}
