//! Google Shopping offer-page parser.
//!
//! Two DOM dialects of the offers page are known. The product title element
//! tells them apart; everything after that is driven by the selectors of the
//! detected [`Layout`].

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use sherlock_core::{extract_price_and_currency, Offer, StockStatus};

use crate::error::ScraperError;
use crate::types::PageOutcome;

const GOOGLE_ORIGIN: &str = "https://www.google.com";

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

static CONSENT_BUTTON: LazyLock<Selector> = LazyLock::new(|| {
    selector(r#"form[action="https://consent.google.com/s"] button.VfPpkd-LgbsSe"#)
});
static NOT_FOUND: LazyLock<Selector> = LazyLock::new(|| selector(".product-not-found"));
static BODY_ELEMENTS: LazyLock<Selector> = LazyLock::new(|| selector("body *"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector("title"));
static PRODUCT_IMAGE: LazyLock<Selector> = LazyLock::new(|| selector("img.r4m4nf"));

static TABLE_TITLE: LazyLock<Selector> = LazyLock::new(|| selector("div.f0t7kf"));
static TABLE_ROWS: LazyLock<Selector> =
    LazyLock::new(|| selector("table.dOwBOc tr.sh-osd__offer-row"));
static TABLE_PRICE: LazyLock<Selector> = LazyLock::new(|| selector(".drzWO"));
static TABLE_ANCHOR: LazyLock<Selector> = LazyLock::new(|| selector("a.b5ycib"));

static CARDS_TITLE: LazyLock<Selector> = LazyLock::new(|| selector("div.MPhl6c"));
static CARDS_ROWS: LazyLock<Selector> = LazyLock::new(|| selector("div.Nq7DI div.MVQv4e"));
static CARDS_PRICE: LazyLock<Selector> =
    LazyLock::new(|| selector("div.DX0ugf div.xwW5Ce div.DX0ugf span.Lhpu7d"));
static CARDS_ANCHOR: LazyLock<Selector> = LazyLock::new(|| selector("a.ueI0Ed"));

/// Known offer-page layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `table.dOwBOc` rows with relative `/aclk` redirect links.
    Table,
    /// `div.Nq7DI` cards with absolute links.
    Cards,
}

struct LayoutSelectors {
    title: &'static LazyLock<Selector>,
    rows: &'static LazyLock<Selector>,
    price: &'static LazyLock<Selector>,
    anchor: &'static LazyLock<Selector>,
    relative_links: bool,
}

impl Layout {
    fn selectors(self) -> LayoutSelectors {
        match self {
            Layout::Table => LayoutSelectors {
                title: &TABLE_TITLE,
                rows: &TABLE_ROWS,
                price: &TABLE_PRICE,
                anchor: &TABLE_ANCHOR,
                relative_links: true,
            },
            Layout::Cards => LayoutSelectors {
                title: &CARDS_TITLE,
                rows: &CARDS_ROWS,
                price: &CARDS_PRICE,
                anchor: &CARDS_ANCHOR,
                relative_links: false,
            },
        }
    }

    /// Probes the title element of each layout.
    fn detect(document: &Html) -> Option<(Layout, String)> {
        [Layout::Table, Layout::Cards].into_iter().find_map(|layout| {
            document
                .select(layout.selectors().title)
                .next()
                .map(|title| (layout, title.text().collect::<String>()))
        })
    }
}

/// Parses one offers page for `country`.
///
/// # Errors
///
/// - [`ScraperError::Blocked`] on the cookie-consent interstitial.
/// - [`ScraperError::ParseMismatch`] when no known layout matches or a priced
///   row has no retailer link.
/// - [`ScraperError::Normalize`] when a price carries an unmapped currency.
pub fn parse_offer_page(html: &str, country: &str) -> Result<PageOutcome, ScraperError> {
    let offer_source = format!("google_shopping_{country}");
    let document = Html::parse_document(html);

    if document.select(&CONSENT_BUTTON).next().is_some() {
        return Err(ScraperError::blocked(&offer_source, "cookie consent page"));
    }

    if document.select(&NOT_FOUND).next().is_some() {
        return Ok(PageOutcome::NotFound);
    }

    if is_blank(&document) || is_server_error(&document) {
        return Ok(PageOutcome::Empty);
    }

    let Some((layout, product_name)) = Layout::detect(&document) else {
        tracing::error!(
            country,
            div_mphl6c_exist = document.select(&CARDS_TITLE).next().is_some(),
            "cannot extract product name, unknown google shopping layout"
        );
        return Err(ScraperError::parse_mismatch(
            &offer_source,
            "no known offer-page layout",
        ));
    };
    let selectors = layout.selectors();

    let metadata = document
        .select(&PRODUCT_IMAGE)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(|src| serde_json::json!({ "images": [src] }));

    let mut offers = Vec::new();
    for row in document.select(selectors.rows) {
        // Ads and placeholder rows have no price.
        let Some(price_el) = row.select(selectors.price).next() else {
            continue;
        };
        let price_text: String = price_el.text().collect();

        let (price, currency) = match extract_price_and_currency(&price_text, country) {
            Ok(parsed) => parsed,
            Err(e) if e.is_page_fatal() => return Err(e.into()),
            Err(e) => {
                tracing::warn!(country, price_text = %price_text, error = %e, "skipping offer row");
                continue;
            }
        };

        let anchor = row.select(selectors.anchor).next().ok_or_else(|| {
            ScraperError::parse_mismatch(&offer_source, "offer row without retailer link")
        })?;
        let href = anchor.value().attr("href").unwrap_or_default();
        let offer_url = if selectors.relative_links {
            format!("{GOOGLE_ORIGIN}{href}")
        } else {
            href.to_owned()
        };

        offers.push(Offer {
            offer_source: offer_source.clone(),
            offer_url,
            retail_prod_name: product_name.clone(),
            retailer_name: first_child_text(anchor),
            country: country.to_owned(),
            price,
            currency,
            stock_status: StockStatus::InStock,
            metadata: metadata.clone(),
        });
    }

    tracing::debug!(country, ?layout, offers = offers.len(), "parsed offer page");
    Ok(PageOutcome::Offers(offers))
}

/// Text of the first child node of `anchor`, which holds the merchant name
/// ahead of any badges or icons.
fn first_child_text(anchor: ElementRef<'_>) -> String {
    let Some(child) = anchor.first_child() else {
        return String::new();
    };
    if let Some(text) = child.value().as_text() {
        return text.trim().to_owned();
    }
    ElementRef::wrap(child)
        .map(|el| el.text().collect::<String>().trim().to_owned())
        .unwrap_or_default()
}

fn is_blank(document: &Html) -> bool {
    document.select(&BODY_ELEMENTS).next().is_none()
        && document.root_element().text().all(|t| t.trim().is_empty())
}

fn is_server_error(document: &Html) -> bool {
    let title: String = document
        .select(&TITLE)
        .next()
        .map(|t| t.text().collect())
        .unwrap_or_default();
    title.trim_start().starts_with("Error") || title.contains("Server Error")
}
