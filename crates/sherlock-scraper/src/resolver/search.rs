//! Extraction from the Google pages the resolver walks: shopping search
//! results, offer tables, variant pickers and product images.

use std::sync::LazyLock;

use scraper::{Html, Selector};

use crate::client::{last_path_segment, query_param};

/// Product candidates considered per search.
pub const MAX_CANDIDATES: usize = 12;

const NEW_WINDOW_LABEL: &str = "Opens in a new window";
const PRODUCT_PATH: &str = "/shopping/product/";

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

static RESULT_LINKS: LazyLock<Selector> = LazyLock::new(|| selector("a.Lq5OHe"));
static AD_LINKS: LazyLock<Selector> = LazyLock::new(|| selector("a[data-offer-id]"));
static OFFER_ROW_LINKS: LazyLock<Selector> =
    LazyLock::new(|| selector("tr.sh-osd__offer-row a.b5ycib"));
static VARIANT_LINKS: LazyLock<Selector> = LazyLock::new(|| selector("a.sh-dvc__item"));
static PRODUCT_IMAGE: LazyLock<Selector> = LazyLock::new(|| selector("img.r4m4nf"));
static SINGLE_OFFER_IMAGE: LazyLock<Selector> =
    LazyLock::new(|| selector("img.sh-div__image.sh-div__current"));

/// Product ids linked from a shopping search page, in page order, capped at
/// [`MAX_CANDIDATES`]. Links straight to seller sites are ignored.
#[must_use]
pub fn candidate_product_ids(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&RESULT_LINKS)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| {
            let (_, rest) = href.split_once(PRODUCT_PATH)?;
            let id = rest.split(['?', '#']).next().unwrap_or(rest);
            (!id.is_empty()).then(|| id.to_owned())
        })
        .take(MAX_CANDIDATES)
        .collect()
}

/// Sponsored links on a search page; site-relative links get the Google host.
#[must_use]
pub fn ad_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&AD_LINKS)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| {
            if href.starts_with('/') {
                format!("www.google.com{href}")
            } else {
                href.to_owned()
            }
        })
        .collect()
}

/// `(retailer, redirect href)` of every offer row, one entry per retailer.
/// A repeated retailer keeps its first position and its last link.
#[must_use]
pub fn retailer_offer_links(html: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(html);
    let mut links: Vec<(String, String)> = Vec::new();
    for anchor in document.select(&OFFER_ROW_LINKS) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let retailer = anchor
            .text()
            .collect::<String>()
            .replace(NEW_WINDOW_LABEL, "")
            .trim()
            .to_owned();
        match links.iter_mut().find(|(name, _)| *name == retailer) {
            Some(entry) => entry.1 = href.to_owned(),
            None => links.push((retailer, href.to_owned())),
        }
    }
    links
}

/// The retailer landing page behind a Google redirect link (`q` parameter).
#[must_use]
pub fn retailer_url(redirect_href: &str) -> Option<String> {
    query_param(redirect_href, "q").filter(|url| !url.is_empty())
}

/// Ids of the variant siblings listed on a product page, in page order.
#[must_use]
pub fn variant_ids(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut ids: Vec<String> = Vec::new();
    for href in document
        .select(&VARIANT_LINKS)
        .filter_map(|a| a.value().attr("href"))
    {
        if let Some(id) = last_path_segment(href) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

/// Image `src` of a product offers page or, for composite ids, of a
/// single-offer page.
#[must_use]
pub fn product_image(html: &str, single_offer: bool) -> Option<String> {
    let document = Html::parse_document(html);
    let image_selector: &Selector = if single_offer {
        &SINGLE_OFFER_IMAGE
    } else {
        &PRODUCT_IMAGE
    };
    document
        .select(image_selector)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_skip_seller_links_and_strip_query() {
        let html = r#"
            <a class="Lq5OHe" href="/shopping/product/2336121681419728525?q=05400653007411&hl=en">A</a>
            <a class="Lq5OHe" href="https://www.seller.example/item/1">B</a>
            <a class="Lq5OHe" href="/shopping/product/4918233076384419044?hl=en">C</a>
        "#;
        assert_eq!(
            candidate_product_ids(html),
            vec!["2336121681419728525", "4918233076384419044"]
        );
    }

    #[test]
    fn candidates_are_capped() {
        let html: String = (0..20)
            .map(|i| format!(r#"<a class="Lq5OHe" href="/shopping/product/{i}">p</a>"#))
            .collect();
        assert_eq!(candidate_product_ids(&html).len(), MAX_CANDIDATES);
    }

    #[test]
    fn relative_ad_links_get_google_host() {
        let html = r#"
            <a data-offer-id="1" href="/aclk?sa=l&amp;ai=1">ad</a>
            <a data-offer-id="2" href="https://shop.example/p">ad</a>
        "#;
        assert_eq!(
            ad_links(html),
            vec!["www.google.com/aclk?sa=l&ai=1", "https://shop.example/p"]
        );
    }

    #[test]
    fn offer_rows_strip_new_window_label_and_dedupe() {
        let html = r#"<table>
            <tr class="sh-osd__offer-row"><td><a class="b5ycib" href="/url?q=https://a.example/1">Alpha<span>Opens in a new window</span></a></td></tr>
            <tr class="sh-osd__offer-row"><td><a class="b5ycib" href="/url?q=https://b.example/1">Beta</a></td></tr>
            <tr class="sh-osd__offer-row"><td><a class="b5ycib" href="/url?q=https://a.example/2">Alpha</a></td></tr>
        </table>"#;
        assert_eq!(
            retailer_offer_links(html),
            vec![
                ("Alpha".to_owned(), "/url?q=https://a.example/2".to_owned()),
                ("Beta".to_owned(), "/url?q=https://b.example/1".to_owned()),
            ]
        );
    }

    #[test]
    fn retailer_url_comes_from_q_param() {
        assert_eq!(
            retailer_url("/url?q=https://shop.example/p%3Fid%3D7&sa=U").as_deref(),
            Some("https://shop.example/p?id=7")
        );
        assert_eq!(retailer_url("/url?sa=U"), None);
    }

    #[test]
    fn variant_ids_from_last_path_segment() {
        let html = r#"
            <a class="sh-dvc__item" href="/shopping/product/111?hl=en">S</a>
            <a class="sh-dvc__item" href="/shopping/product/222?hl=en">M</a>
            <a class="sh-dvc__item" href="/shopping/product/111?hl=en&gl=se">S</a>
        "#;
        assert_eq!(variant_ids(html), vec!["111", "222"]);
    }

    #[test]
    fn single_offer_image_uses_its_own_selector() {
        let html = r#"<img class="sh-div__image sh-div__current" src="https://img.example/1.jpg">
                      <img class="r4m4nf" src="https://img.example/2.jpg">"#;
        assert_eq!(
            product_image(html, true).as_deref(),
            Some("https://img.example/1.jpg")
        );
        assert_eq!(
            product_image(html, false).as_deref(),
            Some("https://img.example/2.jpg")
        );
    }
}
