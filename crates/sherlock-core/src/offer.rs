use serde::{Deserialize, Serialize};

/// One merchant's listing for a product on one price-comparison source and
/// country, normalized across all sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    /// Provenance tag, e.g. `"google_shopping_NL"` or bare `"kuantokusta"`.
    pub offer_source: String,
    /// Absolute URL of the retailer checkout or redirect link.
    pub offer_url: String,
    pub retail_prod_name: String,
    pub retailer_name: String,
    /// ISO country code the offer applies to.
    pub country: String,
    /// Amount in minor currency units (cents, öre, ...).
    pub price: i64,
    /// ISO 4217 code, uppercase.
    pub currency: String,
    pub stock_status: StockStatus,
    /// Source-dependent extras: description, brand, category, images, specs.
    pub metadata: Option<serde_json::Value>,
}

impl Offer {
    /// Returns `true` when the offer satisfies the shape every published
    /// offer must have. Anything else is parsing noise and gets dropped.
    #[must_use]
    pub fn is_publishable(&self) -> bool {
        !self.offer_source.is_empty()
            && !self.offer_url.is_empty()
            && !self.retailer_name.trim().is_empty()
            && self.price >= 1
            && self.currency.len() == 3
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    OutOfStock,
    Unknown,
}

impl StockStatus {
    /// Looks up a source-specific availability value in an explicit mapping
    /// table. `None` means the value is not in the table.
    #[must_use]
    pub fn lookup(table: &[(&str, StockStatus)], raw: &str) -> Option<StockStatus> {
        table
            .iter()
            .find(|(key, _)| *key == raw)
            .map(|(_, status)| *status)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StockStatus::InStock => "in_stock",
            StockStatus::OutOfStock => "out_of_stock",
            StockStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer() -> Offer {
        Offer {
            offer_source: "kelkoo_SE".to_owned(),
            offer_url: "https://example.com/go".to_owned(),
            retail_prod_name: "Logitech MX Anywhere 3".to_owned(),
            retailer_name: "Webhallen".to_owned(),
            country: "SE".to_owned(),
            price: 79_900,
            currency: "SEK".to_owned(),
            stock_status: StockStatus::InStock,
            metadata: None,
        }
    }

    #[test]
    fn stock_status_serializes_snake_case() {
        let json = serde_json::to_string(&StockStatus::OutOfStock).unwrap();
        assert_eq!(json, "\"out_of_stock\"");
    }

    #[test]
    fn offer_serializes_null_metadata() {
        let value = serde_json::to_value(offer()).unwrap();
        assert_eq!(value["metadata"], serde_json::Value::Null);
        assert_eq!(value["stock_status"], "in_stock");
    }

    #[test]
    fn lookup_returns_none_for_unmapped_value() {
        let table = [("IN_STOCK", StockStatus::InStock)];
        assert_eq!(StockStatus::lookup(&table, "IN_STOCK"), Some(StockStatus::InStock));
        assert_eq!(StockStatus::lookup(&table, "LIMITED"), None);
    }

    #[test]
    fn zero_price_offer_is_not_publishable() {
        let mut o = offer();
        assert!(o.is_publishable());
        o.price = 0;
        assert!(!o.is_publishable());
    }

    #[test]
    fn offer_without_retailer_is_not_publishable() {
        let mut o = offer();
        o.retailer_name = "  ".to_owned();
        assert!(!o.is_publishable());
    }
}
