//! Resolver memo tables and their CSV snapshots.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ScraperError;

pub const ID_TO_GTIN_FILE: &str = "id_to_gtin_cache.csv";
pub const WITHOUT_GTIN_FILE: &str = "products_without_gtin.csv";
pub const AD_LINKS_FILE: &str = "ad_links.csv";

/// A sponsored link seen on a search page, with the codes being searched.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AdLink {
    pub ad_link: String,
    pub gtin: Option<String>,
    pub sku: Option<String>,
}

#[derive(Debug, Serialize)]
struct IdToGtinRow {
    product_id: String,
    gtin: String,
}

#[derive(Debug, Serialize)]
struct WithoutGtinRow {
    product_id: String,
    country: String,
}

/// Positive cache (`product_id -> gtin`), negative cache
/// (`(product_id, country)` pages whose retailers yielded no GTIN) and the
/// observed ad links.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SearchCache {
    pub id_to_gtin: BTreeMap<String, String>,
    pub products_without_gtin: BTreeSet<(String, String)>,
    pub ad_links: BTreeSet<AdLink>,
}

impl SearchCache {
    #[must_use]
    pub fn gtin_for(&self, product_id: &str) -> Option<&str> {
        self.id_to_gtin.get(product_id).map(String::as_str)
    }

    #[must_use]
    pub fn is_without_gtin(&self, product_id: &str, country: &str) -> bool {
        self.products_without_gtin
            .contains(&(product_id.to_owned(), country.to_owned()))
    }

    /// Reads whichever snapshot files exist under `dir`. Ad links are
    /// write-only and never loaded.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Csv`] when an existing file is malformed.
    pub fn load(dir: &Path) -> Result<Self, ScraperError> {
        let mut cache = Self::default();

        let path = dir.join(ID_TO_GTIN_FILE);
        if path.exists() {
            cache.id_to_gtin.extend(read_pairs(&path)?);
        }

        // Older snapshots carry a lone `product_id` header over two-column rows.
        let path = dir.join(WITHOUT_GTIN_FILE);
        if path.exists() {
            cache.products_without_gtin.extend(read_pairs(&path)?);
        }

        tracing::info!(
            dir = %dir.display(),
            known_gtins = cache.id_to_gtin.len(),
            without_gtin = cache.products_without_gtin.len(),
            "loaded resolver cache"
        );
        Ok(cache)
    }

    /// Writes all three snapshot files under `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Io`] or [`ScraperError::Csv`] on write failures.
    pub fn save(&self, dir: &Path) -> Result<(), ScraperError> {
        std::fs::create_dir_all(dir).map_err(|e| ScraperError::Io {
            context: dir.display().to_string(),
            source: e,
        })?;

        write_rows(
            &dir.join(ID_TO_GTIN_FILE),
            self.id_to_gtin.iter().map(|(product_id, gtin)| IdToGtinRow {
                product_id: product_id.clone(),
                gtin: gtin.clone(),
            }),
        )?;
        write_rows(
            &dir.join(WITHOUT_GTIN_FILE),
            self.products_without_gtin
                .iter()
                .map(|(product_id, country)| WithoutGtinRow {
                    product_id: product_id.clone(),
                    country: country.clone(),
                }),
        )?;
        write_rows(&dir.join(AD_LINKS_FILE), self.ad_links.iter().cloned())?;

        tracing::info!(dir = %dir.display(), "saved resolver cache");
        Ok(())
    }
}

/// First two columns of every record after the header, read by position.
/// Records with fewer than two fields are skipped.
fn read_pairs(path: &Path) -> Result<Vec<(String, String)>, ScraperError> {
    let csv_err = |e: csv::Error| ScraperError::Csv {
        context: path.display().to_string(),
        source: e,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let mut pairs = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        match (record.get(0), record.get(1)) {
            (Some(first), Some(second)) => pairs.push((first.to_owned(), second.to_owned())),
            _ => tracing::warn!(path = %path.display(), ?record, "skipping short snapshot row"),
        }
    }
    Ok(pairs)
}

fn write_rows<T: Serialize>(
    path: &Path,
    rows: impl IntoIterator<Item = T>,
) -> Result<(), ScraperError> {
    let csv_err = |e: csv::Error| ScraperError::Csv {
        context: path.display().to_string(),
        source: e,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer.flush().map_err(|e| ScraperError::Io {
        context: path.display().to_string(),
        source: e,
    })
}
