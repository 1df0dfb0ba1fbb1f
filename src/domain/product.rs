use serde::{Deserialize, Serialize};

/// Raw manufacturer catalog row as read from the input table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRow {
    pub article: Option<String>,
    pub name: Option<String>,
}

impl CatalogRow {
    pub fn new(article: &str, name: &str) -> Self {
        Self {
            article: Some(article.to_string()),
            name: Some(name.to_string()),
        }
    }
}

/// Raw dealer listing row as read from the input table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRow {
    pub product_url: Option<String>,
    pub product_name: Option<String>,
}

impl ListingRow {
    pub fn new(product_url: &str, product_name: &str) -> Self {
        Self {
            product_url: Some(product_url.to_string()),
            product_name: Some(product_name.to_string()),
        }
    }
}

/// Validated catalog entry. Its embedding lives in the run's catalog cache,
/// keyed by `canonical_name`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogItem {
    pub article: String,
    pub raw_name: String,
    pub canonical_name: String,
}

/// Validated dealer listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DealerListing {
    pub listing_key: String,
    pub raw_name: String,
    pub canonical_name: String,
}
