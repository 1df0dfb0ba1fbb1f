use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Score of one catalog article against one listing.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchCandidate {
    pub listing_key: String,
    pub article: String,
    pub score: f32,
}

/// Ranked shortlist per listing key.
///
/// Articles for a key are ordered by descending similarity, ties in catalog
/// input order. Keys are kept sorted so the serialized form is deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchResult {
    matches: BTreeMap<String, Vec<String>>,
}

impl MatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, listing_key: String, articles: Vec<String>) {
        self.matches.insert(listing_key, articles);
    }

    pub fn get(&self, listing_key: &str) -> Option<&[String]> {
        self.matches.get(listing_key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.matches.iter()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Counters collected over one matching run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchStats {
    pub catalog_rows: usize,
    pub catalog_items: usize,
    pub catalog_dropped_missing: usize,
    pub catalog_dropped_duplicate: usize,
    pub catalog_dropped_conflicting: usize,
    pub listing_rows: usize,
    pub listings: usize,
    pub listings_dropped_missing: usize,
    pub listings_dropped_duplicate: usize,
    pub listings_dropped_conflicting: usize,
    pub catalog_embeddings_generated: usize,
    pub listing_embeddings_generated: usize,
    pub matched: usize,
    pub unmatched: usize,
}

impl MatchStats {
    pub fn catalog_dropped(&self) -> usize {
        self.catalog_dropped_missing
            + self.catalog_dropped_duplicate
            + self.catalog_dropped_conflicting
    }

    pub fn listings_dropped(&self) -> usize {
        self.listings_dropped_missing
            + self.listings_dropped_duplicate
            + self.listings_dropped_conflicting
    }
}
