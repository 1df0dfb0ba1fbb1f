//! Catalog-to-listing matching runs.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, TryStreamExt, stream};
use tokio::sync::Semaphore;

use crate::domain::matching::{MatchResult, MatchStats};
use crate::domain::product::{CatalogItem, CatalogRow, DealerListing, ListingRow};
use crate::errors::{EngineError, EngineResult};
use crate::models::config::MatcherConfig;
use crate::processing::embedding::{EmbeddingProvider, check_embeddings};
use crate::processing::normalizer::Normalizer;
use crate::processing::ranking::Ranker;

const DEFAULT_BATCH_SIZE: usize = 32;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_CONCURRENCY: usize = 4;

/// Rows that survived validation, as `(key, name)` pairs in input order.
#[derive(Default)]
struct ValidatedRows {
    rows: usize,
    dropped_missing: usize,
    dropped_duplicate: usize,
    dropped_conflicting: usize,
    kept: Vec<(String, String)>,
}

fn present_key(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn present_name(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

/// Which row survives when a key repeats with a different name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum KeyConflict {
    KeepFirst,
    /// The later name replaces the earlier one; the key keeps its first position.
    KeepLast,
}

/// Drops rows with a missing key or name and exact `(key, name)` duplicates.
/// A key repeated with a different name is resolved by `on_conflict`.
fn validate_rows<'a, I>(table: &str, rows: I, on_conflict: KeyConflict) -> ValidatedRows
where
    I: IntoIterator<Item = (Option<&'a str>, Option<&'a str>)>,
{
    let mut validated = ValidatedRows::default();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for (key, name) in rows {
        validated.rows += 1;

        let (Some(key), Some(name)) = (present_key(key), present_name(name)) else {
            validated.dropped_missing += 1;
            log::debug!("Dropping {table} row {} with a missing field", validated.rows);
            continue;
        };

        if let Some(&position) = seen.get(key) {
            let existing = &mut validated.kept[position].1;
            if existing.as_str() == name {
                validated.dropped_duplicate += 1;
                continue;
            }
            validated.dropped_conflicting += 1;
            match on_conflict {
                KeyConflict::KeepFirst => log::warn!(
                    "Dropping {table} row {}: key {key} already used for {existing:?}, got {name:?}",
                    validated.rows
                ),
                KeyConflict::KeepLast => {
                    log::warn!(
                        "{table} row {} replaces {existing:?} with {name:?} for key {key}",
                        validated.rows
                    );
                    *existing = name.to_string();
                }
            }
            continue;
        }

        seen.insert(key.to_string(), validated.kept.len());
        validated.kept.push((key.to_string(), name.to_string()));
    }

    validated
}

/// Matching engine: normalizes both tables, embeds them through the injected
/// provider and ranks every listing against the whole catalog.
///
/// The provider is loaded once by the caller and shared between runs; the
/// catalog embedding cache lives only for the duration of one run.
///
/// Provider calls pass through a gate sized by
/// [`EmbeddingProvider::max_concurrent_calls`]. The gate is shared by every
/// run on the same matcher, and the call timeout starts once a call is through
/// it, so queueing behind other batches or jobs never counts against it.
pub struct Matcher<P: ?Sized> {
    call_permits: Semaphore,
    provider: Arc<P>,
    normalizer: Normalizer,
    ranker: Ranker,
    batch_size: usize,
    timeout: Duration,
    concurrency: usize,
}

impl<P> Matcher<P>
where
    P: EmbeddingProvider + ?Sized,
{
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            call_permits: Semaphore::new(
                provider
                    .max_concurrent_calls()
                    .clamp(1, Semaphore::MAX_PERMITS),
            ),
            provider,
            normalizer: Normalizer::default(),
            ranker: Ranker::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            timeout: DEFAULT_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn from_config(provider: Arc<P>, config: &MatcherConfig) -> Self {
        Self::new(provider)
            .with_normalizer(Normalizer::new(&config.brand_tokens))
            .with_ranker(Ranker::new(config.min_similarity))
            .with_batch_size(config.embedding.batch_size)
            .with_timeout(Duration::from_secs(config.embedding.timeout_secs))
            .with_concurrency(config.concurrency)
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_ranker(mut self, ranker: Ranker) -> Self {
        self.ranker = ranker;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Upper bound on every single provider call, not counting the wait for
    /// a free call slot.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Ranks the `k` most similar catalog articles for every valid listing.
    pub async fn match_tables(
        &self,
        catalog: &[CatalogRow],
        listings: &[ListingRow],
        k: usize,
    ) -> EngineResult<MatchResult> {
        let (result, stats) = self.match_with_stats(catalog, listings, k).await?;

        log::info!(
            "Finished matching: catalog_rows={}, catalog_items={}, catalog_dropped={}, listing_rows={}, listings={}, listings_dropped={}, catalog_embeddings_generated={}, listing_embeddings_generated={}, matched={}, unmatched={}",
            stats.catalog_rows,
            stats.catalog_items,
            stats.catalog_dropped(),
            stats.listing_rows,
            stats.listings,
            stats.listings_dropped(),
            stats.catalog_embeddings_generated,
            stats.listing_embeddings_generated,
            stats.matched,
            stats.unmatched
        );
        if stats.catalog_dropped() > 0 || stats.listings_dropped() > 0 {
            log::warn!(
                "Dropped input rows: catalog missing={} duplicate={} conflicting={}, listings missing={} duplicate={} conflicting={}",
                stats.catalog_dropped_missing,
                stats.catalog_dropped_duplicate,
                stats.catalog_dropped_conflicting,
                stats.listings_dropped_missing,
                stats.listings_dropped_duplicate,
                stats.listings_dropped_conflicting
            );
        }

        Ok(result)
    }

    /// Same as [`Matcher::match_tables`], also returning the run counters.
    pub async fn match_with_stats(
        &self,
        catalog: &[CatalogRow],
        listings: &[ListingRow],
        k: usize,
    ) -> EngineResult<(MatchResult, MatchStats)> {
        if k == 0 {
            return Err(EngineError::InvalidArgument(
                "k must be a positive integer".to_string(),
            ));
        }

        let mut stats = MatchStats::default();

        let catalog_rows = validate_rows(
            "catalog",
            catalog
                .iter()
                .map(|row| (row.article.as_deref(), row.name.as_deref())),
            KeyConflict::KeepFirst,
        );
        stats.catalog_rows = catalog_rows.rows;
        stats.catalog_dropped_missing = catalog_rows.dropped_missing;
        stats.catalog_dropped_duplicate = catalog_rows.dropped_duplicate;
        stats.catalog_dropped_conflicting = catalog_rows.dropped_conflicting;

        let listing_rows = validate_rows(
            "listing",
            listings
                .iter()
                .map(|row| (row.product_url.as_deref(), row.product_name.as_deref())),
            KeyConflict::KeepLast,
        );
        stats.listing_rows = listing_rows.rows;
        stats.listings_dropped_missing = listing_rows.dropped_missing;
        stats.listings_dropped_duplicate = listing_rows.dropped_duplicate;
        stats.listings_dropped_conflicting = listing_rows.dropped_conflicting;

        let items: Vec<CatalogItem> = catalog_rows
            .kept
            .into_iter()
            .map(|(article, raw_name)| CatalogItem {
                canonical_name: self.normalizer.normalize(&raw_name),
                article,
                raw_name,
            })
            .collect();
        let listings: Vec<DealerListing> = listing_rows
            .kept
            .into_iter()
            .map(|(listing_key, raw_name)| DealerListing {
                canonical_name: self.normalizer.normalize(&raw_name),
                listing_key,
                raw_name,
            })
            .collect();
        stats.catalog_items = items.len();
        stats.listings = listings.len();

        let mut result = MatchResult::new();

        if listings.is_empty() {
            log::info!("No valid listings to match");
            return Ok((result, stats));
        }

        if items.is_empty() {
            log::warn!(
                "No valid catalog items; all {} listings get an empty shortlist",
                listings.len()
            );
            for listing in listings {
                result.insert(listing.listing_key, Vec::new());
            }
            stats.unmatched = stats.listings;
            return Ok((result, stats));
        }

        let cache = self.embed_catalog(&items).await?;
        stats.catalog_embeddings_generated = cache.len();
        let dimension = cache.values().next().map(Vec::len);

        let catalog_vectors: Vec<(&str, &[f32])> = items
            .iter()
            .filter_map(|item| {
                cache
                    .get(&item.canonical_name)
                    .map(|vector| (item.article.as_str(), vector.as_slice()))
            })
            .collect();
        let catalog_vectors = &catalog_vectors;

        let batches: Vec<_> = listings
            .chunks(self.batch_size)
            .map(|batch| async move {
                let texts = batch
                    .iter()
                    .map(|listing| listing.canonical_name.clone())
                    .collect();
                let vectors = self.embed_batch(texts, dimension).await?;
                batch
                    .iter()
                    .zip(vectors.iter())
                    .map(|(listing, vector)| {
                        self.ranker
                            .shortlist(&listing.listing_key, vector, catalog_vectors, k)
                    })
                    .collect::<EngineResult<Vec<_>>>()
            })
            .collect();
        let shortlists: Vec<Vec<_>> = stream::iter(batches)
            .buffered(self.concurrency)
            .try_collect()
            .await?;
        stats.listing_embeddings_generated = listings.len();

        for (listing, shortlist) in listings.iter().zip(shortlists.into_iter().flatten()) {
            match shortlist.first() {
                Some(best) => {
                    log::debug!(
                        "Best match for {}: {} (score {:.4})",
                        listing.listing_key,
                        best.article,
                        best.score
                    );
                    stats.matched += 1;
                }
                None => stats.unmatched += 1,
            }
            result.insert(
                listing.listing_key.clone(),
                shortlist.into_iter().map(|candidate| candidate.article).collect(),
            );
        }

        Ok((result, stats))
    }

    /// Embeds each distinct canonical catalog name once. Completes before any
    /// listing is ranked.
    async fn embed_catalog(&self, items: &[CatalogItem]) -> EngineResult<HashMap<String, Vec<f32>>> {
        let mut seen = HashSet::new();
        let distinct: Vec<String> = items
            .iter()
            .filter(|item| seen.insert(item.canonical_name.as_str()))
            .map(|item| item.canonical_name.clone())
            .collect();

        let mut cache = HashMap::with_capacity(distinct.len());
        let mut dimension = None;
        for chunk in distinct.chunks(self.batch_size) {
            let vectors = self.embed_batch(chunk.to_vec(), dimension).await?;
            dimension = dimension.or_else(|| vectors.first().map(Vec::len));
            cache.extend(chunk.iter().cloned().zip(vectors));
        }

        Ok(cache)
    }

    /// One provider call under the configured timeout, with the response
    /// checked before use.
    async fn embed_batch(
        &self,
        texts: Vec<String>,
        expected_dimension: Option<usize>,
    ) -> EngineResult<Vec<Vec<f32>>> {
        let expected = texts.len();
        let _permit = self.call_permits.acquire().await.map_err(|_| {
            EngineError::ModelUnavailable("embedding call gate closed".to_string())
        })?;
        let vectors = tokio::time::timeout(self.timeout, self.provider.embed(texts))
            .await
            .map_err(|_| {
                EngineError::ModelUnavailable(format!(
                    "embedding call timed out after {:?}",
                    self.timeout
                ))
            })??;

        check_embeddings(vectors, expected, expected_dimension)
    }
}
