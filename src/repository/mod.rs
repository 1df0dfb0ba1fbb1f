use std::path::PathBuf;

use crate::domain::matching::MatchResult;
use crate::domain::product::{CatalogRow, ListingRow};
use crate::errors::EngineResult;

pub mod json;
pub mod table;

pub trait CatalogReader {
    fn list_catalog(&self) -> EngineResult<Vec<CatalogRow>>;
}

pub trait ListingReader {
    fn list_listings(&self) -> EngineResult<Vec<ListingRow>>;
}

pub trait MatchWriter {
    fn write_matches(&self, result: &MatchResult) -> EngineResult<()>;
}

/// Where a finished [`MatchResult`] goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchOutput {
    File(PathBuf),
    Stdout,
}

/// File-backed repository for one match job: two `;`-separated input
/// tables and a JSON output.
#[derive(Clone, Debug)]
pub struct FileRepository {
    catalog_path: PathBuf,
    listings_path: PathBuf,
    output: MatchOutput,
}

impl FileRepository {
    pub fn new(
        catalog_path: impl Into<PathBuf>,
        listings_path: impl Into<PathBuf>,
        output: MatchOutput,
    ) -> Self {
        Self {
            catalog_path: catalog_path.into(),
            listings_path: listings_path.into(),
            output,
        }
    }
}
