use std::fs::File;
use std::io::Read;

use csv::{ReaderBuilder, StringRecord};

use crate::domain::product::{CatalogRow, ListingRow};
use crate::errors::{EngineError, EngineResult};
use crate::repository::{CatalogReader, FileRepository, ListingReader};

pub const CATALOG_KEY_COLUMN: &str = "article";
pub const CATALOG_NAME_COLUMN: &str = "name";
pub const LISTING_KEY_COLUMN: &str = "product_url";
pub const LISTING_NAME_COLUMN: &str = "product_name";

const DELIMITER: u8 = b';';

fn field(record: &StringRecord, index: usize) -> Option<String> {
    record
        .get(index)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Reads the `(key, name)` columns of a `;`-separated table with a header.
///
/// A missing column is an [`EngineError::InvalidArgument`]. Rows that cannot
/// be decoded are skipped with a warning; only I/O failures abort the read.
fn read_key_name_columns<R: Read>(
    reader: R,
    key_column: &str,
    name_column: &str,
) -> EngineResult<Vec<(Option<String>, Option<String>)>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(DELIMITER)
        .flexible(true)
        .from_reader(reader);

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(error) if error.is_io_error() => return Err(error.into()),
        Err(error) => {
            return Err(EngineError::InvalidArgument(format!(
                "unreadable table header: {error}"
            )));
        }
    };

    let position = |column: &str| {
        headers
            .iter()
            .position(|header| header.trim_start_matches('\u{feff}').trim() == column)
            .ok_or_else(|| {
                EngineError::InvalidArgument(format!("table is missing column `{column}`"))
            })
    };
    let key_index = position(key_column)?;
    let name_index = position(name_column)?;

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(error) if error.is_io_error() => return Err(error.into()),
            Err(error) => {
                log::warn!("Skipping unreadable row {}: {error}", index + 2);
                continue;
            }
        };
        rows.push((field(&record, key_index), field(&record, name_index)));
    }

    Ok(rows)
}

/// Parses a catalog table (`article`, `name`).
pub fn read_catalog<R: Read>(reader: R) -> EngineResult<Vec<CatalogRow>> {
    Ok(
        read_key_name_columns(reader, CATALOG_KEY_COLUMN, CATALOG_NAME_COLUMN)?
            .into_iter()
            .map(|(article, name)| CatalogRow { article, name })
            .collect(),
    )
}

/// Parses a dealer listing table (`product_url`, `product_name`).
pub fn read_listings<R: Read>(reader: R) -> EngineResult<Vec<ListingRow>> {
    Ok(
        read_key_name_columns(reader, LISTING_KEY_COLUMN, LISTING_NAME_COLUMN)?
            .into_iter()
            .map(|(product_url, product_name)| ListingRow {
                product_url,
                product_name,
            })
            .collect(),
    )
}

impl CatalogReader for FileRepository {
    fn list_catalog(&self) -> EngineResult<Vec<CatalogRow>> {
        let file = File::open(&self.catalog_path)?;
        read_catalog(file)
    }
}

impl ListingReader for FileRepository {
    fn list_listings(&self) -> EngineResult<Vec<ListingRow>> {
        let file = File::open(&self.listings_path)?;
        read_listings(file)
    }
}
