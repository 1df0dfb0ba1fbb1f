use std::path::PathBuf;

use serde::Deserialize;

pub mod embedding;
pub mod matching;
pub mod normalizer;
pub mod ranking;
pub mod worker;

#[derive(Deserialize, Debug)]
pub enum ZMQMessage {
    Match(MatchJob),
}

/// A request from the surrounding application to match one catalog export
/// against one dealer price export.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MatchJob {
    pub catalog_path: PathBuf,
    pub listings_path: PathBuf,
    pub output_path: PathBuf,
    /// Shortlist length; the configured default applies when absent.
    #[serde(default)]
    pub top_k: Option<usize>,
}
