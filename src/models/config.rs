//! Configuration model loaded from external sources.
//!
//! Sources are layered: built-in defaults, `config/default.yaml`, the file
//! named by `MATCHER_CONFIG`, then `MATCHER__*` environment variables
//! (`MATCHER__EMBEDDING__BATCH_SIZE=64`). Every file is optional.

use std::path::PathBuf;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::errors::EngineResult;
use crate::processing::normalizer::DEFAULT_BRAND_TOKENS;
use crate::DEFAULT_TOP_K;

const DEFAULT_CONFIG_FILE: &str = "config/default";

/// Sentence-embedding models the matcher can load.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingModelName {
    MultilingualE5Small,
    MultilingualE5Base,
    #[default]
    MultilingualE5Large,
    ParaphraseMultilingualMiniLm,
}

impl EmbeddingModelName {
    /// Marker the model was trained to see in front of its input. E5 models
    /// take `query: ` on both sides of a symmetric similarity task.
    pub fn text_prefix(self) -> &'static str {
        match self {
            Self::MultilingualE5Small | Self::MultilingualE5Base | Self::MultilingualE5Large => {
                "query: "
            }
            Self::ParaphraseMultilingualMiniLm => "",
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model: EmbeddingModelName,
    /// Where model files are downloaded; `fastembed` picks its own default
    /// when unset.
    pub cache_dir: Option<PathBuf>,
    pub show_download_progress: bool,
    /// Prepended to every text before inference; the model's own marker
    /// ([`EmbeddingModelName::text_prefix`]) when unset.
    pub text_prefix: Option<String>,
    /// Texts per provider call.
    pub batch_size: usize,
    /// Upper bound on a single provider call.
    pub timeout_secs: u64,
}

impl EmbeddingSettings {
    pub fn effective_text_prefix(&self) -> &str {
        self.text_prefix
            .as_deref()
            .unwrap_or_else(|| self.model.text_prefix())
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: EmbeddingModelName::default(),
            cache_dir: None,
            show_download_progress: false,
            text_prefix: None,
            batch_size: 32,
            timeout_secs: 120,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
/// Settings for the match worker and the engine it hosts.
pub struct MatcherConfig {
    pub zmq_address: String,
    /// Shortlist length used when a job does not set one.
    pub top_k: usize,
    /// Drop candidates scoring below this value. Off by default.
    pub min_similarity: Option<f32>,
    pub brand_tokens: Vec<String>,
    /// Listing batches embedded and ranked concurrently.
    pub concurrency: usize,
    pub embedding: EmbeddingSettings,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            zmq_address: "tcp://127.0.0.1:5556".to_string(),
            top_k: DEFAULT_TOP_K,
            min_similarity: None,
            brand_tokens: DEFAULT_BRAND_TOKENS.iter().map(|s| s.to_string()).collect(),
            concurrency: 4,
            embedding: EmbeddingSettings::default(),
        }
    }
}

impl MatcherConfig {
    /// Loads the layered configuration described in the module docs.
    pub fn load() -> EngineResult<Self> {
        Self::load_from(std::env::var("MATCHER_CONFIG").ok().as_deref())
    }

    /// Same as [`MatcherConfig::load`] with an explicit extra file.
    pub fn load_from(extra_file: Option<&str>) -> EngineResult<Self> {
        let mut builder = Config::builder()
            .add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false));
        if let Some(path) = extra_file {
            builder = builder.add_source(File::with_name(path).required(true));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix("MATCHER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
