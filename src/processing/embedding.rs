use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tokio::sync::Mutex;

use crate::errors::{EngineError, EngineResult};
use crate::models::config::{EmbeddingModelName, EmbeddingSettings};

/// Source of dense sentence embeddings.
///
/// Implementations must be deterministic for identical input and must fail
/// with [`EngineError::ModelUnavailable`] instead of inventing vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds every text, returning one vector per input in the same order.
    async fn embed(&self, texts: Vec<String>) -> EngineResult<Vec<Vec<f32>>>;

    /// How many `embed` calls may usefully run at once. Callers queue the
    /// rest instead of letting them wait inside the provider.
    fn max_concurrent_calls(&self) -> usize {
        1
    }

    async fn embed_one(&self, text: String) -> EngineResult<Vec<f32>> {
        self.embed(vec![text]).await?.into_iter().next().ok_or_else(|| {
            EngineError::ModelUnavailable("provider returned no embedding".to_string())
        })
    }
}

impl From<EmbeddingModelName> for EmbeddingModel {
    fn from(name: EmbeddingModelName) -> Self {
        match name {
            EmbeddingModelName::MultilingualE5Small => EmbeddingModel::MultilingualE5Small,
            EmbeddingModelName::MultilingualE5Base => EmbeddingModel::MultilingualE5Base,
            EmbeddingModelName::MultilingualE5Large => EmbeddingModel::MultilingualE5Large,
            EmbeddingModelName::ParaphraseMultilingualMiniLm => {
                EmbeddingModel::ParaphraseMLMiniLML12V2
            }
        }
    }
}

/// [`EmbeddingProvider`] backed by a local `fastembed` ONNX model.
///
/// `TextEmbedding::embed` needs `&mut self`, so the model sits behind a
/// mutex and inference runs on tokio's blocking pool. Calls are therefore
/// serialized; batching is what buys throughput. The lock guard moves into
/// the blocking task, so an abandoned call keeps the model until inference
/// really ends.
pub struct FastEmbedProvider {
    model: Arc<Mutex<TextEmbedding>>,
    batch_size: usize,
    text_prefix: String,
}

impl FastEmbedProvider {
    /// Loads the configured model. Downloads it on first use unless it is
    /// already present in the cache directory.
    pub fn new(settings: &EmbeddingSettings) -> EngineResult<Self> {
        let mut options = InitOptions::new(settings.model.into())
            .with_show_download_progress(settings.show_download_progress);
        if let Some(cache_dir) = &settings.cache_dir {
            options = options.with_cache_dir(cache_dir.clone());
        }

        let model = TextEmbedding::try_new(options).map_err(|error| {
            EngineError::ModelUnavailable(format!(
                "Failed to initialize embedder {:?}: {error:?}",
                settings.model
            ))
        })?;

        log::info!("Loaded embedding model {:?}", settings.model);

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            batch_size: settings.batch_size.max(1),
            text_prefix: settings.effective_text_prefix().to_string(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, texts: Vec<String>) -> EngineResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let texts = with_prefix(&self.text_prefix, texts);
        let batch_size = self.batch_size;
        let mut model = Arc::clone(&self.model).lock_owned().await;
        let generated = tokio::task::spawn_blocking(move || {
            model.embed(texts, Some(batch_size)).map_err(|error| {
                EngineError::ModelUnavailable(format!("Failed to generate embeddings: {error:?}"))
            })
        })
        .await
        .map_err(|error| EngineError::ModelUnavailable(format!("Embedding task failed: {error}")))??;

        Ok(generated
            .iter()
            .map(|value| normalize_embedding(value))
            .collect())
    }
}

fn with_prefix(prefix: &str, texts: Vec<String>) -> Vec<String> {
    if prefix.is_empty() {
        return texts;
    }
    texts.into_iter().map(|text| format!("{prefix}{text}")).collect()
}

/// Scale a vector to unit length.
///
/// A zero vector is returned unchanged; [`check_embeddings`] rejects it.
pub fn normalize_embedding(vec: &[f32]) -> Vec<f32> {
    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        vec.to_vec()
    } else {
        vec.iter().map(|x| x / norm).collect()
    }
}

/// Validate a provider response before any of it is used for ranking.
///
/// Checks the vector count, a shared non-zero dimension (equal to
/// `expected_dimension` when given), finite components and a non-zero norm.
pub fn check_embeddings(
    vectors: Vec<Vec<f32>>,
    expected_count: usize,
    expected_dimension: Option<usize>,
) -> EngineResult<Vec<Vec<f32>>> {
    if vectors.len() != expected_count {
        return Err(EngineError::ModelUnavailable(format!(
            "provider returned {} embeddings for {expected_count} texts",
            vectors.len()
        )));
    }

    let dimension = match expected_dimension.or_else(|| vectors.first().map(Vec::len)) {
        Some(0) => {
            return Err(EngineError::ModelUnavailable(
                "provider returned empty embeddings".to_string(),
            ));
        }
        Some(dimension) => dimension,
        None => return Ok(vectors),
    };

    for (position, vector) in vectors.iter().enumerate() {
        if vector.len() != dimension {
            return Err(EngineError::ModelUnavailable(format!(
                "embedding {position} has dimension {}, expected {dimension}",
                vector.len()
            )));
        }
        if vector.iter().any(|value| !value.is_finite()) {
            return Err(EngineError::ModelUnavailable(format!(
                "embedding {position} contains non-finite values"
            )));
        }
        if vector.iter().all(|value| *value == 0.0) {
            return Err(EngineError::ModelUnavailable(format!(
                "embedding {position} is a zero vector"
            )));
        }
    }

    Ok(vectors)
}
