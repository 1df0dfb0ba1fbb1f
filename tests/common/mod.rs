//! Helpers for integration tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use prosept_matcher::errors::EngineResult;
use prosept_matcher::processing::embedding::EmbeddingProvider;
use tempfile::TempDir;

const DIMENSION: usize = 64;

/// Deterministic stand-in for the real model: hashed character bigrams.
#[derive(Default)]
pub struct BigramProvider {
    calls: AtomicUsize,
}

impl BigramProvider {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for BigramProvider {
    async fn embed(&self, texts: Vec<String>) -> EngineResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0_f32; DIMENSION + 1];
                vector[DIMENSION] = 0.1;
                let chars: Vec<char> = format!(" {text} ").chars().collect();
                for pair in chars.windows(2) {
                    let bucket = (pair[0] as usize * 31 + pair[1] as usize) % DIMENSION;
                    vector[bucket] += 1.0;
                }
                vector
            })
            .collect())
    }
}

/// Temporary directory holding the CSV tables of one test.
pub struct TestFiles {
    dir: TempDir,
}

impl TestFiles {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir."),
        }
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, contents).expect("Failed to write test file.");
        path
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}
