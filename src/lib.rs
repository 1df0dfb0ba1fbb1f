pub mod domain;
pub mod errors;
pub mod models;
pub mod processing;
pub mod repository;

/// Shortlist length used when neither the job nor the configuration sets one.
pub const DEFAULT_TOP_K: usize = 5;
