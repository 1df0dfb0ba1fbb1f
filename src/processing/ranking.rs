use std::cmp::Ordering;

use crate::domain::matching::MatchCandidate;
use crate::errors::{EngineError, EngineResult};

/// Cosine similarity, `1 - cosine_distance(a, b)`, clamped to `[-1, 1]`.
///
/// Empty, differently sized, zero-norm or non-finite input scores `0.0`.
pub fn score(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x = f64::from(x);
        let y = f64::from(y);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    let similarity = dot / denom;
    if !similarity.is_finite() {
        return 0.0;
    }
    similarity.clamp(-1.0, 1.0) as f32
}

/// Scores every candidate against `query` and returns the best `k` with
/// their scores, best first.
///
/// The sort is stable, so equal scores keep the candidates' input order.
/// Candidates below `min_similarity` are dropped before truncation.
pub fn rank_scored<I, V>(
    query: &[f32],
    candidates: &[(I, V)],
    k: usize,
    min_similarity: Option<f32>,
) -> EngineResult<Vec<(I, f32)>>
where
    I: Clone,
    V: AsRef<[f32]>,
{
    if k == 0 {
        return Err(EngineError::InvalidArgument(
            "k must be a positive integer".to_string(),
        ));
    }

    let mut scored: Vec<(I, f32)> = candidates
        .iter()
        .map(|(id, vector)| (id.clone(), score(query, vector.as_ref())))
        .filter(|(_, similarity)| min_similarity.is_none_or(|floor| *similarity >= floor))
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(k);

    Ok(scored)
}

/// Ids of the best `k` candidates for `query`, best first.
pub fn rank<I, V>(query: &[f32], candidates: &[(I, V)], k: usize) -> EngineResult<Vec<I>>
where
    I: Clone,
    V: AsRef<[f32]>,
{
    Ok(rank_scored(query, candidates, k, None)?
        .into_iter()
        .map(|(id, _)| id)
        .collect())
}

/// Ranking policy applied to every listing of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Ranker {
    min_similarity: Option<f32>,
}

impl Ranker {
    /// `min_similarity` of `None` keeps plain top-K behaviour: every listing
    /// gets `min(k, catalog size)` articles however weak the best match is.
    pub fn new(min_similarity: Option<f32>) -> Self {
        Self { min_similarity }
    }

    pub fn min_similarity(&self) -> Option<f32> {
        self.min_similarity
    }

    pub fn rank<I, V>(&self, query: &[f32], candidates: &[(I, V)], k: usize) -> EngineResult<Vec<I>>
    where
        I: Clone,
        V: AsRef<[f32]>,
    {
        Ok(rank_scored(query, candidates, k, self.min_similarity)?
            .into_iter()
            .map(|(id, _)| id)
            .collect())
    }

    /// Shortlist for one listing against the catalog vectors.
    pub fn shortlist<V>(
        &self,
        listing_key: &str,
        query: &[f32],
        catalog: &[(&str, V)],
        k: usize,
    ) -> EngineResult<Vec<MatchCandidate>>
    where
        V: AsRef<[f32]>,
    {
        Ok(rank_scored(query, catalog, k, self.min_similarity)?
            .into_iter()
            .map(|(article, score)| MatchCandidate {
                listing_key: listing_key.to_string(),
                article: article.to_string(),
                score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{Ranker, rank, rank_scored, score};
    use crate::errors::EngineError;

    #[test]
    fn identical_vectors_score_one() {
        let a = [0.3_f32, -1.2, 4.5, 0.01];

        assert!((score(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_and_opposite_vectors() {
        assert!(score(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((score(&[1.0, 2.0], &[-1.0, -2.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn score_is_symmetric() {
        let a = [0.2_f32, 0.7, -0.1];
        let b = [0.9_f32, -0.3, 0.4];

        assert_eq!(score(&a, &b), score(&b, &a));
    }

    #[test]
    fn degenerate_vectors_score_zero() {
        assert_eq!(score(&[], &[]), 0.0);
        assert_eq!(score(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(score(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(score(&[f32::NAN, 1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn rank_returns_best_neighbor_first() {
        let query = vec![1.0_f32, 0.0, 0.0];
        let items = vec![
            (10, vec![0.0_f32, 1.0, 0.0]),
            (20, vec![1.0_f32, 0.0, 0.0]),
            (30, vec![0.5_f32, 0.5, 0.0]),
        ];

        assert_eq!(rank(&query, &items, 3).expect("rank"), vec![20, 30, 10]);
        assert_eq!(rank(&query, &items, 1).expect("rank"), vec![20]);
    }

    #[test]
    fn rank_keeps_input_order_for_ties() {
        let v = vec![0.6_f32, 0.8];
        let items = vec![("x", v.clone()), ("y", v.clone())];

        assert_eq!(rank(&v, &items, 2).expect("rank"), vec!["x", "y"]);
    }

    #[test]
    fn rank_keeps_input_order_for_scaled_ties() {
        let query = vec![1.0_f32, 0.0];
        let items = vec![
            ("c", vec![0.0_f32, 1.0]),
            ("a", vec![2.0_f32, 0.0]),
            ("b", vec![1.0_f32, 0.0]),
        ];

        assert_eq!(rank(&query, &items, 3).expect("rank"), vec!["a", "b", "c"]);
    }

    #[test]
    fn rank_returns_all_when_k_exceeds_candidates() {
        let items = vec![(1, vec![1.0_f32]), (2, vec![-1.0_f32])];

        assert_eq!(rank(&[1.0], &items, 10).expect("rank"), vec![1, 2]);
    }

    #[test]
    fn rank_returns_empty_for_empty_candidates() {
        let items: Vec<(i32, Vec<f32>)> = Vec::new();

        assert!(rank(&[1.0, 0.0], &items, 3).expect("rank").is_empty());
    }

    #[test]
    fn rank_rejects_zero_k() {
        let items = vec![(1, vec![1.0_f32])];

        assert!(matches!(
            rank(&[1.0], &items, 0),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn rank_only_returns_known_ids_up_to_k() {
        let items: Vec<(usize, Vec<f32>)> = (0..20)
            .map(|i| (i, vec![i as f32, 1.0, (i % 3) as f32]))
            .collect();
        let query = [0.5_f32, 0.2, 0.9];

        for k in 1..25 {
            let ranked = rank(&query, &items, k).expect("rank");
            assert!(ranked.len() <= k);
            assert!(ranked.iter().all(|id| *id < 20));
        }
    }

    #[test]
    fn similarity_floor_drops_weak_candidates() {
        let query = vec![1.0_f32, 0.0];
        let items = vec![("close", vec![0.9_f32, 0.1]), ("far", vec![0.0_f32, 1.0])];

        let ranked = rank_scored(&query, &items, 5, Some(0.5)).expect("rank");

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].0, "close");
        assert!(Ranker::new(Some(0.999)).rank(&query, &items, 5).expect("rank").is_empty());
    }

    #[test]
    fn shortlist_carries_listing_key_and_scores() {
        let query = vec![1.0_f32, 0.0];
        let catalog = vec![("A1", vec![1.0_f32, 0.0]), ("A2", vec![0.0_f32, 1.0])];

        let shortlist = Ranker::default()
            .shortlist("u1", &query, &catalog, 2)
            .expect("shortlist");

        assert_eq!(shortlist.len(), 2);
        assert_eq!(shortlist[0].listing_key, "u1");
        assert_eq!(shortlist[0].article, "A1");
        assert!((shortlist[0].score - 1.0).abs() < 1e-6);
        assert!(shortlist[1].score.abs() < 1e-6);
    }
}
