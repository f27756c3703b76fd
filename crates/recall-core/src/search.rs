//! Hybrid ranking: lexical and vector scores fused into one ordering.
//!
//! # Hybrid Scoring Algorithm
//!
//! 1. Compute raw BM25 scores for every fragment in the corpus.
//! 2. Compute raw vector similarities for every fragment (all `0.0` when the
//!    vector index is empty or no query vector is available).
//! 3. Normalize both score vectors to `[0, 1]` independently using min-max
//!    normalization (uniform `0.5` when all scores are equal).
//! 4. Merge: `score = (1 - w) × lexical + w × semantic`.
//! 5. Sort by score (desc), corpus position (asc).
//! 6. Truncate to `top_k`.
//!
//! BM25 scores and embedding similarities live in unrelated numeric
//! ranges; per-query normalization keeps `w` meaningful on any corpus.
//!
//! When there is no vector contribution the effective weight is forced to
//! `0.0`, so a hybrid search over a lexical-only index returns exactly what
//! [`CorpusIndex::search_lexical_only`] returns.

use crate::index::CorpusIndex;
use crate::models::{ScoreExplanation, ScoredResult};

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    /// Weight for semantic vs lexical: `hybrid = (1-w)*lexical + w*semantic`.
    pub hybrid_weight: f64,
    /// Maximum results to return.
    pub top_k: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            hybrid_weight: 0.5,
            top_k: 8,
        }
    }
}

/// Min-max normalize raw scores to `[0.0, 1.0]`.
///
/// The maximum maps to `1.0` and the minimum to `0.0`. If all scores are
/// equal, every score maps to `0.5`.
pub fn normalize_scores(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }

    let s_min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let s_max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    scores
        .iter()
        .map(|&s| {
            if (s_max - s_min).abs() < f64::EPSILON {
                0.5
            } else {
                (s - s_min) / (s_max - s_min)
            }
        })
        .collect()
}

/// Blend per-fragment lexical and semantic scores and return the top `k`.
///
/// `lexical` and `semantic` hold one raw score per corpus fragment, in
/// corpus order. Ties keep corpus order.
pub fn rank_hybrid(
    corpus: &CorpusIndex,
    lexical: &[f64],
    semantic: &[f64],
    weight: f64,
    top_k: usize,
) -> Vec<ScoredResult> {
    let norm_lexical = normalize_scores(lexical);
    let norm_semantic = normalize_scores(semantic);

    let mut scored: Vec<(usize, f64, f64, f64)> = norm_lexical
        .iter()
        .enumerate()
        .map(|(i, &k)| {
            let v = norm_semantic.get(i).copied().unwrap_or(0.0);
            let hybrid = (1.0 - weight) * k + weight * v;
            (i, hybrid, k, v)
        })
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.truncate(top_k);

    scored
        .into_iter()
        .filter_map(|(position, score, lexical, semantic)| {
            corpus.fragment(position).map(|fragment| ScoredResult {
                fragment: fragment.clone(),
                position,
                score,
                explain: Some(ScoreExplanation::Hybrid {
                    lexical,
                    semantic,
                    weight,
                }),
            })
        })
        .collect()
}

impl CorpusIndex {
    /// Lexical-only ranking: normalized BM25 with `w = 0`.
    pub fn search_lexical_only(&self, query: &str, top_k: usize) -> Vec<ScoredResult> {
        let lexical = self.lexical().score_all(query);
        let semantic = vec![0.0; lexical.len()];
        rank_hybrid(self, &lexical, &semantic, 0.0, top_k)
    }

    /// Hybrid ranking over the whole corpus.
    ///
    /// With no query vector, or an empty vector index, this is exactly
    /// [`search_lexical_only`](Self::search_lexical_only).
    pub fn search_hybrid(
        &self,
        query: &str,
        query_vec: Option<&[f32]>,
        params: SearchParams,
    ) -> Vec<ScoredResult> {
        let query_vec = match query_vec {
            Some(qv) if !self.vectors().is_empty() => qv,
            _ => return self.search_lexical_only(query, params.top_k),
        };

        let lexical = self.lexical().score_all(query);
        let semantic = self
            .vectors()
            .similarities(query_vec, self.fragments().iter().map(|f| f.id.as_str()));
        rank_hybrid(self, &lexical, &semantic, params.hybrid_weight, params.top_k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Fragment;
    use crate::vector::VectorIndex;
    use proptest::prelude::*;

    fn animals() -> Vec<Fragment> {
        vec![
            Fragment::new("fox", "The lazy fox sleeps under the old oak tree.", "animals.txt"),
            Fragment::new("cat", "A lazy cat naps on the warm windowsill.", "animals.txt"),
            Fragment::new("bear", "The brown bear catches salmon in the river.", "animals.txt"),
            Fragment::new("swift", "Swift is a programming language for Apple platforms.", "lang.txt"),
        ]
    }

    fn ids(results: &[ScoredResult]) -> Vec<&str> {
        results.iter().map(|r| r.fragment.id.as_str()).collect()
    }

    #[test]
    fn test_normalize_empty() {
        assert!(normalize_scores(&[]).is_empty());
    }

    #[test]
    fn test_normalize_single() {
        let result = normalize_scores(&[5.0]);
        assert_eq!(result, vec![0.5]);
    }

    #[test]
    fn test_normalize_range() {
        let result = normalize_scores(&[10.0, 5.0, 0.0]);
        assert!((result[0] - 1.0).abs() < 1e-9);
        assert!((result[1] - 0.5).abs() < 1e-9);
        assert!((result[2] - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_all_equal() {
        for score in normalize_scores(&[3.0, 3.0, 3.0]) {
            assert!((score - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_lazy_scenario() {
        let corpus = CorpusIndex::new(animals(), VectorIndex::new());
        let results = corpus.search_lexical_only("lazy", 2);
        let top = ids(&results);
        assert!(top.contains(&"fox"));
        assert!(top.contains(&"cat"));
    }

    #[test]
    fn test_empty_query_returns_stable_order() {
        let corpus = CorpusIndex::new(animals(), VectorIndex::new());
        let results = corpus.search_lexical_only("", 3);
        assert_eq!(ids(&results), vec!["fox", "cat", "bear"]);
        assert!(results.iter().all(|r| (r.score - 0.5).abs() < 1e-9));
    }

    #[test]
    fn test_empty_corpus_returns_nothing() {
        let corpus = CorpusIndex::new(Vec::new(), VectorIndex::new());
        assert!(corpus.search_lexical_only("lazy", 5).is_empty());
        assert!(corpus
            .search_hybrid("lazy", Some(&[1.0f32, 0.0][..]), SearchParams::default())
            .is_empty());
    }

    #[test]
    fn test_hybrid_falls_back_without_vectors() {
        let corpus = CorpusIndex::new(animals(), VectorIndex::new());
        let params = SearchParams {
            hybrid_weight: 0.5,
            top_k: 4,
        };
        let hybrid = corpus.search_hybrid("lazy bear", Some(&[1.0f32, 0.0][..]), params);
        let lexical = corpus.search_lexical_only("lazy bear", 4);
        assert_eq!(hybrid, lexical);
    }

    #[test]
    fn test_vectors_change_ranking() {
        let vectors = VectorIndex::from_records(vec![
            ("fox".to_string(), vec![1.0, 0.0]),
            ("cat".to_string(), vec![0.0, 1.0]),
            ("bear".to_string(), vec![0.7, 0.7]),
            ("swift".to_string(), vec![-1.0, 0.0]),
        ]);
        let corpus = CorpusIndex::new(animals(), vectors);

        // Lexically the shorter cat fragment wins; the vector flips them.
        assert_eq!(ids(&corpus.search_lexical_only("lazy", 2)), vec!["cat", "fox"]);
        let params = SearchParams {
            hybrid_weight: 0.5,
            top_k: 2,
        };
        let results = corpus.search_hybrid("lazy", Some(&[1.0f32, 0.0][..]), params);
        assert_eq!(ids(&results), vec!["fox", "cat"]);
    }

    #[test]
    fn test_weight_one_is_pure_semantic() {
        let vectors = VectorIndex::from_records(vec![
            ("fox".to_string(), vec![1.0, 0.0]),
            ("cat".to_string(), vec![0.0, 1.0]),
            ("bear".to_string(), vec![0.6, 0.8]),
            ("swift".to_string(), vec![-1.0, 0.0]),
        ]);
        let corpus = CorpusIndex::new(animals(), vectors);
        let params = SearchParams {
            hybrid_weight: 1.0,
            top_k: 4,
        };
        let results = corpus.search_hybrid("lazy", Some(&[0.0f32, 1.0][..]), params);
        assert_eq!(ids(&results), vec!["cat", "bear", "fox", "swift"]);
    }

    #[test]
    fn test_results_carry_explanation() {
        let corpus = CorpusIndex::new(animals(), VectorIndex::new());
        let results = corpus.search_lexical_only("swift", 1);
        match &results[0].explain {
            Some(ScoreExplanation::Hybrid { lexical, weight, .. }) => {
                assert!((lexical - 1.0).abs() < 1e-9);
                assert_eq!(*weight, 0.0);
            }
            other => panic!("unexpected explanation: {:?}", other),
        }
    }

    proptest! {
        #[test]
        fn prop_normalized_scores_in_unit_interval(
            scores in proptest::collection::vec(-1.0e6f64..1.0e6, 1..64)
        ) {
            let norm = normalize_scores(&scores);
            prop_assert_eq!(norm.len(), scores.len());
            for s in &norm {
                prop_assert!(*s >= 0.0 && *s <= 1.0, "score out of range: {}", s);
            }

            let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
            if (max - min).abs() < f64::EPSILON {
                prop_assert!(norm.iter().all(|s| *s == 0.5));
            } else {
                let i_max = scores.iter().position(|s| *s == max).unwrap();
                let i_min = scores.iter().position(|s| *s == min).unwrap();
                prop_assert_eq!(norm[i_max], 1.0);
                prop_assert_eq!(norm[i_min], 0.0);
            }
        }

        #[test]
        fn prop_search_is_deterministic(query in "[a-z ]{0,24}") {
            let corpus = CorpusIndex::new(animals(), VectorIndex::new());
            let first = corpus.search_lexical_only(&query, 4);
            let second = corpus.search_lexical_only(&query, 4);
            prop_assert_eq!(first, second);
        }
    }
}
