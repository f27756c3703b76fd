//! Heuristic second-pass reranking over a shortlist.
//!
//! Raw retrieval scores are weak proxies for "is this the right passage".
//! The reranker recomputes relevance from six lexical signals, each in
//! `[0, 1]`, and blends them with the incoming score:
//!
//! | Signal | Definition | Weight |
//! |--------|------------|--------|
//! | original | score from the previous stage | 0.30 |
//! | overlap | query tokens found / query token count | 0.20 |
//! | bigram | query bigrams found among fragment bigrams / query bigram count | 0.15 |
//! | density | matched positions / span they occupy | 0.15 |
//! | coverage | distinct query terms found / distinct query terms | 0.10 |
//! | position | `1 / (1 + first_match / 50)` | 0.05 |
//! | length penalty | `1 / (1 + tokens / 500)` | 0.05 |
//!
//! The weights are untuned heuristics kept for behavioral parity; treat
//! them as a tuning surface.

use std::collections::HashSet;

use crate::models::{RerankSignals, ScoreExplanation, ScoredResult};
use crate::tokenize::tokenize;

/// Decay constant for the first-match position bonus, in tokens.
pub const POSITION_DECAY_TOKENS: f64 = 50.0;
/// Length at which the length penalty halves a fragment's signal, in tokens.
pub const LENGTH_PENALTY_TOKENS: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankWeights {
    pub original: f64,
    pub overlap: f64,
    pub bigram: f64,
    pub density: f64,
    pub coverage: f64,
    pub position: f64,
    pub length_penalty: f64,
}

impl Default for RerankWeights {
    fn default() -> Self {
        Self {
            original: 0.30,
            overlap: 0.20,
            bigram: 0.15,
            density: 0.15,
            coverage: 0.10,
            position: 0.05,
            length_penalty: 0.05,
        }
    }
}

impl RerankWeights {
    fn combine(&self, original: f64, s: &RerankSignals) -> f64 {
        self.original * original
            + self.overlap * s.overlap
            + self.bigram * s.bigram
            + self.density * s.density
            + self.coverage * s.coverage
            + self.position * s.position
            + self.length_penalty * s.length_penalty
    }
}

/// Tokenized query, prepared once per rerank call.
struct PreparedQuery {
    tokens: Vec<String>,
    distinct: HashSet<String>,
    bigrams: Vec<(String, String)>,
}

impl PreparedQuery {
    fn new(query: &str) -> Self {
        let tokens = tokenize(query);
        let distinct = tokens.iter().cloned().collect();
        let bigrams = tokens
            .windows(2)
            .map(|w| (w[0].clone(), w[1].clone()))
            .collect();
        Self {
            tokens,
            distinct,
            bigrams,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Reranker {
    weights: RerankWeights,
}

impl Reranker {
    pub fn new(weights: RerankWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> RerankWeights {
        self.weights
    }

    /// Rescore `results` against `query`, sort descending (ties keep input
    /// order), and keep the best `top_k`.
    pub fn rerank(&self, query: &str, results: Vec<ScoredResult>, top_k: usize) -> Vec<ScoredResult> {
        let prepared = PreparedQuery::new(query);

        let mut rescored: Vec<ScoredResult> = results
            .into_iter()
            .map(|mut r| {
                let signals = compute_signals(&prepared, &r.fragment.text);
                let original = r.score;
                r.score = self.weights.combine(original, &signals);
                r.explain = Some(ScoreExplanation::Reranked { original, signals });
                r
            })
            .collect();

        // `sort_by` is stable, so equal scores keep their incoming order.
        rescored.sort_by(|a, b| b.score.total_cmp(&a.score));
        rescored.truncate(top_k);
        rescored
    }
}

/// Compute the six reranking signals for one fragment.
pub fn signals(query: &str, text: &str) -> RerankSignals {
    compute_signals(&PreparedQuery::new(query), text)
}

fn compute_signals(query: &PreparedQuery, text: &str) -> RerankSignals {
    let frag_tokens = tokenize(text);
    let length_penalty = 1.0 / (1.0 + frag_tokens.len() as f64 / LENGTH_PENALTY_TOKENS);

    if query.tokens.is_empty() || frag_tokens.is_empty() {
        return RerankSignals {
            length_penalty,
            ..RerankSignals::default()
        };
    }

    let frag_terms: HashSet<&str> = frag_tokens.iter().map(String::as_str).collect();

    let matched = query
        .tokens
        .iter()
        .filter(|t| frag_terms.contains(t.as_str()))
        .count();
    let overlap = matched as f64 / query.tokens.len() as f64;

    let covered = query
        .distinct
        .iter()
        .filter(|t| frag_terms.contains(t.as_str()))
        .count();
    let coverage = covered as f64 / query.distinct.len() as f64;

    let bigram = if query.bigrams.is_empty() {
        0.0
    } else {
        let frag_bigrams: HashSet<(&str, &str)> = frag_tokens
            .windows(2)
            .map(|w| (w[0].as_str(), w[1].as_str()))
            .collect();
        let found = query
            .bigrams
            .iter()
            .filter(|(a, b)| frag_bigrams.contains(&(a.as_str(), b.as_str())))
            .count();
        found as f64 / query.bigrams.len() as f64
    };

    let positions: Vec<usize> = frag_tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| query.distinct.contains(t.as_str()))
        .map(|(i, _)| i)
        .collect();

    let (density, position) = match (positions.first(), positions.last()) {
        (Some(&first), Some(&last)) => {
            let span = (last - first + 1) as f64;
            (
                positions.len() as f64 / span,
                1.0 / (1.0 + first as f64 / POSITION_DECAY_TOKENS),
            )
        }
        _ => (0.0, 0.0),
    };

    RerankSignals {
        overlap,
        bigram,
        density,
        position,
        coverage,
        length_penalty,
    }
}
