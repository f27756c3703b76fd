//! BM25 lexical index over an in-memory fragment corpus.
//!
//! # Scoring
//!
//! For each fragment, the score of a query is the sum over query terms of:
//!
//! ```text
//! idf(t)  = ln((N - df + 0.5) / (df + 0.5) + 1)
//! tf_norm = tf·(k1 + 1) / (tf + k1·(1 - b + b·|frag| / avgLen))
//! score   = Σ idf(t) · tf_norm(t, frag)
//! ```
//!
//! Terms absent from the corpus have `df = 0`, which yields a small
//! positive idf (standard BM25 smoothing). Since their `tf` is also zero
//! they contribute nothing to any fragment.
//!
//! Entries are derived from fragments at build time and never persisted.

use std::collections::HashMap;

use crate::models::Fragment;
use crate::tokenize::tokenize;

/// BM25 saturation and length-normalization parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// Derived per-fragment term statistics.
#[derive(Debug, Clone, Default)]
pub struct LexicalEntry {
    /// Term sequence in document order.
    pub terms: Vec<String>,
    /// Term frequencies.
    pub term_freqs: HashMap<String, u32>,
}

impl LexicalEntry {
    pub fn from_text(text: &str) -> Self {
        let terms = tokenize(text);
        let mut term_freqs: HashMap<String, u32> = HashMap::new();
        for term in &terms {
            *term_freqs.entry(term.clone()).or_insert(0) += 1;
        }
        Self { terms, term_freqs }
    }

    /// Number of tokens in the fragment.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Corpus-wide BM25 statistics. Entry `i` describes fragment `i` of the
/// corpus the index was built from.
#[derive(Debug, Clone, Default)]
pub struct LexicalIndex {
    entries: Vec<LexicalEntry>,
    doc_freqs: HashMap<String, u32>,
    avg_len: f64,
    params: Bm25Params,
}

impl LexicalIndex {
    /// Build an index with the default parameters (`k1 = 1.5`, `b = 0.75`).
    pub fn build(fragments: &[Fragment]) -> Self {
        Self::build_with_params(fragments, Bm25Params::default())
    }

    pub fn build_with_params(fragments: &[Fragment], params: Bm25Params) -> Self {
        let entries: Vec<LexicalEntry> = fragments
            .iter()
            .map(|f| LexicalEntry::from_text(&f.text))
            .collect();

        let mut doc_freqs: HashMap<String, u32> = HashMap::new();
        for entry in &entries {
            for term in entry.term_freqs.keys() {
                *doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }
        }

        let total_len: usize = entries.iter().map(LexicalEntry::len).sum();
        let avg_len = if entries.is_empty() {
            0.0
        } else {
            total_len as f64 / entries.len() as f64
        };

        Self {
            entries,
            doc_freqs,
            avg_len,
            params,
        }
    }

    /// Number of indexed fragments.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn params(&self) -> Bm25Params {
        self.params
    }

    /// Average fragment length in tokens.
    pub fn avg_len(&self) -> f64 {
        self.avg_len
    }

    /// Number of distinct terms in the corpus.
    pub fn vocabulary_size(&self) -> usize {
        self.doc_freqs.len()
    }

    pub fn entry(&self, position: usize) -> Option<&LexicalEntry> {
        self.entries.get(position)
    }

    /// Number of fragments containing `term`.
    pub fn doc_freq(&self, term: &str) -> u32 {
        self.doc_freqs.get(term).copied().unwrap_or(0)
    }

    /// Smoothed inverse document frequency. Never negative.
    pub fn idf(&self, term: &str) -> f64 {
        let n = self.entries.len() as f64;
        let df = self.doc_freq(term) as f64;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Raw BM25 score of `query` for every fragment, in corpus order.
    ///
    /// An empty corpus yields an empty vector; an empty query yields all
    /// zeros.
    pub fn score_all(&self, query: &str) -> Vec<f64> {
        let query_terms = tokenize(query);
        self.score_terms(&query_terms)
    }

    pub fn score_terms(&self, query_terms: &[String]) -> Vec<f64> {
        let idfs: Vec<(&str, f64)> = query_terms
            .iter()
            .map(|t| (t.as_str(), self.idf(t)))
            .collect();
        // All-empty fragments would otherwise divide by zero.
        let avg_len = if self.avg_len > 0.0 { self.avg_len } else { 1.0 };
        let Bm25Params { k1, b } = self.params;

        self.entries
            .iter()
            .map(|entry| {
                let frag_len = entry.len() as f64;
                idfs.iter()
                    .map(|(term, idf)| {
                        let tf = entry.term_freqs.get(*term).copied().unwrap_or(0) as f64;
                        if tf == 0.0 {
                            return 0.0;
                        }
                        let tf_norm =
                            tf * (k1 + 1.0) / (tf + k1 * (1.0 - b + b * frag_len / avg_len));
                        idf * tf_norm
                    })
                    .sum()
            })
            .collect()
    }

    /// Top-`k` `(position, raw score)` pairs, descending, ties in corpus
    /// order.
    pub fn search(&self, query: &str, k: usize) -> Vec<(usize, f64)> {
        let mut scored: Vec<(usize, f64)> = self.score_all(query).into_iter().enumerate().collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn corpus(texts: &[&str]) -> Vec<Fragment> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Fragment::new(format!("f{}", i), *t, "test"))
            .collect()
    }

    #[test]
    fn test_empty_corpus_scores_nothing() {
        let index = LexicalIndex::build(&[]);
        assert!(index.is_empty());
        assert!(index.score_all("anything").is_empty());
        assert!(index.search("anything", 5).is_empty());
    }

    #[test]
    fn test_empty_query_scores_zero() {
        let index = LexicalIndex::build(&corpus(&["lazy fox", "brown bear"]));
        assert_eq!(index.score_all(""), vec![0.0, 0.0]);
        let hits = index.search("", 5);
        assert_eq!(hits.iter().map(|h| h.0).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_statistics() {
        let index = LexicalIndex::build(&corpus(&["lazy fox jumps", "lazy cat"]));
        assert_eq!(index.len(), 2);
        assert_eq!(index.doc_freq("lazy"), 2);
        assert_eq!(index.doc_freq("fox"), 1);
        assert_eq!(index.doc_freq("dog"), 0);
        assert!((index.avg_len() - 2.5).abs() < 1e-9);
        assert_eq!(index.vocabulary_size(), 4);
        assert_eq!(index.entry(0).map(LexicalEntry::len), Some(3));
    }

    #[test]
    fn test_unseen_term_idf_is_positive() {
        let index = LexicalIndex::build(&corpus(&["lazy fox", "lazy cat"]));
        assert!(index.idf("zebra") > 0.0);
        assert!(index.idf("zebra") > index.idf("lazy"));
    }

    #[test]
    fn test_matches_reference_formula() {
        let index = LexicalIndex::build(&corpus(&["swift swift code", "rust code base here"]));
        let scores = index.score_all("swift");
        let n = 2.0f64;
        let df = 1.0f64;
        let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
        let avg = 3.5f64;
        let tf = 2.0f64;
        let expected = idf * tf * 2.5 / (tf + 1.5 * (1.0 - 0.75 + 0.75 * 3.0 / avg));
        assert!((scores[0] - expected).abs() < 1e-12);
        assert_eq!(scores[1], 0.0);
    }

    #[test]
    fn test_lazy_scenario() {
        let index = LexicalIndex::build(&corpus(&[
            "The lazy fox sleeps under the old oak tree.",
            "A lazy cat naps on the warm windowsill.",
            "The brown bear catches salmon in the river.",
            "Swift is a programming language for Apple platforms.",
        ]));
        let top: Vec<usize> = index.search("lazy", 2).into_iter().map(|h| h.0).collect();
        assert!(top.contains(&0));
        assert!(top.contains(&1));
    }

    #[test]
    fn test_frequency_scenario() {
        let index = LexicalIndex::build(&corpus(&[
            "Swift mention once with some other words here.",
            "Swift Swift Swift repeated words here today.",
        ]));
        let top = index.search("swift", 2);
        assert_eq!(top[0].0, 1);
        assert!(top[0].1 > top[1].1);
    }

    #[test]
    fn test_all_empty_fragments_do_not_divide_by_zero() {
        let index = LexicalIndex::build(&corpus(&["", "a b"]));
        let scores = index.score_all("anything");
        assert!(scores.iter().all(|s| s.is_finite()));
    }

    proptest! {
        /// Raising a term's frequency in one fragment, at constant length,
        /// never lowers that fragment's score.
        #[test]
        fn prop_bm25_monotone_in_tf(
            filler in 1usize..12,
            extra in 1usize..6,
            others in proptest::collection::vec("[a-z]{3,6}", 1..6),
        ) {
            let total = filler + extra;
            let low: Vec<String> = std::iter::once("target".to_string())
                .chain(std::iter::repeat("filler".to_string()).take(total - 1))
                .collect();
            let high: Vec<String> = std::iter::repeat("target".to_string())
                .take(1 + extra)
                .chain(std::iter::repeat("filler".to_string()).take(total - 1 - extra))
                .collect();

            let mut texts_low = vec![low.join(" ")];
            let mut texts_high = vec![high.join(" ")];
            for o in &others {
                texts_low.push(o.clone());
                texts_high.push(o.clone());
            }
            let low_refs: Vec<&str> = texts_low.iter().map(String::as_str).collect();
            let high_refs: Vec<&str> = texts_high.iter().map(String::as_str).collect();

            let s_low = LexicalIndex::build(&corpus(&low_refs)).score_all("target")[0];
            let s_high = LexicalIndex::build(&corpus(&high_refs)).score_all("target")[0];
            prop_assert!(s_high >= s_low - 1e-12, "low={} high={}", s_low, s_high);
        }
    }
}
