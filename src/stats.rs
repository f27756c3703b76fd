//! Index statistics and health overview.
//!
//! Provides a quick summary of what is loaded: fragment count, vocabulary,
//! embedding coverage, and dimension faults. Gives confidence that a build
//! or reload produced what was expected.

use std::fmt;

use recall_core::index::CorpusIndex;
use serde::Serialize;

use crate::progress::format_number;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexStats {
    pub fragments: usize,
    /// Distinct lexical terms.
    pub vocabulary: usize,
    /// Average fragment length in tokens.
    pub avg_fragment_len: f64,
    /// Corpus fragments with a usable vector.
    pub vectors: usize,
    pub dims: Option<usize>,
    /// Vectors whose dimension disagrees with the index.
    pub mismatched_vectors: usize,
    /// Model that produced the loaded vectors.
    pub model: Option<String>,
}

impl IndexStats {
    pub fn from_index(index: &CorpusIndex, model: Option<&str>) -> Self {
        Self {
            fragments: index.len(),
            vocabulary: index.lexical().vocabulary_size(),
            avg_fragment_len: index.lexical().avg_len(),
            vectors: index.embedded_count(),
            dims: index.vectors().dims(),
            mismatched_vectors: index.vectors().mismatched_count(),
            model: model.map(str::to_string),
        }
    }

    /// Percentage of fragments with a usable vector.
    pub fn coverage_percent(&self) -> usize {
        if self.fragments > 0 {
            (self.vectors * 100) / self.fragments
        } else {
            0
        }
    }
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Recall: Index Stats")?;
        writeln!(f, "====================")?;
        writeln!(f)?;
        writeln!(f, "  Fragments:   {}", format_number(self.fragments as u64))?;
        writeln!(f, "  Vocabulary:  {}", format_number(self.vocabulary as u64))?;
        writeln!(f, "  Avg length:  {:.1} tokens", self.avg_fragment_len)?;
        writeln!(
            f,
            "  Embedded:    {} / {} ({}%)",
            format_number(self.vectors as u64),
            format_number(self.fragments as u64),
            self.coverage_percent()
        )?;
        match (&self.model, self.dims) {
            (Some(model), Some(dims)) => writeln!(f, "  Model:       {} ({} dims)", model, dims)?,
            (Some(model), None) => writeln!(f, "  Model:       {}", model)?,
            (None, _) => writeln!(f, "  Model:       none (lexical only)")?,
        }
        if self.mismatched_vectors > 0 {
            writeln!(
                f,
                "  Warning:     {} vectors have the wrong dimension and score 0",
                self.mismatched_vectors
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_core::models::Fragment;
    use recall_core::vector::VectorIndex;

    #[test]
    fn stats_for_lexical_only_index() {
        let index = CorpusIndex::new(
            vec![
                Fragment::new("a", "lazy fox sleeps", "s"),
                Fragment::new("b", "lazy cat", "s"),
            ],
            VectorIndex::new(),
        );
        let stats = IndexStats::from_index(&index, None);
        assert_eq!(stats.fragments, 2);
        assert_eq!(stats.vocabulary, 4);
        assert_eq!(stats.vectors, 0);
        assert_eq!(stats.coverage_percent(), 0);

        let text = stats.to_string();
        assert!(text.contains("lexical only"));
        assert!(!text.contains("Warning"));
    }

    #[test]
    fn stats_report_coverage_and_mismatches() {
        let vectors = VectorIndex::from_records(vec![
            ("a".to_string(), vec![1.0, 0.0]),
            ("b".to_string(), vec![1.0, 0.0, 0.0]),
        ]);
        let index = CorpusIndex::new(
            vec![
                Fragment::new("a", "lazy fox", "s"),
                Fragment::new("b", "lazy cat", "s"),
            ],
            vectors,
        );
        let stats = IndexStats::from_index(&index, Some("fake"));
        assert_eq!(stats.vectors, 1);
        assert_eq!(stats.coverage_percent(), 50);
        assert_eq!(stats.mismatched_vectors, 1);
        assert!(stats.to_string().contains("fake (2 dims)"));
    }

    #[test]
    fn empty_stats() {
        let stats = IndexStats::default();
        assert_eq!(stats.coverage_percent(), 0);
    }
}
