//! Core data models shared by every retrieval stage.
//!
//! A [`Fragment`] is the atomic retrievable unit produced by ingestion.
//! A [`ScoredResult`] is the transient output of ranking; its ordering is
//! the primary contract of every search operation.

use serde::{Deserialize, Serialize};

/// Number of leading characters of a fragment's text used in its dedup key.
pub const DEDUP_PREFIX_CHARS: usize = 50;

/// An immutable slice of a source document, identified only by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    /// Unique, stable identifier.
    pub id: String,
    /// Fragment body.
    pub text: String,
    /// Name of the source document.
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,
}

impl Fragment {
    pub fn new(id: impl Into<String>, text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source: source.into(),
            page: None,
            section: None,
            chapter: None,
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    pub fn with_chapter(mut self, chapter: impl Into<String>) -> Self {
        self.chapter = Some(chapter.into());
        self
    }

    /// Key used to deduplicate retrieved context: `source:first-50-chars`.
    pub fn dedup_key(&self) -> String {
        let prefix: String = self.text.chars().take(DEDUP_PREFIX_CHARS).collect();
        format!("{}:{}", self.source, prefix)
    }

    /// Format this fragment as a context entry for the generation step.
    ///
    /// ```rust
    /// use recall_core::models::Fragment;
    ///
    /// let f = Fragment::new("f1", "Water boils at 100C.", "field-guide.pdf").with_page(12);
    /// assert_eq!(f.context_string(), "[field-guide.pdf, p. 12] Water boils at 100C.");
    /// ```
    pub fn context_string(&self) -> String {
        let mut locator = Vec::new();
        if let Some(page) = self.page {
            locator.push(format!("p. {}", page));
        }
        if let Some(section) = &self.section {
            locator.push(format!("§ {}", section));
        }
        if let Some(chapter) = &self.chapter {
            locator.push(format!("ch. {}", chapter));
        }

        if locator.is_empty() {
            format!("[{}] {}", self.source, self.text)
        } else {
            format!("[{}, {}] {}", self.source, locator.join(", "), self.text)
        }
    }
}

/// A ranked fragment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredResult {
    pub fragment: Fragment,
    /// Position of the fragment in the loaded corpus.
    pub position: usize,
    /// Relevance score; higher is better.
    pub score: f64,
    /// Scoring breakdown, when the producing stage records one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explain: Option<ScoreExplanation>,
}

/// How a [`ScoredResult`]'s score was produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum ScoreExplanation {
    /// Output of the hybrid ranker.
    Hybrid {
        /// Min-max normalized BM25 score.
        lexical: f64,
        /// Min-max normalized vector similarity.
        semantic: f64,
        /// Effective blend weight `w` in `(1-w)*lexical + w*semantic`.
        weight: f64,
    },
    /// Output of the reranker.
    Reranked {
        original: f64,
        signals: RerankSignals,
    },
}

/// The six heuristic signals computed by the reranker, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RerankSignals {
    pub overlap: f64,
    pub bigram: f64,
    pub density: f64,
    pub position: f64,
    pub coverage: f64,
    pub length_penalty: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_key_truncates_to_fifty_chars() {
        let text = "a".repeat(80);
        let f = Fragment::new("x", text, "book");
        let key = f.dedup_key();
        assert_eq!(key, format!("book:{}", "a".repeat(50)));
    }

    #[test]
    fn dedup_key_short_text() {
        let f = Fragment::new("x", "short", "notes.md");
        assert_eq!(f.dedup_key(), "notes.md:short");
    }

    #[test]
    fn context_string_without_metadata() {
        let f = Fragment::new("x", "body", "notes.md");
        assert_eq!(f.context_string(), "[notes.md] body");
    }

    #[test]
    fn context_string_with_all_metadata() {
        let f = Fragment::new("x", "body", "manual")
            .with_page(3)
            .with_section("Wiring")
            .with_chapter("2");
        assert_eq!(f.context_string(), "[manual, p. 3, § Wiring, ch. 2] body");
    }

    #[test]
    fn fragment_json_omits_missing_metadata() {
        let f = Fragment::new("x", "body", "notes.md");
        let json = serde_json::to_string(&f).unwrap();
        assert!(!json.contains("page"));
        let back: Fragment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
    }
}
