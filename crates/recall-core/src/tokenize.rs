//! Text normalization shared by lexical scoring, reranking, query
//! expansion, and multi-hop term mining.

/// Tokens of this many characters or fewer are dropped.
pub const MIN_TOKEN_CHARS: usize = 2;

/// Lowercase `text`, split it on non-alphanumeric boundaries, and drop
/// tokens of two characters or fewer.
///
/// ```rust
/// use recall_core::tokenize::tokenize;
///
/// assert_eq!(tokenize("The Lazy-Fox, at 42 knots!"), vec!["the", "lazy", "fox", "knots"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > MIN_TOKEN_CHARS)
        .map(|t| t.to_lowercase())
        .collect()
}
