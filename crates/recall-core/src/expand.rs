//! Query expansion with an injected synonym table.
//!
//! The synonym table is data, not code: it is loaded from TOML (or built
//! in memory) and handed to [`QueryExpander::new`]. An empty table turns
//! [`QueryExpander::expand`] into plain normalization.
//!
//! ```toml
//! [synonyms]
//! water = ["hydration", "drinking"]
//! fire = ["flame", "combustion"]
//! ```

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::tokenize::tokenize;

/// Words that mark a query as already phrased as a question.
pub const INTERROGATIVES: &[&str] = &[
    "what", "how", "why", "when", "where", "who", "whom", "whose", "which",
];

/// Term → synonyms mapping. Keys are stored lowercase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynonymTable {
    entries: HashMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct SynonymFile {
    #[serde(default)]
    synonyms: HashMap<String, Vec<String>>,
}

impl SynonymTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `[synonyms]` TOML table.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: SynonymFile = toml::from_str(content)
            .map_err(|e| Error::InvalidConfig(format!("synonym table: {}", e)))?;
        Ok(file.synonyms.into_iter().collect())
    }

    pub fn insert<I, S>(&mut self, term: &str, synonyms: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries
            .entry(term.to_lowercase())
            .or_default()
            .extend(synonyms.into_iter().map(Into::into));
    }

    pub fn get(&self, term: &str) -> Option<&[String]> {
        self.entries.get(term).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Vec<String>)> for SynonymTable {
    fn from_iter<T: IntoIterator<Item = (S, Vec<String>)>>(iter: T) -> Self {
        let mut table = Self::new();
        for (term, synonyms) in iter {
            let term: String = term.into();
            table.insert(&term, synonyms);
        }
        table
    }
}

/// Stateless query rewriter over a fixed [`SynonymTable`].
#[derive(Debug, Clone, Default)]
pub struct QueryExpander {
    table: SynonymTable,
}

impl QueryExpander {
    pub fn new(table: SynonymTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &SynonymTable {
        &self.table
    }

    /// Normalize `query` and append synonyms of every known term.
    ///
    /// Original tokens come first, in order; synonyms follow, skipping any
    /// term already emitted.
    pub fn expand(&self, query: &str) -> String {
        let tokens = tokenize(query);
        let mut seen: HashSet<String> = tokens.iter().cloned().collect();
        let mut out = tokens.clone();

        for token in &tokens {
            let Some(synonyms) = self.table.get(token) else {
                continue;
            };
            for synonym in synonyms {
                for term in tokenize(synonym) {
                    if seen.insert(term.clone()) {
                        out.push(term);
                    }
                }
            }
        }

        out.join(" ")
    }

    /// Alternative phrasings of `query` for recall-oriented fallback passes.
    ///
    /// Returns the original, the expanded form if it differs, and, unless
    /// the query already opens with an interrogative, `"what is X"` and
    /// `"how does X"`.
    pub fn generate_variants(&self, query: &str) -> Vec<String> {
        let original = query.trim().to_string();
        let mut variants = vec![original.clone()];

        let expanded = self.expand(&original);
        if !expanded.is_empty() && expanded != original {
            variants.push(expanded);
        }

        if !original.is_empty() && !starts_with_interrogative(&original) {
            variants.push(format!("what is {}", original));
            variants.push(format!("how does {}", original));
        }

        variants
    }
}

fn starts_with_interrogative(query: &str) -> bool {
    query
        .split(|c: char| !c.is_alphanumeric())
        .find(|w| !w.is_empty())
        .map(|w| INTERROGATIVES.contains(&w.to_lowercase().as_str()))
        .unwrap_or(false)
}
