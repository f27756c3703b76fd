//! Iterative multi-hop retrieval.
//!
//! Compound questions often need context that the first pass cannot reach
//! with the original wording. The controller runs a bounded sequence of
//! retrieval passes, each one steered by terms mined from what the previous
//! pass found:
//!
//! ```text
//! Hop0 ──retrieve──▶ HopN ──retrieve──▶ … ──▶ Exhausted
//!   │                  │
//!   └── query = expand(original)
//!                      └── query = expand(original) + top-3 new terms
//! ```
//!
//! A session is `Exhausted` when `max_hops` passes have run or the derived
//! query was already issued. Queries are compared by their token sequence,
//! so case and punctuation never count as a new direction. If it still holds fewer than `top_k` unique items,
//! a fallback loop runs the expander's unused variants until `2 × top_k`
//! items are collected or the variants run out. Both loops are bounded.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::expand::QueryExpander;
use crate::models::ScoredResult;
use crate::tokenize::tokenize;

/// Number of mined terms appended to the original query per hop.
pub const TERMS_PER_HOP: usize = 3;

/// Common words never used to steer the next hop.
pub const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
    "one", "our", "out", "has", "his", "how", "its", "may", "new", "now", "see", "two", "way",
    "who", "did", "get", "him", "let", "say", "she", "too", "use", "that", "with", "have",
    "this", "will", "your", "from", "they", "been", "were", "said", "each", "which", "their",
    "there", "what", "when", "where", "why", "would", "about", "into", "them", "then", "than",
    "these", "those", "some", "such", "only", "also", "other", "more", "most", "very", "just",
    "over", "under", "after", "before", "while", "because", "should", "could", "does", "being",
    "here", "upon", "both", "same", "many", "much", "must", "whom", "whose",
];

/// Anything that can produce a ranked list for a query.
///
/// The engine implements this as hybrid search with oversampling followed
/// by reranking; tests use a plain lexical index.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ScoredResult>>;
}

/// Progress of a [`RetrievalSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopState {
    /// No pass has run yet.
    Hop0,
    /// `n` passes have run and another may follow.
    HopN(usize),
    /// No further hops will run.
    Exhausted,
}

/// Per-call state of a multi-hop retrieval.
#[derive(Debug, Clone)]
pub struct RetrievalSession {
    base_query: String,
    current_query: String,
    hops_run: usize,
    state: HopState,
    seen: HashSet<String>,
    contexts: Vec<String>,
    used_queries: HashSet<String>,
}

impl RetrievalSession {
    /// `first_query` is the hop 0 query; every derived query extends it.
    pub fn new(first_query: String) -> Self {
        Self {
            base_query: first_query.clone(),
            current_query: first_query,
            hops_run: 0,
            state: HopState::Hop0,
            seen: HashSet::new(),
            contexts: Vec::new(),
            used_queries: HashSet::new(),
        }
    }

    pub fn state(&self) -> HopState {
        self.state
    }

    pub fn hops_run(&self) -> usize {
        self.hops_run
    }

    pub fn current_query(&self) -> &str {
        &self.current_query
    }

    /// Unique context strings in first-seen order.
    pub fn contexts(&self) -> &[String] {
        &self.contexts
    }

    /// Record a pass's results; returns the ones not seen before.
    pub fn absorb(&mut self, results: Vec<ScoredResult>) -> Vec<ScoredResult> {
        let mut fresh = Vec::new();
        for result in results {
            if self.seen.insert(result.fragment.dedup_key()) {
                self.contexts.push(result.fragment.context_string());
                fresh.push(result);
            }
        }
        fresh
    }

    /// Mark `query` as issued; returns `false` if an equivalent query was
    /// issued before.
    fn mark_used(&mut self, query: &str) -> bool {
        self.used_queries.insert(query_key(query))
    }

    fn was_used(&self, query: &str) -> bool {
        self.used_queries.contains(&query_key(query))
    }

    fn into_contexts(self, top_k: usize) -> Vec<String> {
        let mut contexts = self.contexts;
        contexts.truncate(top_k);
        contexts
    }
}

fn query_key(query: &str) -> String {
    tokenize(query).join(" ")
}

/// Build the next hop's query: `base` plus the most frequent new terms of
/// `fresh`.
///
/// Candidates are tokens of the fresh results' text that are not stopwords
/// and not already in `base`. They are ranked by frequency, ties broken by
/// first occurrence.
pub fn derive_next_query(base: &str, fresh: &[ScoredResult]) -> String {
    let original_terms: HashSet<String> = tokenize(base).into_iter().collect();

    // term -> (count, first occurrence)
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut order = 0usize;
    for result in fresh {
        for term in tokenize(&result.fragment.text) {
            if original_terms.contains(&term) || STOPWORDS.contains(&term.as_str()) {
                continue;
            }
            let entry = counts.entry(term).or_insert((0, order));
            entry.0 += 1;
            order += 1;
        }
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(term, (count, first))| (term, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    let mut query = base.trim().to_string();
    for (term, _, _) in ranked.into_iter().take(TERMS_PER_HOP) {
        if !query.is_empty() {
            query.push(' ');
        }
        query.push_str(&term);
    }
    query
}

/// Run multi-hop retrieval and return up to `top_k` context strings.
///
/// `max_hops` is clamped to at least one pass. `top_k == 0` returns an
/// empty list without touching the retriever. Retriever errors abort the
/// call.
pub async fn multi_hop_retrieve<R>(
    retriever: &R,
    expander: &QueryExpander,
    query: &str,
    max_hops: usize,
    top_k: usize,
) -> Result<Vec<String>>
where
    R: Retriever + ?Sized,
{
    if top_k == 0 {
        return Ok(Vec::new());
    }
    let max_hops = max_hops.max(1);

    let mut session = RetrievalSession::new(expander.expand(query));

    while session.state != HopState::Exhausted {
        let hop_query = session.current_query.clone();
        let results = retriever.retrieve(&hop_query, top_k).await?;
        session.mark_used(&hop_query);

        let fresh = session.absorb(results);
        session.hops_run += 1;
        debug!(
            hop = session.hops_run,
            query = %hop_query,
            new_items = fresh.len(),
            total = session.contexts.len(),
            "multi-hop pass"
        );

        if session.hops_run >= max_hops {
            session.state = HopState::Exhausted;
            continue;
        }

        let next = derive_next_query(&session.base_query, &fresh);
        if session.was_used(&next) {
            debug!(hop = session.hops_run, "no new direction; stopping");
            session.state = HopState::Exhausted;
        } else {
            session.current_query = next;
            session.state = HopState::HopN(session.hops_run);
        }
    }

    if session.contexts.len() < top_k {
        let target = top_k.saturating_mul(2);
        for variant in expander.generate_variants(query) {
            if session.contexts.len() >= target {
                break;
            }
            if !session.mark_used(&variant) {
                continue;
            }
            let results = retriever.retrieve(&variant, top_k).await?;
            let fresh = session.absorb(results);
            debug!(
                query = %variant,
                new_items = fresh.len(),
                total = session.contexts.len(),
                "multi-hop fallback pass"
            );
        }
    }

    Ok(session.into_contexts(top_k))
}
