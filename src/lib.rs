//! # Recall
//!
//! The retrieval core of a local, offline knowledge assistant.
//!
//! Given a natural-language query and a previously indexed corpus of
//! document fragments, Recall returns the fragments most relevant to the
//! query. It fuses BM25 and vector similarity into one ranking, reranks
//! the shortlist with lexical heuristics, and can iterate retrieval over
//! several hops for compound questions. Every stage degrades to
//! lexical-only search when embeddings are missing.
//!
//! ## Architecture
//!
//! ```text
//!            ┌───────────────┐
//!  query ───▶│ QueryExpander │
//!            └──────┬────────┘
//!                   ▼
//!   ┌──────────────────────────────┐     ┌──────────┐
//!   │ Hybrid ranker (BM25 + vector)│────▶│ Reranker │───▶ ranked fragments
//!   └──────────────────────────────┘     └────┬─────┘
//!                   ▲                         │
//!                   └──── derived query ◀─────┘  (multi-hop)
//! ```
//!
//! The algorithms live in the `recall-core` crate; this crate adds the
//! service around them.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`embedding`] | Embedding provider implementations |
//! | [`engine`] | The [`RetrievalEngine`](engine::RetrievalEngine) service |
//! | [`persist`] | On-disk index layout |
//! | [`progress`] | Index build progress reporting |
//! | [`stats`] | Index statistics |

pub mod config;
pub mod embedding;
pub mod engine;
pub mod persist;
pub mod progress;
pub mod stats;
