//! # Recall Core
//!
//! Shared, WASM-safe retrieval logic for Recall: fragment models, the
//! tokenizer, BM25 and vector indexes, hybrid ranking, heuristic
//! reranking, query expansion, and the multi-hop controller.
//!
//! This crate contains no tokio runtime, filesystem I/O, or network
//! clients. Embedding models are reached only through the
//! [`embedding::EmbeddingProvider`] trait, and multi-hop retrieval only
//! through [`multihop::Retriever`]; the application crate supplies both.

pub mod embedding;
pub mod error;
pub mod expand;
pub mod index;
pub mod lexical;
pub mod models;
pub mod multihop;
pub mod rerank;
pub mod search;
pub mod tokenize;
pub mod vector;

pub use error::{Error, Result};
