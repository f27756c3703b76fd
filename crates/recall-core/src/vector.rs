//! In-memory vector index keyed by fragment id.
//!
//! Vectors are L2-normalized on insert, so similarity is a plain dot
//! product. Search is a brute-force scan, which is fast enough for corpora
//! of tens of thousands of fragments.
//!
//! An empty index is an explicit, valid state: every query against it
//! returns zero similarity, which the hybrid ranker turns into a
//! lexical-only ranking.

use std::collections::HashMap;

use tracing::warn;

use crate::embedding::{dot_similarity, l2_normalize};

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub id: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    records: Vec<EmbeddingRecord>,
    by_id: HashMap<String, usize>,
    dims: Option<usize>,
    mismatched: usize,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from parallel id/vector sequences.
    pub fn from_records(records: impl IntoIterator<Item = (String, Vec<f32>)>) -> Self {
        let mut index = Self::new();
        for (id, vector) in records {
            index.insert(id, vector);
        }
        index
    }

    /// Insert or replace the vector for `id`.
    ///
    /// The first vector fixes the index dimension. A vector of another
    /// dimension is still stored (it will score `0.0` against queries) but
    /// is counted as a corpus-consistency fault.
    pub fn insert(&mut self, id: impl Into<String>, mut vector: Vec<f32>) {
        l2_normalize(&mut vector);
        self.insert_unit(id, vector);
    }

    /// Build an index from vectors that are already unit length, such as
    /// the records of a previously built index. Stored bits are kept as is.
    pub fn from_unit_records(records: impl IntoIterator<Item = (String, Vec<f32>)>) -> Self {
        let mut index = Self::new();
        for (id, vector) in records {
            index.insert_unit(id, vector);
        }
        index
    }

    /// Insert a vector without normalizing it.
    pub fn insert_unit(&mut self, id: impl Into<String>, vector: Vec<f32>) {
        let id = id.into();

        match self.dims {
            None if !vector.is_empty() => self.dims = Some(vector.len()),
            Some(dims) if dims != vector.len() => {
                warn!(
                    fragment = %id,
                    expected = dims,
                    actual = vector.len(),
                    "embedding dimension mismatch; fragment will score 0"
                );
                self.mismatched += 1;
            }
            _ => {}
        }

        match self.by_id.get(&id) {
            Some(&slot) => self.records[slot].vector = vector,
            None => {
                self.by_id.insert(id.clone(), self.records.len());
                self.records.push(EmbeddingRecord { id, vector });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Dimension fixed by the first inserted vector.
    pub fn dims(&self) -> Option<usize> {
        self.dims
    }

    /// Number of inserted vectors whose dimension disagreed with [`dims`](Self::dims).
    pub fn mismatched_count(&self) -> usize {
        self.mismatched
    }

    pub fn get(&self, id: &str) -> Option<&[f32]> {
        self.by_id
            .get(id)
            .map(|&slot| self.records[slot].vector.as_slice())
    }

    pub fn records(&self) -> &[EmbeddingRecord] {
        &self.records
    }

    /// Similarity of `query` against the vector of `id`; `0.0` when the
    /// fragment has no vector or dimensions disagree.
    pub fn similarity(&self, query: &[f32], id: &str) -> f64 {
        self.get(id)
            .map(|v| dot_similarity(query, v) as f64)
            .unwrap_or(0.0)
    }

    /// Similarity of `query` against every id in `ids`, in the same order.
    ///
    /// This is the whole-corpus form used by hybrid fusion: pass the
    /// corpus ids to get one score per fragment.
    pub fn similarities<'a>(&self, query: &[f32], ids: impl IntoIterator<Item = &'a str>) -> Vec<f64> {
        ids.into_iter().map(|id| self.similarity(query, id)).collect()
    }

    /// The `k` most similar `(id, similarity)` pairs, descending, ties in
    /// insertion order.
    pub fn top_k(&self, query: &[f32], k: usize) -> Vec<(&str, f64)> {
        let mut scored: Vec<(usize, f64)> = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (i, dot_similarity(query, &r.vector) as f64))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        scored
            .into_iter()
            .map(|(i, s)| (self.records[i].id.as_str(), s))
            .collect()
    }
}
