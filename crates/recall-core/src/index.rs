//! An immutable, searchable snapshot of the corpus.
//!
//! [`CorpusIndex`] owns the ordered fragments together with the lexical
//! statistics derived from them and the vector index loaded or built for
//! them. It is never mutated after construction; a rebuild produces a new
//! snapshot which the engine swaps in atomically.

use crate::lexical::{Bm25Params, LexicalIndex};
use crate::models::Fragment;
use crate::vector::VectorIndex;

#[derive(Debug, Clone, Default)]
pub struct CorpusIndex {
    fragments: Vec<Fragment>,
    lexical: LexicalIndex,
    vectors: VectorIndex,
}

impl CorpusIndex {
    /// Build a snapshot with default BM25 parameters.
    pub fn new(fragments: Vec<Fragment>, vectors: VectorIndex) -> Self {
        Self::with_params(fragments, vectors, Bm25Params::default())
    }

    pub fn with_params(fragments: Vec<Fragment>, vectors: VectorIndex, params: Bm25Params) -> Self {
        let lexical = LexicalIndex::build_with_params(&fragments, params);
        Self {
            fragments,
            lexical,
            vectors,
        }
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn fragment(&self, position: usize) -> Option<&Fragment> {
        self.fragments.get(position)
    }

    pub fn lexical(&self) -> &LexicalIndex {
        &self.lexical
    }

    pub fn vectors(&self) -> &VectorIndex {
        &self.vectors
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Number of corpus fragments that have a vector of the index dimension.
    pub fn embedded_count(&self) -> usize {
        let dims = self.vectors.dims();
        self.fragments
            .iter()
            .filter(|f| match (self.vectors.get(&f.id), dims) {
                (Some(v), Some(d)) => v.len() == d,
                _ => false,
            })
            .count()
    }
}
