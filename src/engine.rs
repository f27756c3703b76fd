//! The retrieval service.
//!
//! [`RetrievalEngine`] owns the live index snapshot, the serialized
//! embedding funnel, the query expander, and the reranker. It is the only
//! place where the core algorithms meet I/O and the embedding model.
//!
//! # Concurrency
//!
//! ```text
//!   search / multi_hop ──▶ clone Arc<IndexSnapshot> ──▶ score (sync, lock-free)
//!          │
//!          └──▶ SerialEmbedder ──(tokio Mutex)──▶ EmbeddingProvider
//!
//!   build_index / load_index ──(build lock)──▶ new IndexSnapshot ──▶ swap Arc under RwLock
//! ```
//!
//! The `RwLock` is held only long enough to clone or replace the `Arc`,
//! so a search runs against whichever snapshot was live when it started
//! and never sees a half-built index. Builds and loads run one at a time,
//! and a build persists the generation it built, so the files on disk
//! always describe one snapshot. The embedding provider sees at most one
//! outstanding call.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use recall_core::embedding::EmbeddingProvider;
use recall_core::expand::QueryExpander;
use recall_core::index::CorpusIndex;
use recall_core::models::{Fragment, ScoredResult};
use recall_core::multihop::{self, Retriever};
use recall_core::rerank::Reranker;
use recall_core::vector::VectorIndex;
use recall_core::{Error, Result};

use crate::config::Config;
use crate::embedding::create_provider;
use crate::persist::{EmbeddingFile, IndexStore};
use crate::progress::{IndexProgressEvent, IndexProgressReporter};
use crate::stats::IndexStats;

/// An immutable, fully built index generation.
#[derive(Debug, Default)]
pub struct IndexSnapshot {
    pub index: CorpusIndex,
    /// Model that produced the vectors, if any.
    pub model: Option<String>,
}

/// Funnels every embedding call through one lock.
///
/// The model behind an [`EmbeddingProvider`] is not assumed to tolerate
/// concurrent inference, so the lock is held across each call.
pub struct SerialEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    lock: tokio::sync::Mutex<()>,
}

impl SerialEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// A provider reporting zero dimensions is disabled.
    pub fn is_enabled(&self) -> bool {
        self.provider.dims() > 0
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let _guard = self.lock.lock().await;
        self.provider.embed(text).await.map_err(model_not_ready)
    }

    pub async fn embed_batch(
        &self,
        texts: &[String],
        progress: &(dyn Fn(usize, usize) + Send + Sync),
    ) -> Result<Vec<Vec<f32>>> {
        let _guard = self.lock.lock().await;
        let vectors = self
            .provider
            .embed_batch(texts, progress)
            .await
            .map_err(model_not_ready)?;
        if vectors.len() != texts.len() {
            return Err(Error::ModelNotReady(format!(
                "provider returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }
}

fn model_not_ready(e: anyhow::Error) -> Error {
    Error::ModelNotReady(format!("{:#}", e))
}

/// Retrieval over an in-memory corpus with optional vector fusion,
/// heuristic reranking, and multi-hop expansion.
pub struct RetrievalEngine {
    config: Config,
    store: IndexStore,
    embedder: SerialEmbedder,
    expander: QueryExpander,
    reranker: Reranker,
    snapshot: RwLock<Arc<IndexSnapshot>>,
    build_lock: tokio::sync::Mutex<()>,
}

impl RetrievalEngine {
    /// Create an engine with an explicit provider and expander. The index
    /// starts empty; call [`load_index`](Self::load_index) or
    /// [`build_index`](Self::build_index).
    pub fn new(
        config: Config,
        provider: Arc<dyn EmbeddingProvider>,
        expander: QueryExpander,
    ) -> Self {
        let store = IndexStore::new(config.index.dir.clone());
        Self {
            config,
            store,
            embedder: SerialEmbedder::new(provider),
            expander,
            reranker: Reranker::default(),
            snapshot: RwLock::new(Arc::new(IndexSnapshot::default())),
            build_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Create an engine from configuration: the configured provider and
    /// the configured synonym table.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let provider = create_provider(&config.embedding)?;
        let synonyms = config.expansion.load_synonyms()?;
        Ok(Self::new(config, provider, QueryExpander::new(synonyms)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn expander(&self) -> &QueryExpander {
        &self.expander
    }

    pub fn reranker(&self) -> &Reranker {
        &self.reranker
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// The live snapshot. Holding it keeps that generation alive across a
    /// concurrent rebuild.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn swap(&self, next: Arc<IndexSnapshot>) {
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        *guard = next;
    }

    pub fn stats(&self) -> IndexStats {
        let snapshot = self.snapshot();
        IndexStats::from_index(&snapshot.index, snapshot.model.as_deref())
    }

    /// Ranked fragments for `query`.
    ///
    /// With `use_hybrid` and a non-empty vector index the query is embedded
    /// and fused with BM25; an embedding failure is returned as
    /// [`Error::ModelNotReady`]. Otherwise, or when the provider is
    /// disabled, this is [`search_lexical_only`](Self::search_lexical_only)
    /// and the provider is never called.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        use_hybrid: bool,
    ) -> Result<Vec<ScoredResult>> {
        let snapshot = self.snapshot();

        if !use_hybrid || snapshot.index.vectors().is_empty() {
            return Ok(snapshot.index.search_lexical_only(query, top_k));
        }
        if !self.embedder.is_enabled() {
            warn!(
                vectors = snapshot.index.embedded_count(),
                "embedding provider is disabled; searching lexical-only"
            );
            return Ok(snapshot.index.search_lexical_only(query, top_k));
        }

        let query_vec = self.embedder.embed(query).await?;
        let results = snapshot.index.search_hybrid(
            query,
            Some(query_vec.as_slice()),
            self.config.retrieval.search_params(top_k),
        );
        debug!(query, top_k, results = results.len(), "hybrid search");
        Ok(results)
    }

    pub fn search_lexical_only(&self, query: &str, top_k: usize) -> Vec<ScoredResult> {
        self.snapshot().index.search_lexical_only(query, top_k)
    }

    pub fn rerank(&self, query: &str, results: Vec<ScoredResult>, top_k: usize) -> Vec<ScoredResult> {
        self.reranker.rerank(query, results, top_k)
    }

    /// Embed and index `fragments`, persist them, and make them live.
    ///
    /// Fragments are embedded in order with per-fragment progress. If the
    /// provider is disabled the new index is lexical-only. An embedding
    /// failure aborts the build and leaves the previous snapshot live. A
    /// persistence failure is returned after the new snapshot has been
    /// swapped in.
    pub async fn build_index(
        &self,
        fragments: Vec<Fragment>,
        progress: Option<&dyn IndexProgressReporter>,
    ) -> Result<()> {
        let _build = self.build_lock.lock().await;
        let report = |event: IndexProgressEvent| {
            if let Some(p) = progress {
                p.report(event);
            }
        };
        report(IndexProgressEvent::Loading);
        info!(fragments = fragments.len(), "building index");

        let (vectors, model) = if self.embedder.is_enabled() && !fragments.is_empty() {
            let texts: Vec<String> = fragments.iter().map(|f| f.text.clone()).collect();
            let on_progress = |n: usize, total: usize| {
                report(IndexProgressEvent::Embedding {
                    n: n as u64,
                    total: total as u64,
                });
            };
            let embedded = self.embedder.embed_batch(&texts, &on_progress).await?;
            let vectors = VectorIndex::from_records(
                fragments.iter().map(|f| f.id.clone()).zip(embedded),
            );
            (vectors, Some(self.embedder.model_name().to_string()))
        } else {
            (VectorIndex::new(), None)
        };

        let index = CorpusIndex::with_params(
            fragments,
            vectors,
            self.config.retrieval.bm25_params(),
        );
        let file = embedding_file(&index, model.as_deref());
        let (fragment_count, vector_count) = (index.len(), index.embedded_count());

        let next = Arc::new(IndexSnapshot { index, model });
        self.swap(Arc::clone(&next));

        report(IndexProgressEvent::Persisting);
        self.store.save_corpus(next.index.fragments())?;
        self.store.save_embeddings(&file)?;

        info!(
            fragments = fragment_count,
            vectors = vector_count,
            dir = %self.store.dir().display(),
            "index built"
        );
        report(IndexProgressEvent::Ready {
            fragments: fragment_count as u64,
            vectors: vector_count as u64,
        });
        Ok(())
    }

    /// Load the persisted index and make it live.
    ///
    /// Missing or unreadable files are not fatal: a bad corpus loads as an
    /// empty corpus, and bad embeddings load as an empty vector index, so
    /// search continues lexical-only. Embeddings whose id or text no longer
    /// matches the corpus are skipped.
    pub async fn load_index(&self) -> Result<()> {
        let _build = self.build_lock.lock().await;
        let fragments = match self.store.load_corpus() {
            Ok(Some(fragments)) => fragments,
            Ok(None) => {
                info!(path = %self.store.corpus_path().display(), "no persisted corpus; starting empty");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "failed to load corpus; starting empty");
                Vec::new()
            }
        };

        let file = match self.store.load_embeddings() {
            Ok(file) => file.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "failed to load embeddings; continuing lexical-only");
                EmbeddingFile::default()
            }
        };

        let (vectors, model) = restore_vectors(&fragments, file);
        if let Some(model) = &model {
            if self.embedder.is_enabled() && model != self.embedder.model_name() {
                warn!(
                    persisted = %model,
                    configured = %self.embedder.model_name(),
                    "persisted embeddings come from a different model; rebuild the index"
                );
            }
        }

        let index = CorpusIndex::with_params(
            fragments,
            vectors,
            self.config.retrieval.bm25_params(),
        );
        info!(
            fragments = index.len(),
            vectors = index.embedded_count(),
            "index loaded"
        );
        self.swap(Arc::new(IndexSnapshot { index, model }));
        Ok(())
    }

    /// Multi-hop retrieval returning up to `top_k` formatted context
    /// strings for the generation step.
    pub async fn multi_hop_retrieve(
        &self,
        query: &str,
        max_hops: usize,
        top_k: usize,
    ) -> Result<Vec<String>> {
        multihop::multi_hop_retrieve(self, &self.expander, query, max_hops, top_k).await
    }

    /// [`multi_hop_retrieve`](Self::multi_hop_retrieve) with the configured
    /// `multi_hop.max_hops` and `retrieval.final_limit`.
    pub async fn retrieve_context(&self, query: &str) -> Result<Vec<String>> {
        self.multi_hop_retrieve(
            query,
            self.config.multi_hop.max_hops,
            self.config.retrieval.final_limit,
        )
        .await
    }
}

#[async_trait]
impl Retriever for RetrievalEngine {
    /// Oversampled hybrid search followed by reranking to `top_k`.
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ScoredResult>> {
        let shortlist = top_k.saturating_mul(self.config.retrieval.oversample.max(1));
        let results = self.search(query, shortlist, true).await?;
        Ok(self.rerank(query, results, top_k))
    }
}

/// Persisted form of the vectors attached to `index`, in corpus order.
fn embedding_file(index: &CorpusIndex, model: Option<&str>) -> EmbeddingFile {
    let mut file = EmbeddingFile {
        model: model.map(str::to_string),
        ..EmbeddingFile::default()
    };
    for fragment in index.fragments() {
        if let Some(vector) = index.vectors().get(&fragment.id) {
            file.ids.push(fragment.id.clone());
            file.texts.push(fragment.text.clone());
            file.vectors.push(vector.to_vec());
        }
    }
    file
}

/// Rebuild a vector index from a persisted file, keeping only records that
/// still describe a fragment of `fragments`.
fn restore_vectors(fragments: &[Fragment], file: EmbeddingFile) -> (VectorIndex, Option<String>) {
    let by_id: HashMap<&str, &Fragment> = fragments.iter().map(|f| (f.id.as_str(), f)).collect();
    let total = file.len();

    let records: Vec<(String, Vec<f32>)> = file
        .ids
        .into_iter()
        .zip(file.texts)
        .zip(file.vectors)
        .filter_map(|((id, text), vector)| match by_id.get(id.as_str()) {
            Some(fragment) if fragment.text == text => Some((id, vector)),
            _ => None,
        })
        .collect();

    let stale = total - records.len();
    if stale > 0 {
        warn!(stale, "skipped embeddings that no longer match the corpus");
    }

    let model = if records.is_empty() { None } else { file.model };
    (VectorIndex::from_unit_records(records), model)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragments() -> Vec<Fragment> {
        vec![
            Fragment::new("a", "lazy fox", "s"),
            Fragment::new("b", "lazy cat", "s"),
        ]
    }

    #[test]
    fn restore_skips_stale_and_foreign_records() {
        let file = EmbeddingFile {
            model: Some("fake".into()),
            ids: vec!["a".into(), "b".into(), "zzz".into()],
            texts: vec!["lazy fox".into(), "edited text".into(), "gone".into()],
            vectors: vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0]],
        };
        let (vectors, model) = restore_vectors(&fragments(), file);
        assert_eq!(vectors.len(), 1);
        assert!(vectors.get("a").is_some());
        assert_eq!(model.as_deref(), Some("fake"));
    }

    #[test]
    fn restore_without_records_has_no_model() {
        let file = EmbeddingFile {
            model: Some("fake".into()),
            ..EmbeddingFile::default()
        };
        let (vectors, model) = restore_vectors(&fragments(), file);
        assert!(vectors.is_empty());
        assert!(model.is_none());
    }

    #[test]
    fn embedding_file_follows_corpus_order() {
        let vectors = VectorIndex::from_records(vec![
            ("b".to_string(), vec![0.0, 2.0]),
            ("a".to_string(), vec![3.0, 0.0]),
        ]);
        let index = CorpusIndex::new(fragments(), vectors);
        let file = embedding_file(&index, Some("fake"));
        assert_eq!(file.ids, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(file.texts, vec!["lazy fox".to_string(), "lazy cat".to_string()]);
        assert_eq!(file.vectors[0], vec![1.0, 0.0]);
    }
}
