//! Passage retrieval over an in-memory vector index
//!
//! Embedding is a Tower seam: any service mapping text to a vector works.
//! [`HashingEmbedder`] is the deterministic default, a token-hash projection
//! that needs no network and keeps retrieval tests hermetic. Similarity is
//! cosine over normalized vectors.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tower::{util::BoxCloneSyncService, BoxError, Service, ServiceExt};
use tracing::debug;

/// One retrievable chunk of corpus text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,
    pub source: String,
}

/// Boxed retriever: query text in, ranked passages out.
pub type RetrieverSvc = BoxCloneSyncService<String, Vec<Passage>, BoxError>;

/// Boxed embedder: text in, vector out.
pub type EmbeddingSvc = BoxCloneSyncService<String, Vec<f32>, BoxError>;

/// Deterministic bag-of-tokens embedder. Each lowercased alphanumeric token
/// hashes to a dimension; vectors are L2-normalized.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self { dimensions: 256 }
    }
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let idx = (hasher.finish() as usize) % self.dimensions;
            vector[idx] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }

    pub fn boxed(self) -> EmbeddingSvc {
        BoxCloneSyncService::new(tower::service_fn(move |text: String| {
            let embedder = self.clone();
            async move { Ok::<_, BoxError>(embedder.embed(&text)) }
        }))
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn rank(entries: &[(Vec<f32>, Passage)], query_vec: &[f32], top_k: usize) -> Vec<Passage> {
    let mut scored: Vec<(f32, &Passage)> = entries
        .iter()
        .map(|(vec, passage)| (cosine(query_vec, vec), passage))
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(top_k).map(|(_, p)| p.clone()).collect()
}

/// In-memory vector index with exhaustive cosine scan. Fine for the corpus
/// sizes this system handles.
pub struct InMemoryIndex {
    embedder: EmbeddingSvc,
    entries: Vec<(Vec<f32>, Passage)>,
    top_k: usize,
}

impl InMemoryIndex {
    pub fn new(embedder: EmbeddingSvc) -> Self {
        Self {
            embedder,
            entries: Vec::new(),
            top_k: 4,
        }
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    pub async fn add(&mut self, passage: Passage) -> Result<(), BoxError> {
        let vector = self
            .embedder
            .ready()
            .await?
            .call(passage.content.clone())
            .await?;
        self.entries.push((vector, passage));
        Ok(())
    }

    pub async fn add_all(
        &mut self,
        passages: impl IntoIterator<Item = Passage>,
    ) -> Result<(), BoxError> {
        for passage in passages {
            self.add(passage).await?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Passage>, BoxError> {
        let mut embedder = self.embedder.clone();
        let query_vec = embedder.ready().await?.call(query.to_string()).await?;
        debug!(query_len = query.len(), candidates = self.entries.len(), "index scan");
        Ok(rank(&self.entries, &query_vec, self.top_k))
    }

    /// Wrap the finished index as a boxed retriever service.
    pub fn into_retriever(self) -> RetrieverSvc {
        let Self {
            embedder,
            entries,
            top_k,
        } = self;
        let entries = Arc::new(entries);
        BoxCloneSyncService::new(tower::service_fn(move |query: String| {
            let mut embedder = embedder.clone();
            let entries = entries.clone();
            async move {
                let query_vec = embedder.ready().await?.call(query).await?;
                Ok::<_, BoxError>(rank(&entries, &query_vec, top_k))
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(content: &str, source: &str) -> Passage {
        Passage {
            content: content.to_string(),
            source: source.to_string(),
        }
    }

    #[test]
    fn test_embedding_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("loan servicing complaint");
        let b = embedder.embed("loan servicing complaint");
        assert_eq!(a, b);

        let norm = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_search_prefers_overlapping_vocabulary() {
        let mut index = InMemoryIndex::new(HashingEmbedder::default().boxed()).top_k(1);
        index
            .add_all(vec![
                passage("the borrower disputed the mortgage interest rate", "loans.csv"),
                passage("the café served espresso and pastries", "food.csv"),
            ])
            .await
            .unwrap();

        let hits = index.search("mortgage interest dispute").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, "loans.csv");
    }

    #[tokio::test]
    async fn test_retriever_service_caps_at_top_k() {
        let mut index = InMemoryIndex::new(HashingEmbedder::default().boxed()).top_k(2);
        index
            .add_all(vec![
                passage("alpha one", "a"),
                passage("alpha two", "b"),
                passage("alpha three", "c"),
            ])
            .await
            .unwrap();

        let mut retriever = index.into_retriever();
        let hits = retriever
            .ready()
            .await
            .unwrap()
            .call("alpha".to_string())
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
    }
}
