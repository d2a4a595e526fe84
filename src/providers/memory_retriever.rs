//! In-memory vector-store retriever — the one concrete [`Retriever`]
//! implementation this crate ships, backed by cosine similarity over an
//! [`Embedder`]. Not a production vector database; a minimal reference
//! backend that exercises the full `Retriever` port the way the reference
//! implementation's own `retrieval/retriever.py` factory exercises
//! whichever concrete client it dispatches to.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::Error;
use crate::item::{Item, SiteSelector};

use super::{Embedder, Retriever};

struct Indexed {
    item: Item,
    embedding: Vec<f32>,
}

/// A cosine-similarity retriever over an in-process item index.
pub struct InMemoryRetriever {
    embedder: Arc<dyn Embedder>,
    items: AsyncMutex<Vec<Indexed>>,
}

impl InMemoryRetriever {
    /// An empty retriever that embeds queries/items through `embedder`.
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            items: AsyncMutex::new(Vec::new()),
        }
    }
}

fn site_matches(selector: &SiteSelector, site: &str) -> bool {
    match selector {
        SiteSelector::All => true,
        SiteSelector::Sites(sites) => sites.iter().any(|s| s == site),
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl Retriever for InMemoryRetriever {
    async fn search(&self, query: &str, site: &SiteSelector, num_results: usize) -> Result<Vec<Item>, Error> {
        let query_embedding = self.embedder.embed(query).await?;
        let items = self.items.lock().await;
        let mut scored: Vec<(f32, &Item)> = items
            .iter()
            .filter(|indexed| site_matches(site, &indexed.item.site))
            .map(|indexed| (cosine_similarity(&query_embedding, &indexed.embedding), &indexed.item))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        Ok(scored.into_iter().take(num_results).map(|(_, item)| item.clone()).collect())
    }

    async fn search_by_url(&self, url: &str) -> Result<Option<Item>, Error> {
        let items = self.items.lock().await;
        Ok(items.iter().find(|indexed| indexed.item.url == url).map(|indexed| indexed.item.clone()))
    }

    async fn delete_by_site(&self, site: &str) -> Result<usize, Error> {
        let mut items = self.items.lock().await;
        let before = items.len();
        items.retain(|indexed| indexed.item.site != site);
        Ok(before - items.len())
    }

    async fn upload(&self, new_items: &[Item]) -> Result<usize, Error> {
        let texts: Vec<String> = new_items.iter().map(|item| item.schema_json.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        let mut items = self.items.lock().await;
        for (item, embedding) in new_items.iter().zip(embeddings) {
            items.push(Indexed {
                item: item.clone(),
                embedding,
            });
        }
        Ok(new_items.len())
    }
}
