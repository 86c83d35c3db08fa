//! 内存向量存储 (用于测试和开发)

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use crate::VectorStore;
use crate::types::{SearchQuery, SearchResult, StoreStats, VectorItem};
use codesage_core::{CodeSageError, Result};

/// 内存向量存储
pub struct MemoryStore {
    data: RwLock<HashMap<String, VectorItem>>,
}

fn poisoned<T>(_: T) -> CodeSageError {
    CodeSageError::VectorStore("Lock poisoned".to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            0.0
        } else {
            dot / (norm_a * norm_b)
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn upsert(&self, item: VectorItem) -> Result<()> {
        let mut data = self.data.write().map_err(poisoned)?;
        data.insert(item.id.clone(), item);
        Ok(())
    }

    async fn upsert_batch(&self, items: Vec<VectorItem>) -> Result<usize> {
        let mut data = self.data.write().map_err(poisoned)?;
        let count = items.len();
        for item in items {
            data.insert(item.id.clone(), item);
        }
        Ok(count)
    }

    async fn search(&self, query: SearchQuery) -> Result<Vec<SearchResult>> {
        let data = self.data.read().map_err(poisoned)?;

        let mut results: Vec<SearchResult> = data
            .values()
            .filter(|item| match &query.namespace {
                Some(ns) => &item.namespace == ns,
                None => true,
            })
            .map(|item| SearchResult {
                id: item.id.clone(),
                score: Self::cosine_similarity(&query.vector, &item.vector),
                payload: item.payload.clone(),
            })
            .collect();

        // 同分时按 id 排序, 保证结果稳定
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        if let Some(min_score) = query.min_score {
            results.retain(|r| r.score >= min_score);
        }

        results.truncate(query.limit);

        Ok(results)
    }

    async fn get(&self, id: &str) -> Result<Option<VectorItem>> {
        let data = self.data.read().map_err(poisoned)?;
        Ok(data.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut data = self.data.write().map_err(poisoned)?;
        data.remove(id);
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let data = self.data.read().map_err(poisoned)?;
        let mut namespaces = BTreeMap::new();
        for item in data.values() {
            *namespaces.entry(item.namespace.clone()).or_insert(0) += 1;
        }
        Ok(StoreStats {
            total_vectors: data.len(),
            namespaces,
            last_updated: Utc::now(),
        })
    }

    async fn clear(&self) -> Result<()> {
        let mut data = self.data.write().map_err(poisoned)?;
        data.clear();
        Ok(())
    }
}
