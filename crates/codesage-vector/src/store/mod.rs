//! 向量存储抽象层实现

mod memory;
#[cfg(feature = "qdrant")]
mod qdrant;

use async_trait::async_trait;
use codesage_core::{Result, VectorBackend, VectorConfig};
use std::sync::Arc;

pub use memory::MemoryStore;
#[cfg(feature = "qdrant")]
pub use qdrant::QdrantStore;

use super::types::{SearchQuery, SearchResult, StoreStats, VectorItem};

/// 向量存储 Trait
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, item: VectorItem) -> Result<()>;
    async fn upsert_batch(&self, items: Vec<VectorItem>) -> Result<usize>;
    async fn search(&self, query: SearchQuery) -> Result<Vec<SearchResult>>;
    async fn get(&self, id: &str) -> Result<Option<VectorItem>>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn stats(&self) -> Result<StoreStats>;
    async fn clear(&self) -> Result<()>;
}

#[derive(Debug, Clone)]
pub enum StoreBackend {
    Memory,
    Qdrant {
        url: String,
        collection: String,
        api_key: Option<String>,
    },
}

impl StoreBackend {
    /// 从 `vector` 配置段解析后端
    pub fn from_config(config: &VectorConfig) -> Result<Self> {
        match config.backend {
            VectorBackend::Memory => Ok(Self::Memory),
            VectorBackend::Qdrant => {
                let url = config.url.clone().ok_or_else(|| {
                    codesage_core::CodeSageError::Config("qdrant 后端必须配置 vector.url".to_string())
                })?;
                Ok(Self::Qdrant {
                    url,
                    collection: config.collection.clone(),
                    api_key: config.api_key.clone(),
                })
            }
        }
    }
}

pub fn create_store(backend: StoreBackend) -> Result<Arc<dyn VectorStore>> {
    match backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        #[cfg(feature = "qdrant")]
        StoreBackend::Qdrant {
            url,
            collection,
            api_key,
        } => {
            let store = QdrantStore::new(&url, &collection, api_key)?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "qdrant"))]
        StoreBackend::Qdrant { .. } => Err(codesage_core::CodeSageError::VectorStore(
            "Qdrant support not compiled in, rebuild with --features qdrant".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_default_config() {
        let backend = StoreBackend::from_config(&VectorConfig::default()).unwrap();
        assert!(matches!(backend, StoreBackend::Memory));
    }

    #[test]
    fn test_qdrant_backend_requires_url() {
        let config = VectorConfig {
            backend: VectorBackend::Qdrant,
            ..VectorConfig::default()
        };
        assert!(StoreBackend::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_create_memory_store() {
        let store = create_store(StoreBackend::Memory).unwrap();
        assert_eq!(store.stats().await.unwrap().total_vectors, 0);
    }
}
