//! 段落检索能力
//!
//! 检索方只需要 "查询文本 → 前 K 个 {content, file_path}"，
//! `NamespacedSearch` 用嵌入 + 向量存储 + 命名空间实现它。

use std::sync::Arc;

use async_trait::async_trait;
use codesage_core::Result;
use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingProvider;
use crate::store::VectorStore;
use crate::types::{SearchQuery, SearchResult};

/// 检索命中
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchHit {
    pub content: String,
    pub file_path: String,
}

impl SearchHit {
    pub fn new(content: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            file_path: file_path.into(),
        }
    }

    /// 从存储 payload 还原, 缺少的字段视为空串
    pub fn from_result(result: &SearchResult) -> Self {
        let field = |key: &str| {
            result.payload[key]
                .as_str()
                .unwrap_or_default()
                .to_string()
        };
        Self {
            content: field("content"),
            file_path: field("file_path"),
        }
    }
}

#[async_trait]
pub trait PassageSearch: Send + Sync {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>>;
}

/// 在单个命名空间内做相似度检索
pub struct NamespacedSearch {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    namespace: String,
}

impl NamespacedSearch {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            store,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

#[async_trait]
impl PassageSearch for NamespacedSearch {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let vector = self.embedder.embed(query).await?;
        let results = self
            .store
            .search(
                SearchQuery::new(vector)
                    .with_namespace(self.namespace.as_str())
                    .with_limit(top_k),
            )
            .await?;

        tracing::debug!(
            "Search in {} returned {} hits for {:?}",
            self.namespace,
            results.len(),
            query
        );
        Ok(results.iter().map(SearchHit::from_result).collect())
    }
}
