//! 文档索引
//!
//! 接收已切分好的代码块 `{content, file_path}`，嵌入后写入指定命名空间。

use std::sync::Arc;

use codesage_core::Result;
use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingProvider;
use crate::store::VectorStore;
use crate::types::VectorItem;

/// 每次嵌入请求的最大文档数
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// 待索引文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub file_path: String,
}

impl Document {
    pub fn new(content: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            file_path: file_path.into(),
        }
    }
}

pub struct DocumentIndexer {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    batch_size: usize,
}

impl DocumentIndexer {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// 写入命名空间, 返回写入条数 (空白文档被跳过)
    pub async fn index(&self, namespace: &str, documents: Vec<Document>) -> Result<usize> {
        let documents: Vec<Document> = documents
            .into_iter()
            .filter(|doc| !doc.content.trim().is_empty())
            .collect();

        let mut indexed = 0;
        for batch in documents.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|doc| doc.content.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;

            let items: Vec<VectorItem> = batch
                .iter()
                .zip(vectors)
                .map(|(doc, vector)| {
                    VectorItem::new(
                        namespace,
                        vector,
                        serde_json::json!({
                            "content": doc.content,
                            "file_path": doc.file_path,
                        }),
                    )
                })
                .collect();

            indexed += self.store.upsert_batch(items).await?;
        }

        tracing::info!("Indexed {} documents into {}", indexed, namespace);
        Ok(indexed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{NamespacedSearch, PassageSearch, SearchHit};
    use crate::store::MemoryStore;
    use crate::embedding::{Embedding, Embeddings};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 按关键词出现与否生成向量
    struct KeywordEmbedding {
        calls: AtomicUsize,
    }

    const KEYWORDS: [&str; 4] = ["parse", "config", "server", "test"];

    impl KeywordEmbedding {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedding {
        fn name(&self) -> &str {
            "keyword"
        }

        fn model(&self) -> &str {
            "keyword-v1"
        }

        async fn embed(&self, text: &str) -> Result<Embedding> {
            let lower = text.to_lowercase();
            Ok(KEYWORDS
                .iter()
                .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
                .collect())
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Embeddings> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed(text).await?);
            }
            Ok(out)
        }
    }

    #[tokio::test]
    async fn test_index_then_search_namespace() {
        let embedder = Arc::new(KeywordEmbedding::new());
        let store = Arc::new(MemoryStore::new());
        let indexer = DocumentIndexer::new(embedder.clone(), store.clone()).with_batch_size(2);

        let count = indexer
            .index(
                "code-chunks",
                vec![
                    Document::new("fn parse(input: &str)", "src/parser.rs"),
                    Document::new("fn load_config()", "src/config.rs"),
                    Document::new("   ", "src/empty.rs"),
                    Document::new("async fn server()", "src/server.rs"),
                ],
            )
            .await
            .unwrap();
        assert_eq!(count, 3);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);

        indexer
            .index("summaries", vec![Document::new("parse module summary", "src/parser.rs")])
            .await
            .unwrap();

        let search = NamespacedSearch::new(embedder, store, "code-chunks");
        let hits = search.search("how does parse work", 1).await.unwrap();
        assert_eq!(
            hits,
            vec![SearchHit::new("fn parse(input: &str)", "src/parser.rs")]
        );
    }

    #[tokio::test]
    async fn test_index_empty_input() {
        let indexer = DocumentIndexer::new(
            Arc::new(KeywordEmbedding::new()),
            Arc::new(MemoryStore::new()),
        );
        assert_eq!(indexer.index("code-chunks", Vec::new()).await.unwrap(), 0);
    }
}
