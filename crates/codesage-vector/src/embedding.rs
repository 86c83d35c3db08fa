//! Embedding Provider Trait
//!
//! 定义独立的嵌入向量生成接口, 默认实现复用 `AIProvider::embed`

use std::sync::Arc;

use async_trait::async_trait;
use codesage_ai::{AIProvider, EmbeddingRequest};
use codesage_core::{CodeSageError, Result};

pub type Embedding = Vec<f32>;
pub type Embeddings = Vec<Embedding>;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    async fn embed(&self, text: &str) -> Result<Embedding>;
    async fn embed_batch(&self, texts: &[String]) -> Result<Embeddings>;
}

/// 基于语言模型提供商的嵌入
pub struct ProviderEmbedding {
    provider: Arc<dyn AIProvider>,
    model: String,
}

impl ProviderEmbedding {
    pub fn new(provider: Arc<dyn AIProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for ProviderEmbedding {
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| CodeSageError::AIProvider("嵌入结果为空".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Embeddings> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .provider
            .embed(EmbeddingRequest::new(self.model.clone(), texts.to_vec()))
            .await?;

        if response.embeddings.len() != texts.len() {
            return Err(CodeSageError::AIProvider(format!(
                "嵌入数量不匹配: 期望 {}, 实际 {}",
                texts.len(),
                response.embeddings.len()
            )));
        }

        Ok(response.embeddings)
    }
}
