//! AI 提供商实现

mod factory;
mod gemini;
mod openai_compatible;

pub use factory::*;
pub use gemini::*;
pub use openai_compatible::*;

use async_trait::async_trait;
use codesage_core::{Message, Result};

use crate::schema::ResponseSchema;
use crate::types::{ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse};

/// AI 提供商 Trait
#[async_trait]
pub trait AIProvider: Send + Sync {
    /// 提供商名称
    fn name(&self) -> &str;

    /// 发送聊天请求
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// 结构化输出
    ///
    /// 返回值已经通过 `schema` 校验。默认实现在提示词末尾追加格式说明,
    /// 支持原生 JSON 模式的提供商应当覆盖。
    async fn chat_structured(
        &self,
        mut request: ChatRequest,
        schema: &ResponseSchema,
    ) -> Result<serde_json::Value> {
        request.messages.push(Message::user(schema.instruction()));
        let response = self.chat(request).await?;
        schema.parse(response.text())
    }

    /// 生成嵌入向量
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse>;

    /// 检查健康状态
    async fn health_check(&self) -> Result<bool>;
}

/// 提供商配置
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub default_model: String,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_key: Some(api_key.into()),
            base_url: None,
            default_model: String::new(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;
    use crate::types::{FinishReason, TokenUsage};
    use codesage_core::CodeSageError;
    use std::sync::Mutex;

    /// 只实现 chat 的提供商, 用来验证默认结构化输出
    struct CannedProvider {
        reply: String,
        seen: Mutex<Vec<ChatRequest>>,
    }

    #[async_trait]
    impl AIProvider for CannedProvider {
        fn name(&self) -> &str {
            "canned"
        }

        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
            let model = request.model.clone();
            self.seen.lock().unwrap().push(request);
            Ok(ChatResponse {
                id: "1".to_string(),
                model,
                message: Message::assistant(self.reply.clone()),
                usage: TokenUsage::default(),
                finish_reason: FinishReason::Stop,
            })
        }

        async fn embed(&self, _request: EmbeddingRequest) -> Result<EmbeddingResponse> {
            unimplemented!()
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
    }

    fn schema() -> ResponseSchema {
        ResponseSchema::new("evaluation")
            .field("is_supported", FieldType::Boolean, "")
            .field("reasoning", FieldType::String, "")
    }

    #[tokio::test]
    async fn test_default_structured_appends_instruction_and_validates() {
        let provider = CannedProvider {
            reply: r#"{"is_supported": true, "reasoning": "seen in lib.rs"}"#.to_string(),
            seen: Mutex::new(Vec::new()),
        };

        let request = ChatRequest::new("m", vec![Message::user("check this")]);
        let value = provider.chat_structured(request, &schema()).await.unwrap();
        assert_eq!(value["is_supported"], serde_json::json!(true));

        let seen = provider.seen.lock().unwrap();
        let last = seen[0].messages.last().unwrap();
        assert!(last.text_content().contains("JSON Schema"));
    }

    #[tokio::test]
    async fn test_default_structured_rejects_invalid_reply() {
        let provider = CannedProvider {
            reply: r#"{"is_supported": "yes", "reasoning": "x"}"#.to_string(),
            seen: Mutex::new(Vec::new()),
        };

        let request = ChatRequest::new("m", vec![Message::user("check this")]);
        let err = provider.chat_structured(request, &schema()).await.unwrap_err();
        assert!(matches!(err, CodeSageError::SchemaViolation(_)));
    }

    #[test]
    fn test_provider_config_builder() {
        let config = ProviderConfig::new("gemini", "key")
            .with_base_url("http://localhost:9999")
            .with_default_model("gemini-2.5-flash");
        assert_eq!(config.api_key.as_deref(), Some("key"));
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:9999"));
        assert_eq!(config.default_model, "gemini-2.5-flash");
    }
}
