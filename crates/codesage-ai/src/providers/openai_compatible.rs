//! OpenAI 兼容提供商通用实现
//!
//! 支持所有兼容 OpenAI API 格式的提供商：
//! - OpenAI
//! - DeepSeek
//! - OpenRouter
//! - Ollama (OpenAI 兼容端点)
//! - 其他自定义 OpenAI 兼容 API

use async_trait::async_trait;
use codesage_core::{CodeSageError, Message, Result};
use reqwest::header;
use serde_json::{Value, json};

use crate::providers::{AIProvider, ProviderConfig};
use crate::schema::ResponseSchema;
use crate::types::{
    ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, FinishReason, TokenUsage,
};

/// OpenAI 兼容提供商信息
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub name: &'static str,
    pub default_base_url: &'static str,
}

/// OpenAI 兼容提供商通用实现
pub struct OpenAICompatibleProvider {
    config: ProviderConfig,
    client: reqwest::Client,
    provider_info: ProviderInfo,
}

impl OpenAICompatibleProvider {
    /// 创建新的 OpenAI 兼容提供商
    pub fn new(config: ProviderConfig, provider_info: ProviderInfo) -> Self {
        let client = reqwest::Client::new();
        Self {
            config,
            client,
            provider_info,
        }
    }

    /// 获取基础 URL
    fn get_base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(self.provider_info.default_base_url)
            .trim_end_matches('/')
    }

    /// 转换消息格式
    fn convert_messages(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|m| {
                json!({
                    "role": m.role.as_str(),
                    "content": m.text_content()
                })
            })
            .collect()
    }

    fn build_body(request: &ChatRequest, schema: Option<&ResponseSchema>) -> Value {
        let mut body = json!({
            "model": request.model,
            "messages": Self::convert_messages(&request.messages),
        });

        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(schema) = schema {
            body["response_format"] = json!({
                "type": "json_schema",
                "json_schema": {
                    "name": schema.name,
                    "strict": true,
                    "schema": schema.to_json_schema(),
                }
            });
        }

        body
    }

    fn parse_response(json: &Value) -> ChatResponse {
        let choice = &json["choices"][0];
        let message_content = choice["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        let finish_reason = match choice["finish_reason"].as_str() {
            Some("stop") | None => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            Some(_) => FinishReason::Error,
        };

        let usage = TokenUsage::new(
            json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as usize,
            json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as usize,
        );

        ChatResponse {
            id: json["id"].as_str().unwrap_or("").to_string(),
            model: json["model"].as_str().unwrap_or("").to_string(),
            message: Message::assistant(message_content),
            usage,
            finish_reason,
        }
    }

    async fn post(&self, path: &str, body: &Value, what: &str) -> Result<Value> {
        let url = format!("{}/{}", self.get_base_url(), path);
        let name = self.provider_info.name;

        let mut builder = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(body);
        if let Some(api_key) = self.config.api_key.as_deref() {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", api_key));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CodeSageError::Http(format!("{} {} 请求失败: {}", name, what, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(CodeSageError::AIProvider(format!(
                "{} {} 错误 ({}): {}",
                name, what, status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| CodeSageError::AIProvider(format!("解析响应失败: {}", e)))
    }
}

#[async_trait]
impl AIProvider for OpenAICompatibleProvider {
    fn name(&self) -> &str {
        self.provider_info.name
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let body = Self::build_body(&request, None);
        let json = self.post("chat/completions", &body, "API").await?;
        Ok(Self::parse_response(&json))
    }

    async fn chat_structured(
        &self,
        request: ChatRequest,
        schema: &ResponseSchema,
    ) -> Result<Value> {
        let body = Self::build_body(&request, Some(schema));
        let json = self.post("chat/completions", &body, "API").await?;
        schema.parse(Self::parse_response(&json).text())
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let body = json!({
            "model": request.model,
            "input": request.input
        });

        let json = self.post("embeddings", &body, "Embedding API").await?;

        let embeddings: Vec<Vec<f32>> = json["data"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|item| item["embedding"].as_array())
                    .map(|emb| {
                        emb.iter()
                            .filter_map(|v| v.as_f64())
                            .map(|v| v as f32)
                            .collect()
                    })
                    .collect()
            })
            .unwrap_or_default();

        if embeddings.len() != request.input.len() {
            return Err(CodeSageError::AIProvider(format!(
                "{} 返回 {} 个向量, 期望 {}",
                self.provider_info.name,
                embeddings.len(),
                request.input.len()
            )));
        }

        let usage = TokenUsage::new(
            json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as usize,
            0,
        );

        Ok(EmbeddingResponse {
            embeddings,
            model: json["model"]
                .as_str()
                .map(|s| s.to_string())
                .unwrap_or(request.model),
            usage,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.config.api_key.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    #[test]
    fn test_body_keeps_system_and_order() {
        let request = ChatRequest::new(
            "gpt-4o",
            vec![Message::system("sys"), Message::user("q"), Message::assistant("a")],
        )
        .with_temperature(0.3);

        let body = OpenAICompatibleProvider::build_body(&request, None);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages[0]["role"], json!("system"));
        assert_eq!(messages[2]["role"], json!("assistant"));
        assert!(body.get("response_format").is_none());
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_body_with_schema_uses_json_schema_format() {
        let schema = ResponseSchema::new("evaluation")
            .field("is_supported", FieldType::Boolean, "")
            .field("reasoning", FieldType::String, "");
        let request = ChatRequest::new("gpt-4o", vec![Message::user("x")]).with_temperature(0.0);

        let body = OpenAICompatibleProvider::build_body(&request, Some(&schema));
        assert_eq!(body["response_format"]["type"], json!("json_schema"));
        assert_eq!(body["response_format"]["json_schema"]["name"], json!("evaluation"));
        assert_eq!(
            body["response_format"]["json_schema"]["schema"]["additionalProperties"],
            json!(false)
        );
    }

    #[test]
    fn test_parse_response() {
        let json = json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o",
            "choices": [{"message": {"role": "assistant", "content": "done"}, "finish_reason": "length"}],
            "usage": {"prompt_tokens": 5, "completion_tokens": 1}
        });

        let response = OpenAICompatibleProvider::parse_response(&json);
        assert_eq!(response.text(), "done");
        assert_eq!(response.finish_reason, FinishReason::Length);
        assert_eq!(response.usage.total_tokens, 6);
    }
}
