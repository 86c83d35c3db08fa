//! Google Gemini 提供商实现

use async_trait::async_trait;
use codesage_core::{CodeSageError, Message, Result, Role};
use reqwest::header;
use serde_json::{Value, json};

use crate::providers::{AIProvider, ProviderConfig};
use crate::schema::ResponseSchema;
use crate::types::{
    ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, FinishReason, TokenUsage,
};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini 提供商
pub struct GeminiProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let client = reqwest::Client::new();
        Self { config, client }
    }

    fn get_base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(GEMINI_BASE_URL)
    }

    fn api_key(&self) -> &str {
        self.config.api_key.as_deref().unwrap_or("")
    }

    /// `models/embedding-001` 与 `embedding-001` 两种写法都接受
    fn model_path(model: &str) -> String {
        if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        }
    }

    fn convert_messages(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .filter(|m| m.role != Role::System) // Gemini 单独处理 system
            .map(|m| {
                let role = match m.role {
                    Role::Assistant => "model",
                    _ => "user",
                };

                json!({
                    "role": role,
                    "parts": [{"text": m.text_content()}]
                })
            })
            .collect()
    }

    fn get_system_instruction(messages: &[Message]) -> Option<String> {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.text_content())
            .collect();

        (!system.is_empty()).then(|| system.join("\n\n"))
    }

    /// 构造 generateContent 请求体
    fn build_body(request: &ChatRequest, schema: Option<&ResponseSchema>) -> Value {
        let mut body = json!({
            "contents": Self::convert_messages(&request.messages),
            "generationConfig": {
                "temperature": request.temperature.unwrap_or(1.0),
                "maxOutputTokens": request.max_tokens.unwrap_or(8192),
            }
        });

        if let Some(system) = Self::get_system_instruction(&request.messages) {
            body["systemInstruction"] = json!({
                "parts": [{"text": system}]
            });
        }

        if let Some(schema) = schema {
            body["generationConfig"]["responseMimeType"] = json!("application/json");
            body["generationConfig"]["responseSchema"] = schema.to_gemini_schema();
        }

        body
    }

    fn parse_response(json: &Value, model: &str) -> ChatResponse {
        let candidate = &json["candidates"][0];

        let text: String = candidate["content"]["parts"]
            .as_array()
            .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
            .unwrap_or_default();

        let finish_reason = match candidate["finishReason"].as_str() {
            Some("STOP") | None => FinishReason::Stop,
            Some("MAX_TOKENS") => FinishReason::Length,
            Some("SAFETY") | Some("RECITATION") => FinishReason::ContentFilter,
            Some(_) => FinishReason::Error,
        };

        let usage = TokenUsage::new(
            json["usageMetadata"]["promptTokenCount"]
                .as_u64()
                .unwrap_or(0) as usize,
            json["usageMetadata"]["candidatesTokenCount"]
                .as_u64()
                .unwrap_or(0) as usize,
        );

        ChatResponse {
            id: uuid::Uuid::new_v4().to_string(),
            model: model.to_string(),
            message: Message::assistant(text),
            usage,
            finish_reason,
        }
    }

    async fn post(&self, url: &str, body: &Value, what: &str) -> Result<Value> {
        let response = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| CodeSageError::Http(format!("Gemini {} 请求失败: {}", what, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(CodeSageError::AIProvider(format!(
                "Gemini {} 错误 ({}): {}",
                what, status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| CodeSageError::AIProvider(format!("解析响应失败: {}", e)))
    }

    async fn generate(
        &self,
        request: &ChatRequest,
        schema: Option<&ResponseSchema>,
    ) -> Result<ChatResponse> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            self.get_base_url(),
            Self::model_path(&request.model),
            self.api_key()
        );

        let body = Self::build_body(request, schema);
        let json = self.post(&url, &body, "API").await?;

        Ok(Self::parse_response(&json, &request.model))
    }
}

#[async_trait]
impl AIProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.generate(&request, None).await
    }

    async fn chat_structured(
        &self,
        request: ChatRequest,
        schema: &ResponseSchema,
    ) -> Result<Value> {
        let response = self.generate(&request, Some(schema)).await?;
        schema.parse(response.text())
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let model = Self::model_path(&request.model);
        let url = format!(
            "{}/{}:batchEmbedContents?key={}",
            self.get_base_url(),
            model,
            self.api_key()
        );

        let requests: Vec<Value> = request
            .input
            .iter()
            .map(|text| {
                json!({
                    "model": model,
                    "content": {"parts": [{"text": text}]}
                })
            })
            .collect();

        let json = self
            .post(&url, &json!({ "requests": requests }), "Embedding API")
            .await?;

        let embeddings: Vec<Vec<f32>> = json["embeddings"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .map(|item| {
                        item["values"]
                            .as_array()
                            .map(|values| {
                                values
                                    .iter()
                                    .filter_map(|v| v.as_f64())
                                    .map(|v| v as f32)
                                    .collect()
                            })
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default();

        if embeddings.len() != request.input.len() {
            return Err(CodeSageError::AIProvider(format!(
                "Gemini 返回 {} 个向量, 期望 {}",
                embeddings.len(),
                request.input.len()
            )));
        }

        Ok(EmbeddingResponse {
            embeddings,
            model: request.model,
            usage: TokenUsage::default(),
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
    fn test_body_separates_system_instruction() {
        let request = ChatRequest::new(
            "gemini-2.5-flash",
            vec![
                Message::system("You are an expert."),
                Message::user("q1"),
                Message::assistant("a1"),
                Message::user("q2"),
            ],
        )
        .with_temperature(0.3);

        let body = GeminiProvider::build_body(&request, None);
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            json!("You are an expert.")
        );
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], json!("model"));
        assert!((body["generationConfig"]["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
        assert!(body["generationConfig"].get("responseSchema").is_none());
    }

    #[test]
    fn test_body_with_schema_requests_json() {
        let schema = ResponseSchema::new("evaluation")
            .field("is_supported", FieldType::Boolean, "")
            .field("reasoning", FieldType::String, "");
        let request = ChatRequest::new("gemini-2.5-flash", vec![Message::user("x")])
            .with_temperature(0.0);

        let body = GeminiProvider::build_body(&request, Some(&schema));
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            json!("application/json")
        );
        assert_eq!(
            body["generationConfig"]["responseSchema"]["properties"]["is_supported"]["type"],
            json!("BOOLEAN")
        );
        assert_eq!(body["generationConfig"]["temperature"], json!(0.0));
    }

    #[test]
    fn test_parse_response_joins_parts() {
        let json = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Hello "}, {"text": "world"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 2}
        });

        let response = GeminiProvider::parse_response(&json, "gemini-2.5-flash");
        assert_eq!(response.text(), "Hello world");
        assert_eq!(response.usage.total_tokens, 12);
        assert_eq!(response.finish_reason, FinishReason::Stop);
    }

    #[test]
    fn test_structured_reply_must_be_bare_json() {
        let schema = ResponseSchema::new("evaluation")
            .field("is_supported", FieldType::Boolean, "")
            .field("reasoning", FieldType::String, "");
        let reply = |text: &str| {
            json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
            })
        };

        let bare = GeminiProvider::parse_response(
            &reply(r#"{"is_supported": true, "reasoning": "ok"}"#),
            "m",
        );
        assert!(schema.parse(bare.text()).is_ok());

        let wrapped = GeminiProvider::parse_response(
            &reply(r#"Verdict: {"is_supported": true, "reasoning": "ok"}"#),
            "m",
        );
        assert!(schema.parse(wrapped.text()).is_err());
    }

    #[test]
    fn test_parse_response_without_candidates_is_empty() {
        let response = GeminiProvider::parse_response(&json!({}), "m");
        assert_eq!(response.text(), "");
    }

    #[test]
    fn test_model_path() {
        assert_eq!(
            GeminiProvider::model_path("models/embedding-001"),
            "models/embedding-001"
        );
        assert_eq!(
            GeminiProvider::model_path("gemini-2.5-flash"),
            "models/gemini-2.5-flash"
        );
    }
}
