//! 测试用的手写 mock: 脚本化的语言模型提供商和段落检索

use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

pub mod ai {
    use super::lock;
    use async_trait::async_trait;
    use codesage_ai::{
        ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, FinishReason,
        ResponseSchema, TokenUsage,
    };
    use codesage_core::{CodeSageError, Message, Result};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    pub const EMBEDDING_DIM: usize = 8;

    /// 记录下来的一次调用
    #[derive(Debug, Clone)]
    pub enum RecordedCall {
        Chat(ChatRequest),
        Structured(ChatRequest),
        Embed(EmbeddingRequest),
    }

    impl RecordedCall {
        pub fn request(&self) -> Option<&ChatRequest> {
            match self {
                RecordedCall::Chat(r) | RecordedCall::Structured(r) => Some(r),
                RecordedCall::Embed(_) => None,
            }
        }
    }

    type Script = Arc<Mutex<VecDeque<std::result::Result<String, String>>>>;

    /// 脚本化的 AI 提供商
    ///
    /// `chat` 与 `chat_structured` 各有一个应答队列, 按调用顺序出队；
    /// 队列为空时返回默认应答。结构化应答以原始文本入队,
    /// 出队后按请求的 schema 严格校验。
    #[derive(Clone)]
    pub struct MockAiProvider {
        chat_script: Script,
        structured_script: Script,
        default_chat: Arc<Mutex<String>>,
        calls: Arc<Mutex<Vec<RecordedCall>>>,
        should_fail: Arc<Mutex<bool>>,
    }

    impl Default for MockAiProvider {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockAiProvider {
        pub fn new() -> Self {
            Self {
                chat_script: Arc::new(Mutex::new(VecDeque::new())),
                structured_script: Arc::new(Mutex::new(VecDeque::new())),
                default_chat: Arc::new(Mutex::new("Mock AI response".to_string())),
                calls: Arc::new(Mutex::new(Vec::new())),
                should_fail: Arc::new(Mutex::new(false)),
            }
        }

        pub fn with_chat_response(self, response: impl Into<String>) -> Self {
            lock(&self.chat_script).push_back(Ok(response.into()));
            self
        }

        pub fn with_chat_responses<I, S>(self, responses: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            lock(&self.chat_script).extend(responses.into_iter().map(|r| Ok(r.into())));
            self
        }

        pub fn with_chat_error(self, message: impl Into<String>) -> Self {
            lock(&self.chat_script).push_back(Err(message.into()));
            self
        }

        pub fn with_default_chat(self, response: impl Into<String>) -> Self {
            *lock(&self.default_chat) = response.into();
            self
        }

        /// 结构化应答 (原始 JSON 文本)
        pub fn with_structured_response(self, raw: impl Into<String>) -> Self {
            lock(&self.structured_script).push_back(Ok(raw.into()));
            self
        }

        pub fn with_verdict(self, is_supported: bool, reasoning: &str) -> Self {
            let raw = serde_json::json!({
                "is_supported": is_supported,
                "reasoning": reasoning,
            })
            .to_string();
            self.with_structured_response(raw)
        }

        pub fn with_structured_error(self, message: impl Into<String>) -> Self {
            lock(&self.structured_script).push_back(Err(message.into()));
            self
        }

        pub fn set_should_fail(&self, should_fail: bool) {
            *lock(&self.should_fail) = should_fail;
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            lock(&self.calls).clone()
        }

        pub fn call_count(&self) -> usize {
            lock(&self.calls).len()
        }

        pub fn chat_requests(&self) -> Vec<ChatRequest> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    RecordedCall::Chat(r) => Some(r),
                    _ => None,
                })
                .collect()
        }

        pub fn structured_requests(&self) -> Vec<ChatRequest> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    RecordedCall::Structured(r) => Some(r),
                    _ => None,
                })
                .collect()
        }

        fn check_fail(&self) -> Result<()> {
            if *lock(&self.should_fail) {
                return Err(CodeSageError::AIProvider("Mock AI error".to_string()));
            }
            Ok(())
        }
    }

    /// 把文本映射到固定维度向量, 相同文本得到相同向量
    pub fn mock_embedding(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; EMBEDDING_DIM];
        for (i, byte) in text.to_lowercase().bytes().enumerate() {
            vector[(byte as usize + i) % EMBEDDING_DIM] += 1.0;
        }
        vector
    }

    #[async_trait]
    impl codesage_ai::AIProvider for MockAiProvider {
        fn name(&self) -> &str {
            "mock-ai-provider"
        }

        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
            let model = request.model.clone();
            lock(&self.calls).push(RecordedCall::Chat(request));
            self.check_fail()?;

            let next = lock(&self.chat_script).pop_front();
            let content = match next {
                Some(Ok(text)) => text,
                Some(Err(message)) => return Err(CodeSageError::AIProvider(message)),
                None => lock(&self.default_chat).clone(),
            };

            Ok(ChatResponse {
                id: "mock-chat-1".to_string(),
                model,
                message: Message::assistant(content),
                usage: TokenUsage::new(10, 20),
                finish_reason: FinishReason::Stop,
            })
        }

        async fn chat_structured(
            &self,
            request: ChatRequest,
            schema: &ResponseSchema,
        ) -> Result<serde_json::Value> {
            lock(&self.calls).push(RecordedCall::Structured(request));
            self.check_fail()?;

            let next = lock(&self.structured_script).pop_front();
            match next {
                Some(Ok(raw)) => schema.parse(&raw),
                Some(Err(message)) => Err(CodeSageError::AIProvider(message)),
                None => Err(CodeSageError::AIProvider(
                    "Mock structured script exhausted".to_string(),
                )),
            }
        }

        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
            let embeddings = request.input.iter().map(|t| mock_embedding(t)).collect();
            let model = request.model.clone();
            lock(&self.calls).push(RecordedCall::Embed(request));
            self.check_fail()?;

            Ok(EmbeddingResponse {
                embeddings,
                model,
                usage: TokenUsage::new(0, 0),
            })
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
    }
}

pub mod search {
    use super::lock;
    use async_trait::async_trait;
    use codesage_core::{CodeSageError, Result};
    use codesage_vector::{PassageSearch, SearchHit};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// 按查询文本返回预设结果的检索
    #[derive(Clone, Default)]
    pub struct MockPassageSearch {
        by_query: Arc<Mutex<HashMap<String, Vec<SearchHit>>>>,
        fallback: Arc<Mutex<Vec<SearchHit>>>,
        queries: Arc<Mutex<Vec<(String, usize)>>>,
        failing_query: Arc<Mutex<Option<String>>>,
    }

    impl MockPassageSearch {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_hits(self, query: impl Into<String>, hits: Vec<SearchHit>) -> Self {
            lock(&self.by_query).insert(query.into(), hits);
            self
        }

        /// 未预设的查询返回这些结果
        pub fn with_fallback(self, hits: Vec<SearchHit>) -> Self {
            *lock(&self.fallback) = hits;
            self
        }

        /// 该查询返回错误
        pub fn failing_on(self, query: impl Into<String>) -> Self {
            *lock(&self.failing_query) = Some(query.into());
            self
        }

        /// 收到的 (查询, top_k), 按调用顺序
        pub fn queries(&self) -> Vec<(String, usize)> {
            lock(&self.queries).clone()
        }
    }

    #[async_trait]
    impl PassageSearch for MockPassageSearch {
        async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
            lock(&self.queries).push((query.to_string(), top_k));

            if lock(&self.failing_query).as_deref() == Some(query) {
                return Err(CodeSageError::VectorStore(format!(
                    "Mock search failure for {:?}",
                    query
                )));
            }

            let hits = lock(&self.by_query)
                .get(query)
                .cloned()
                .unwrap_or_else(|| lock(&self.fallback).clone());
            Ok(hits.into_iter().take(top_k).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ai::*;
    use super::search::*;
    use codesage_ai::{AIProvider, ChatRequest, EmbeddingRequest, FieldType, ResponseSchema};
    use codesage_core::Message;
    use codesage_vector::{PassageSearch, SearchHit};

    fn schema() -> ResponseSchema {
        ResponseSchema::new("evaluation")
            .field("is_supported", FieldType::Boolean, "")
            .field("reasoning", FieldType::String, "")
    }

    #[test]
    fn test_mock_chat_script_then_default() {
        let provider = MockAiProvider::new()
            .with_chat_response("first")
            .with_default_chat("fallback");

        tokio_test::block_on(async {
            let r1 = provider
                .chat(ChatRequest::new("m", vec![Message::user("a")]))
                .await
                .unwrap();
            let r2 = provider
                .chat(ChatRequest::new("m", vec![Message::user("b")]))
                .await
                .unwrap();
            assert_eq!(r1.text(), "first");
            assert_eq!(r2.text(), "fallback");
        });
        assert_eq!(provider.chat_requests().len(), 2);
    }

    #[test]
    fn test_mock_structured_is_validated() {
        let provider = MockAiProvider::new()
            .with_verdict(true, "ok")
            .with_structured_response(r#"{"is_supported": "true", "reasoning": "x"}"#);

        tokio_test::block_on(async {
            let ok = provider
                .chat_structured(ChatRequest::new("m", vec![]), &schema())
                .await;
            assert!(ok.is_ok());
            let bad = provider
                .chat_structured(ChatRequest::new("m", vec![]), &schema())
                .await;
            assert!(bad.is_err());
        });
    }

    #[test]
    fn test_mock_failure_switch_affects_every_capability() {
        let provider = MockAiProvider::new().with_chat_response("kept");
        provider.set_should_fail(true);

        tokio_test::block_on(async {
            assert!(
                provider
                    .chat(ChatRequest::new("m", vec![Message::user("a")]))
                    .await
                    .is_err()
            );
            assert!(
                provider
                    .embed(EmbeddingRequest::new("e", vec!["x".to_string()]))
                    .await
                    .is_err()
            );

            provider.set_should_fail(false);
            let reply = provider
                .chat(ChatRequest::new("m", vec![Message::user("b")]))
                .await
                .unwrap();
            // 失败的调用不消耗脚本
            assert_eq!(reply.text(), "kept");
        });
        assert_eq!(provider.call_count(), 3);
    }

    #[test]
    fn test_mock_search_records_queries() {
        let search = MockPassageSearch::new()
            .with_hits("q1", vec![SearchHit::new("a", "a.rs"), SearchHit::new("b", "b.rs")])
            .failing_on("boom");

        tokio_test::block_on(async {
            assert_eq!(search.search("q1", 1).await.unwrap().len(), 1);
            assert!(search.search("other", 5).await.unwrap().is_empty());
            assert!(search.search("boom", 5).await.is_err());
        });
        assert_eq!(search.queries()[0], ("q1".to_string(), 1));
    }

    #[test]
    fn test_mock_embedding_is_deterministic() {
        assert_eq!(mock_embedding("parse"), mock_embedding("parse"));
        assert_eq!(mock_embedding("x").len(), EMBEDDING_DIM);
    }
}
