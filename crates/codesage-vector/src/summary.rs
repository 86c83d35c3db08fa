//! 代码块摘要
//!
//! 为每个代码块生成一句话摘要, 写入摘要命名空间。单个代码块失败只记录警告并跳过。

use std::sync::Arc;

use codesage_ai::{AIProvider, ChatRequest};
use codesage_core::{Message, Result};

use crate::indexer::Document;

pub const DEFAULT_SUMMARY_TEMPERATURE: f32 = 0.3;

pub struct CodeSummarizer {
    llm: Arc<dyn AIProvider>,
    model: String,
    temperature: f32,
}

impl CodeSummarizer {
    pub fn new(llm: Arc<dyn AIProvider>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
            temperature: DEFAULT_SUMMARY_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn prompt(content: &str) -> String {
        format!(
            "Please provide a concise, one-sentence summary of the following code:\n\n```\n{}\n```\n\nOne-sentence summary:",
            content
        )
    }

    async fn summarize_one(&self, document: &Document) -> Result<String> {
        let request = ChatRequest::new(
            self.model.clone(),
            vec![Message::user(Self::prompt(&document.content))],
        )
        .with_temperature(self.temperature);

        let response = self.llm.chat(request).await?;
        Ok(response.text().trim().to_string())
    }

    /// 逐个生成摘要, 摘要沿用原代码块的 `file_path`
    pub async fn summarize(&self, documents: &[Document]) -> Vec<Document> {
        let mut summaries = Vec::with_capacity(documents.len());

        for document in documents {
            if document.content.trim().is_empty() {
                continue;
            }
            match self.summarize_one(document).await {
                Ok(text) if !text.is_empty() => {
                    summaries.push(Document::new(text, document.file_path.clone()));
                }
                Ok(_) => {
                    tracing::warn!("Empty summary for {}, skipping", document.file_path);
                }
                Err(e) => {
                    tracing::warn!("Failed to summarize {}: {}", document.file_path, e);
                }
            }
        }

        tracing::info!("Generated {} of {} summaries", summaries.len(), documents.len());
        summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use codesage_ai::{ChatResponse, EmbeddingRequest, EmbeddingResponse, FinishReason, TokenUsage};
    use codesage_core::CodeSageError;
    use std::sync::Mutex;

    /// 内容含 "boom" 时失败, 其余返回固定摘要
    struct ScriptedLlm {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AIProvider for ScriptedLlm {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
            let prompt = request.messages[0].content.clone();
            self.prompts.lock().unwrap().push(prompt.clone());
            if prompt.contains("boom") {
                return Err(CodeSageError::AIProvider("rate limited".to_string()));
            }
            let text = if prompt.contains("empty") { "  " } else { " Parses input. \n" };
            Ok(ChatResponse {
                id: "1".to_string(),
                model: request.model,
                message: Message::assistant(text),
                usage: TokenUsage::default(),
                finish_reason: FinishReason::Stop,
            })
        }

        async fn embed(&self, _request: EmbeddingRequest) -> Result<EmbeddingResponse> {
            Err(CodeSageError::AIProvider("not used".to_string()))
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_summaries_keep_file_path_and_skip_failures() {
        let llm = Arc::new(ScriptedLlm {
            prompts: Mutex::new(Vec::new()),
        });
        let summarizer = CodeSummarizer::new(llm.clone(), "m");

        let summaries = summarizer
            .summarize(&[
                Document::new("fn parse() {}", "src/parse.rs"),
                Document::new("fn boom() {}", "src/boom.rs"),
                Document::new("  ", "src/blank.rs"),
                Document::new("fn empty() {}", "src/empty.rs"),
            ])
            .await;

        assert_eq!(summaries, vec![Document::new("Parses input.", "src/parse.rs")]);

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].contains("```\nfn parse() {}\n```"));
        assert!(prompts[0].ends_with("One-sentence summary:"));
    }
}
