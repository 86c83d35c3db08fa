//! 答案生成

use std::sync::Arc;

use async_trait::async_trait;
use codesage_ai::{AIProvider, ChatRequest};
use codesage_core::{CodeSageError, Message, Result};

use crate::state::{Passage, join_context};

pub const DEFAULT_GENERATION_TEMPERATURE: f32 = 0.3;

const SYSTEM_PROMPT: &str = "You are an expert AI programming assistant. Answer the user's \
current question based on the provided code context and the conversation history. If the user \
asks about the conversation itself, answer from the history.";

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        question: &str,
        chat_history: &[Message],
        context: &[Passage],
    ) -> Result<String>;
}

pub struct AnswerGenerator {
    llm: Arc<dyn AIProvider>,
    model: String,
    temperature: f32,
}

impl AnswerGenerator {
    pub fn new(llm: Arc<dyn AIProvider>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
            temperature: DEFAULT_GENERATION_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// 系统指令 → 历史消息 (原顺序) → 带上下文的当前问题
pub fn build_generation_messages(
    question: &str,
    chat_history: &[Message],
    context: &[Passage],
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(chat_history.len() + 2);
    messages.push(Message::system(SYSTEM_PROMPT));
    messages.extend(chat_history.iter().cloned());
    messages.push(Message::user(format!(
        "CONTEXT FROM CODEBASE (if any):\n{}\n\nUSER'S CURRENT QUESTION: {}",
        join_context(context),
        question
    )));
    messages
}

#[async_trait]
impl Generator for AnswerGenerator {
    async fn generate(
        &self,
        question: &str,
        chat_history: &[Message],
        context: &[Passage],
    ) -> Result<String> {
        let request = ChatRequest::new(
            self.model.clone(),
            build_generation_messages(question, chat_history, context),
        )
        .with_temperature(self.temperature);

        let response = self
            .llm
            .chat(request)
            .await
            .map_err(|e| CodeSageError::Generation(e.to_string()))?;

        let answer = response.text();
        if answer.trim().is_empty() {
            return Err(CodeSageError::Generation("模型返回了空答案".to_string()));
        }

        Ok(answer.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesage_core::Role;

    #[test]
    fn test_message_layout() {
        let history = vec![Message::user("earlier q"), Message::assistant("earlier a")];
        let context = vec![Passage::new("fn parse() {}", "src/parser.rs")];

        let messages = build_generation_messages("what does parse do?", &history, &context);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("expert AI programming assistant"));
        assert_eq!(messages[1], history[0]);
        assert_eq!(messages[2], history[1]);
        assert_eq!(
            messages[3].content,
            "CONTEXT FROM CODEBASE (if any):\n// FILE: src/parser.rs\n\nfn parse() {}\n\nUSER'S CURRENT QUESTION: what does parse do?"
        );
    }

    #[test]
    fn test_empty_context_still_has_sections() {
        let messages = build_generation_messages("hi", &[], &[]);
        assert_eq!(messages.len(), 2);
        assert!(messages[1].content.starts_with("CONTEXT FROM CODEBASE (if any):\n\n\n"));
    }
}
