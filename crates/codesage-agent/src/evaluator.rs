//! 事实性评估
//!
//! 只用检索到的代码判断答案是否有依据, 不看对话历史。输出走结构化 schema,
//! 解析失败或不符合 schema 即为评估失败。

use std::sync::Arc;

use async_trait::async_trait;
use codesage_ai::{AIProvider, ChatRequest, FieldType, ResponseSchema};
use codesage_core::{CodeSageError, Message, Result};

use crate::state::{Evaluation, Passage, join_context};

pub const DEFAULT_EVALUATION_TEMPERATURE: f32 = 0.0;

#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, answer: &str, context: &[Passage]) -> Result<Evaluation>;
}

/// `{is_supported: boolean, reasoning: string}`, 均为必填, 不允许其他字段
pub fn verdict_schema() -> ResponseSchema {
    ResponseSchema::new("faithfulness_evaluation")
        .field(
            "is_supported",
            FieldType::Boolean,
            "Whether the answer is supported by the source code context.",
        )
        .field(
            "reasoning",
            FieldType::String,
            "A brief explanation for the decision.",
        )
}

pub fn build_evaluation_prompt(answer: &str, context: &[Passage]) -> String {
    format!(
        "Based ONLY on the following source code snippets, determine if the AI's answer is \
         factually supported. Ignore conversation history for this check.\n\n\
         SOURCE CODE CONTEXT:\n{}\n\nAI'S ANSWER:\n{}",
        join_context(context),
        answer
    )
}

pub struct FaithfulnessEvaluator {
    llm: Arc<dyn AIProvider>,
    model: String,
    temperature: f32,
    schema: ResponseSchema,
}

impl FaithfulnessEvaluator {
    pub fn new(llm: Arc<dyn AIProvider>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
            temperature: DEFAULT_EVALUATION_TEMPERATURE,
            schema: verdict_schema(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl Evaluator for FaithfulnessEvaluator {
    async fn evaluate(&self, answer: &str, context: &[Passage]) -> Result<Evaluation> {
        let request = ChatRequest::new(
            self.model.clone(),
            vec![Message::user(build_evaluation_prompt(answer, context))],
        )
        .with_temperature(self.temperature);

        let value = self
            .llm
            .chat_structured(request, &self.schema)
            .await
            .map_err(|e| match e {
                CodeSageError::SchemaViolation(_) => e,
                other => CodeSageError::Evaluation(other.to_string()),
            })?;

        let evaluation: Evaluation = serde_json::from_value(value)
            .map_err(|e| CodeSageError::SchemaViolation(e.to_string()))?;

        tracing::info!(
            "Evaluation: supported={} reasoning={}",
            evaluation.is_supported,
            evaluation.reasoning
        );
        Ok(evaluation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_sections() {
        let context = vec![Passage::new("const LIMIT: u32 = 450;", "src/limits.rs")];
        let prompt = build_evaluation_prompt("The limit is 450.", &context);

        assert!(prompt.starts_with("Based ONLY on the following source code snippets"));
        assert!(prompt.contains(
            "SOURCE CODE CONTEXT:\n// FILE: src/limits.rs\n\nconst LIMIT: u32 = 450;"
        ));
        assert!(prompt.ends_with("AI'S ANSWER:\nThe limit is 450."));
    }

    #[test]
    fn test_schema_is_strict() {
        let schema = verdict_schema();
        assert!(
            schema
                .validate(&serde_json::json!({"is_supported": true, "reasoning": "ok"}))
                .is_ok()
        );
        assert!(
            schema
                .validate(&serde_json::json!({"is_supported": 1, "reasoning": "ok"}))
                .is_err()
        );
    }
}
