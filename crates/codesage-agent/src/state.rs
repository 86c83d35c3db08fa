//! 单次查询的状态

use codesage_core::Message;
use serde::{Deserialize, Serialize};

/// 段落之间的分隔符
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// 检索到的代码段落
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,
    pub source_path: String,
}

impl Passage {
    pub fn new(content: impl Into<String>, source_path: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source_path: source_path.into(),
        }
    }

    /// 带来源标注的文本: `// FILE: <path>\n\n<content>`
    pub fn tagged(&self) -> String {
        format!("// FILE: {}\n\n{}", self.source_path, self.content)
    }
}

/// 把段落拼接成提示词中的上下文块
pub fn join_context(passages: &[Passage]) -> String {
    passages
        .iter()
        .map(Passage::tagged)
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// 事实性评估结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub is_supported: bool,
    pub reasoning: String,
}

/// 贯穿状态机每一步的查询状态
#[derive(Debug, Clone)]
pub struct AgentState {
    pub question: String,
    pub chat_history: Vec<Message>,
    /// 只反映最近一次检索
    pub context: Vec<Passage>,
    pub answer: String,
    pub evaluation: Option<Evaluation>,
    /// 每执行一次检索加一
    pub iteration: u32,
}

impl AgentState {
    pub fn new(question: impl Into<String>, chat_history: Vec<Message>) -> Self {
        Self {
            question: question.into(),
            chat_history,
            context: Vec::new(),
            answer: String::new(),
            evaluation: None,
            iteration: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provenance_header() {
        let passage = Passage::new("fn main() {}", "src/main.rs");
        assert_eq!(passage.tagged(), "// FILE: src/main.rs\n\nfn main() {}");
    }

    #[test]
    fn test_join_context() {
        let passages = vec![Passage::new("a", "a.rs"), Passage::new("b", "b.rs")];
        assert_eq!(
            join_context(&passages),
            "// FILE: a.rs\n\na\n\n---\n\n// FILE: b.rs\n\nb"
        );
        assert_eq!(join_context(&[]), "");
    }

    #[test]
    fn test_new_state() {
        let state = AgentState::new("what is parse?", vec![Message::user("hi")]);
        assert_eq!(state.iteration, 0);
        assert!(state.context.is_empty());
        assert!(state.evaluation.is_none());
        assert_eq!(state.chat_history.len(), 1);
    }
}
