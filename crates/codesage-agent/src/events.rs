//! 查询事件 (线上格式)
//!
//! ```json
//! {"type": "status_update", "data": {"node": "retrieve"}}
//! {"type": "final_answer", "data": {"answer": "...", "evaluation": {...}, "iteration": 1}}
//! {"type": "error", "data": {"message": "..."}}
//! ```

use serde::{Deserialize, Serialize};

use crate::graph::Node;
use crate::state::{AgentState, Evaluation};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum QueryEvent {
    StatusUpdate {
        node: Node,
    },
    /// 不包含检索上下文
    FinalAnswer {
        answer: String,
        evaluation: Option<Evaluation>,
        iteration: u32,
    },
    Error {
        message: String,
    },
}

impl QueryEvent {
    pub fn status(node: Node) -> Self {
        Self::StatusUpdate { node }
    }

    pub fn final_answer(state: AgentState) -> Self {
        Self::FinalAnswer {
            answer: state.answer,
            evaluation: state.evaluation,
            iteration: state.iteration,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// `final_answer` 和 `error` 之后不会再有事件
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::StatusUpdate { .. })
    }

    pub fn to_json(&self) -> String {
        // 所有字段都是可序列化的基本类型
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","data":{{"message":"{}"}}}}"#, e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Passage;
    use serde_json::{Value, json};

    #[test]
    fn test_status_update_wire_shape() {
        let value: Value = serde_json::from_str(&QueryEvent::status(Node::Retrieve).to_json()).unwrap();
        assert_eq!(value, json!({"type": "status_update", "data": {"node": "retrieve"}}));
    }

    #[test]
    fn test_final_answer_excludes_context() {
        let mut state = AgentState::new("q", vec![]);
        state.context = vec![Passage::new("secret body", "src/lib.rs")];
        state.answer = "It parses.".to_string();
        state.evaluation = Some(Evaluation {
            is_supported: true,
            reasoning: "seen".to_string(),
        });
        state.iteration = 2;

        let value: Value = serde_json::from_str(&QueryEvent::final_answer(state).to_json()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "final_answer",
                "data": {
                    "answer": "It parses.",
                    "evaluation": {"is_supported": true, "reasoning": "seen"},
                    "iteration": 2
                }
            })
        );
        assert!(value["data"].get("context").is_none());
    }

    #[test]
    fn test_error_wire_shape_and_terminal() {
        let event = QueryEvent::error("boom");
        let value: Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(value, json!({"type": "error", "data": {"message": "boom"}}));
        assert!(event.is_terminal());
        assert!(!QueryEvent::status(Node::Generate).is_terminal());
    }
}
