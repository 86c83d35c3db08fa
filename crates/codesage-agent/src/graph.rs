//! 状态机

use std::fmt;
use std::sync::Arc;

use codesage_core::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::evaluator::Evaluator;
use crate::generator::Generator;
use crate::retriever::Retriever;
use crate::state::{AgentState, Evaluation};

/// 每次查询最多执行的检索次数
pub const MAX_ITERATIONS: u32 = 3;

/// 状态机节点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Node {
    Retrieve,
    Generate,
    Evaluate,
}

impl Node {
    /// 入口节点
    pub const ENTRY: Node = Node::Retrieve;

    pub fn as_str(&self) -> &'static str {
        match self {
            Node::Retrieve => "retrieve",
            Node::Generate => "generate",
            Node::Evaluate => "evaluate",
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 节点完成后的去向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Node(Node),
    End,
}

/// 纯转移函数
///
/// `retrieve → generate → evaluate` 为固定边。`evaluate` 之后：
/// 达到上限则结束 (不看评估结果)，否则评估通过则结束，否则回到 `retrieve`。
pub fn transition(
    node: Node,
    iteration: u32,
    evaluation: Option<&Evaluation>,
    max_iterations: u32,
) -> Next {
    match node {
        Node::Retrieve => Next::Node(Node::Generate),
        Node::Generate => Next::Node(Node::Evaluate),
        Node::Evaluate => {
            if iteration >= max_iterations {
                Next::End
            } else if evaluation.is_some_and(|e| e.is_supported) {
                Next::End
            } else {
                Next::Node(Node::Retrieve)
            }
        }
    }
}

/// 节点进入通知 (尽力而为, 投递失败被忽略)
pub trait NodeObserver: Send + Sync {
    fn node_entered(&self, node: Node);
}

impl NodeObserver for UnboundedSender<Node> {
    fn node_entered(&self, node: Node) {
        let _ = self.send(node);
    }
}

/// 不关心进度的调用方使用
pub struct NoopObserver;

impl NodeObserver for NoopObserver {
    fn node_entered(&self, _node: Node) {}
}

/// 检索-生成-评估循环
pub struct AgentGraph {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn Generator>,
    evaluator: Arc<dyn Evaluator>,
    max_iterations: u32,
}

impl AgentGraph {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
        evaluator: Arc<dyn Evaluator>,
    ) -> Self {
        Self {
            retriever,
            generator,
            evaluator,
            max_iterations: MAX_ITERATIONS,
        }
    }

    /// 只能收紧上限, 取值范围为 `1..=MAX_ITERATIONS`
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.clamp(1, MAX_ITERATIONS);
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// 从入口节点开始运行直到结束, 任何节点出错立即中止
    pub async fn run(&self, mut state: AgentState, observer: &dyn NodeObserver) -> Result<AgentState> {
        let mut node = Node::ENTRY;

        loop {
            observer.node_entered(node);
            tracing::info!("Entering node {} (iteration {})", node, state.iteration);

            match node {
                Node::Retrieve => {
                    state.context = self.retriever.retrieve(&state.question).await?;
                    state.iteration += 1;
                    tracing::debug!(
                        "Retrieved {} passages on iteration {}",
                        state.context.len(),
                        state.iteration
                    );
                }
                Node::Generate => {
                    state.answer = self
                        .generator
                        .generate(&state.question, &state.chat_history, &state.context)
                        .await?;
                }
                Node::Evaluate => {
                    state.evaluation = Some(
                        self.evaluator
                            .evaluate(&state.answer, &state.context)
                            .await?,
                    );
                }
            }

            match transition(
                node,
                state.iteration,
                state.evaluation.as_ref(),
                self.max_iterations,
            ) {
                Next::Node(next) => node = next,
                Next::End => {
                    tracing::info!("Query finished after {} iterations", state.iteration);
                    return Ok(state);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(is_supported: bool) -> Evaluation {
        Evaluation {
            is_supported,
            reasoning: String::new(),
        }
    }

    #[test]
    fn test_fixed_edges() {
        assert_eq!(
            transition(Node::Retrieve, 1, None, MAX_ITERATIONS),
            Next::Node(Node::Generate)
        );
        assert_eq!(
            transition(Node::Generate, 1, None, MAX_ITERATIONS),
            Next::Node(Node::Evaluate)
        );
    }

    #[test]
    fn test_unsupported_below_cap_retries() {
        for iteration in 1..MAX_ITERATIONS {
            assert_eq!(
                transition(Node::Evaluate, iteration, Some(&verdict(false)), MAX_ITERATIONS),
                Next::Node(Node::Retrieve)
            );
        }
    }

    #[test]
    fn test_supported_ends_at_any_iteration() {
        for iteration in 1..=MAX_ITERATIONS {
            assert_eq!(
                transition(Node::Evaluate, iteration, Some(&verdict(true)), MAX_ITERATIONS),
                Next::End
            );
        }
    }

    #[test]
    fn test_cap_overrides_evaluation() {
        assert_eq!(
            transition(Node::Evaluate, 3, Some(&verdict(false)), MAX_ITERATIONS),
            Next::End
        );
        assert_eq!(transition(Node::Evaluate, 4, None, MAX_ITERATIONS), Next::End);
    }

    #[test]
    fn test_missing_evaluation_counts_as_unsupported() {
        assert_eq!(
            transition(Node::Evaluate, 1, None, MAX_ITERATIONS),
            Next::Node(Node::Retrieve)
        );
    }

    #[test]
    fn test_node_names() {
        assert_eq!(Node::ENTRY, Node::Retrieve);
        assert_eq!(Node::Generate.to_string(), "generate");
        assert_eq!(serde_json::to_string(&Node::Evaluate).unwrap(), "\"evaluate\"");
    }

    #[test]
    fn test_sender_observer_ignores_closed_channel() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        tx.node_entered(Node::Retrieve);
    }
}
