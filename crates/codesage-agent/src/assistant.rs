//! 查询入口
//!
//! `CodeAssistant::run_query` 把一次状态机运行转换成事件流：
//! 节点进入信号经 mpsc 通道变成 `status_update`，最后恰好一个 `final_answer` 或 `error`。

use std::pin::Pin;
use std::sync::Arc;

use codesage_ai::{AIProvider, ProviderFactory};
use codesage_core::{Config, Message, Result};
use codesage_vector::{
    CodeSummarizer, DocumentIndexer, NamespacedSearch, ProviderEmbedding, VectorStore,
};
use futures::Stream;
use tokio::sync::mpsc;

use crate::evaluator::FaithfulnessEvaluator;
use crate::events::QueryEvent;
use crate::generator::AnswerGenerator;
use crate::graph::{AgentGraph, Node};
use crate::retriever::MultiQueryRetriever;
use crate::state::AgentState;

pub type QueryStream = Pin<Box<dyn Stream<Item = QueryEvent> + Send>>;

pub struct CodeAssistant {
    graph: Arc<AgentGraph>,
}

enum Step {
    Node(Node),
    Done(Result<AgentState>),
}

impl CodeAssistant {
    pub fn new(graph: AgentGraph) -> Self {
        Self {
            graph: Arc::new(graph),
        }
    }

    pub fn graph(&self) -> &AgentGraph {
        &self.graph
    }

    /// 运行一次查询
    ///
    /// 丢弃返回的流会取消仍在进行的模型和检索调用。
    pub fn run_query(&self, question: impl Into<String>, chat_history: Vec<Message>) -> QueryStream {
        let graph = self.graph.clone();
        let state = AgentState::new(question, chat_history);

        Box::pin(async_stream::stream! {
            let (tx, mut rx) = mpsc::unbounded_channel::<Node>();
            let run = graph.run(state, &tx);
            tokio::pin!(run);

            let outcome = loop {
                let step = tokio::select! {
                    biased;
                    Some(node) = rx.recv() => Step::Node(node),
                    result = &mut run => Step::Done(result),
                };
                match step {
                    Step::Node(node) => yield QueryEvent::status(node),
                    Step::Done(result) => break result,
                }
            };

            while let Ok(node) = rx.try_recv() {
                yield QueryEvent::status(node);
            }

            match outcome {
                Ok(state) => yield QueryEvent::final_answer(state),
                Err(e) => {
                    tracing::error!("Query failed: {}", e);
                    yield QueryEvent::error(e.to_string());
                }
            }
        })
    }
}

type ProviderCreator = Arc<dyn Fn(Option<String>) -> Result<Arc<dyn AIProvider>> + Send + Sync>;

/// 按请求构造模型客户端, 向量存储在所有请求间共享
#[derive(Clone)]
pub struct AssistantFactory {
    config: Arc<Config>,
    store: Arc<dyn VectorStore>,
    provider_creator: ProviderCreator,
}

impl AssistantFactory {
    pub fn new(config: Config, store: Arc<dyn VectorStore>) -> Self {
        let ai = config.ai.clone();
        Self {
            config: Arc::new(config),
            store,
            provider_creator: Arc::new(move |api_key| ProviderFactory::from_config(&ai, api_key)),
        }
    }

    /// 替换模型客户端的构造方式
    pub fn with_provider_creator<F>(mut self, creator: F) -> Self
    where
        F: Fn(Option<String>) -> Result<Arc<dyn AIProvider>> + Send + Sync + 'static,
    {
        self.provider_creator = Arc::new(creator);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn VectorStore> {
        self.store.clone()
    }

    fn embedding(&self, provider: Arc<dyn AIProvider>) -> Arc<ProviderEmbedding> {
        Arc::new(ProviderEmbedding::new(
            provider,
            self.config.ai.embedding_model.clone(),
        ))
    }

    /// `api_key` 为调用方自带的 key, 为空时使用服务端配置
    pub fn build(&self, api_key: Option<String>) -> Result<CodeAssistant> {
        let provider = (self.provider_creator)(api_key)?;
        let ai = &self.config.ai;

        let search = Arc::new(NamespacedSearch::new(
            self.embedding(provider.clone()),
            self.store.clone(),
            self.config.vector.code_namespace.clone(),
        ));

        let retriever = MultiQueryRetriever::new(provider.clone(), search, ai.chat_model.clone())
            .with_temperature(ai.generation_temperature)
            .with_top_k(self.config.vector.top_k)
            .with_agent_config(&self.config.agent);
        let generator = AnswerGenerator::new(provider.clone(), ai.chat_model.clone())
            .with_temperature(ai.generation_temperature);
        let evaluator = FaithfulnessEvaluator::new(provider, ai.chat_model.clone())
            .with_temperature(ai.evaluation_temperature);

        let graph = AgentGraph::new(Arc::new(retriever), Arc::new(generator), Arc::new(evaluator))
            .with_max_iterations(self.config.agent.max_iterations);

        Ok(CodeAssistant::new(graph))
    }

    pub fn indexer(&self, api_key: Option<String>) -> Result<DocumentIndexer> {
        let provider = (self.provider_creator)(api_key)?;
        Ok(DocumentIndexer::new(self.embedding(provider), self.store.clone()))
    }

    /// 索引时生成一句话摘要
    pub fn summarizer(&self, api_key: Option<String>) -> Result<CodeSummarizer> {
        let provider = (self.provider_creator)(api_key)?;
        Ok(CodeSummarizer::new(provider, self.config.ai.chat_model.clone())
            .with_temperature(self.config.ai.generation_temperature))
    }
}
