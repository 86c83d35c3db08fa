//! 多查询检索
//!
//! 一个问题 → 若干改写 → 每个改写一次相似度检索 (并发) → 合并去重 → 带来源的段落。

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use codesage_ai::{AIProvider, ChatRequest};
use codesage_core::{AgentConfig, CodeSageError, Message, Result};
use codesage_vector::{PassageSearch, SearchHit};
use futures::future::try_join_all;

use crate::state::Passage;

pub const DEFAULT_NUM_QUERIES: usize = 3;
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_EXPANSION_TEMPERATURE: f32 = 0.3;

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, question: &str) -> Result<Vec<Passage>>;
}

pub struct MultiQueryRetriever {
    llm: Arc<dyn AIProvider>,
    search: Arc<dyn PassageSearch>,
    model: String,
    temperature: f32,
    num_queries: usize,
    top_k: usize,
    include_original: bool,
}

impl MultiQueryRetriever {
    pub fn new(llm: Arc<dyn AIProvider>, search: Arc<dyn PassageSearch>, model: impl Into<String>) -> Self {
        Self {
            llm,
            search,
            model: model.into(),
            temperature: DEFAULT_EXPANSION_TEMPERATURE,
            num_queries: DEFAULT_NUM_QUERIES,
            top_k: DEFAULT_TOP_K,
            include_original: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_num_queries(mut self, num_queries: usize) -> Self {
        self.num_queries = num_queries.max(1);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_include_original(mut self, include_original: bool) -> Self {
        self.include_original = include_original;
        self
    }

    /// 应用 `agent` 配置段
    pub fn with_agent_config(self, config: &AgentConfig) -> Self {
        self.with_num_queries(config.num_queries)
            .with_include_original(config.include_original)
    }

    fn expansion_prompt(&self, question: &str) -> String {
        format!(
            "You are an AI language model assistant. Your task is to generate {n} different \
             versions of the given user question to retrieve relevant documents from a vector \
             database. By generating multiple perspectives on the user question, your goal is to \
             help the user overcome some of the limitations of distance-based similarity search. \
             Provide these alternative questions separated by newlines.\nOriginal question: {q}",
            n = self.num_queries,
            q = question
        )
    }

    /// 生成要检索的查询列表
    async fn expand(&self, question: &str) -> Result<Vec<String>> {
        let request = ChatRequest::new(
            self.model.clone(),
            vec![Message::user(self.expansion_prompt(question))],
        )
        .with_temperature(self.temperature);

        let response = self
            .llm
            .chat(request)
            .await
            .map_err(|e| CodeSageError::Retrieval(format!("查询扩展失败: {}", e)))?;

        let mut queries = parse_expansions(response.text(), self.num_queries);
        if queries.is_empty() {
            tracing::warn!("Query expansion produced no usable lines, searching the original question");
            queries.push(question.to_string());
        } else if self.include_original && !queries.iter().any(|q| q == question) {
            queries.insert(0, question.to_string());
        }

        tracing::debug!("Expanded question into {} queries: {:?}", queries.len(), queries);
        Ok(queries)
    }
}

#[async_trait]
impl Retriever for MultiQueryRetriever {
    async fn retrieve(&self, question: &str) -> Result<Vec<Passage>> {
        let queries = self.expand(question).await?;

        let result_lists = try_join_all(
            queries
                .iter()
                .map(|query| self.search.search(query, self.top_k)),
        )
        .await
        .map_err(|e| CodeSageError::Retrieval(format!("相似度检索失败: {}", e)))?;

        let passages = merge_unique(result_lists);
        tracing::info!(
            "Retrieved {} unique passages from {} queries",
            passages.len(),
            queries.len()
        );
        Ok(passages)
    }
}

/// 每行一个改写：去掉首尾空白和列表标记, 丢弃空行, 最多保留 `limit` 个
pub fn parse_expansions(text: &str, limit: usize) -> Vec<String> {
    text.lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty())
        .take(limit)
        .map(str::to_string)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    let marker_end = |rest: &str| rest.is_empty() || rest.starts_with(char::is_whitespace);

    for bullet in ['-', '*', '•'] {
        if let Some(rest) = line.strip_prefix(bullet) {
            if marker_end(rest) {
                return rest.trim();
            }
        }
    }

    // "1." / "2)" 形式的编号
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            if marker_end(rest) {
                return rest.trim();
            }
        }
    }

    line
}

/// 按查询顺序合并, 去掉内容和路径都相同的重复项, 保留首次出现的位置
pub fn merge_unique(result_lists: Vec<Vec<SearchHit>>) -> Vec<Passage> {
    let mut seen = HashSet::new();
    result_lists
        .into_iter()
        .flatten()
        .filter(|hit| seen.insert((hit.content.clone(), hit.file_path.clone())))
        .map(|hit| Passage::new(hit.content, hit.file_path))
        .collect()
}
