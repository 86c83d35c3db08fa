//! 向量存储类型定义

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 向量项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorItem {
    pub id: String,
    pub namespace: String,
    pub vector: Vec<f32>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl VectorItem {
    pub fn new(namespace: impl Into<String>, vector: Vec<f32>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            namespace: namespace.into(),
            vector,
            payload,
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// 搜索查询
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// 查询向量
    pub vector: Vec<f32>,
    /// 命名空间, 为空时搜索全部
    pub namespace: Option<String>,
    /// 返回数量
    pub limit: usize,
    /// 最小相似度
    pub min_score: Option<f32>,
}

impl SearchQuery {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            namespace: None,
            limit: 10,
            min_score: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_min_score(mut self, score: f32) -> Self {
        self.min_score = Some(score);
        self
    }
}

/// 搜索结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub score: f32,
    pub payload: serde_json::Value,
}

/// 存储统计信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_vectors: usize,
    /// 各命名空间的向量数 (后端不支持时为空)
    pub namespaces: BTreeMap<String, usize>,
    pub last_updated: DateTime<Utc>,
}
