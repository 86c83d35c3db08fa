//! Qdrant 向量存储
//!
//! 所有命名空间共用一个 collection, 命名空间写在 payload 的 `namespace` 字段里。
//! collection 在第一次写入时按向量维度创建 (cosine 距离), `clear` 会删除整个 collection。

use async_trait::async_trait;
use chrono::Utc;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_output::VectorsOptions;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    GetPointsBuilder, PointId, PointStruct, PointsIdsList, Query, QueryPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

use crate::VectorStore;
use crate::types::{SearchQuery, SearchResult, StoreStats, VectorItem};
use codesage_core::{CodeSageError, Result};

const NAMESPACE_KEY: &str = "namespace";
const CREATED_AT_KEY: &str = "created_at";

pub struct QdrantStore {
    client: Qdrant,
    collection_name: String,
    /// collection 是否已确认存在
    ready: Mutex<bool>,
}

fn store_err(e: impl std::fmt::Display) -> CodeSageError {
    CodeSageError::VectorStore(format!("Qdrant: {}", e))
}

impl QdrantStore {
    pub fn new(url: &str, collection_name: &str, api_key: Option<String>) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .api_key(api_key)
            .build()
            .map_err(|e| CodeSageError::Config(format!("Failed to create Qdrant client: {}", e)))?;

        Ok(Self {
            client,
            collection_name: collection_name.to_string(),
            ready: Mutex::new(false),
        })
    }

    async fn ensure_collection(&self, dimension: usize) -> Result<()> {
        let mut ready = self.ready.lock().await;
        if *ready {
            return Ok(());
        }

        if !self.collection_exists().await? {
            tracing::info!(
                "Creating Qdrant collection {} (dim={})",
                self.collection_name,
                dimension
            );
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(self.collection_name.as_str())
                        .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine)),
                )
                .await
                .map_err(store_err)?;
        }

        *ready = true;
        Ok(())
    }

    async fn collection_exists(&self) -> Result<bool> {
        self.client
            .collection_exists(self.collection_name.as_str())
            .await
            .map_err(store_err)
    }

    fn to_point(item: VectorItem) -> PointStruct {
        let mut payload: HashMap<String, QdrantValue> = match item.payload {
            JsonValue::Object(map) => map
                .into_iter()
                .map(|(k, v)| (k, json_to_qdrant_value(v)))
                .collect(),
            JsonValue::Null => HashMap::new(),
            other => HashMap::from([("value".to_string(), json_to_qdrant_value(other))]),
        };
        payload.insert(NAMESPACE_KEY.to_string(), QdrantValue::from(item.namespace));
        payload.insert(
            CREATED_AT_KEY.to_string(),
            QdrantValue::from(item.created_at.to_rfc3339()),
        );

        PointStruct::new(item.id, item.vector, payload)
    }

    /// 拆出内部字段, 剩下的作为调用方 payload
    fn split_payload(mut payload: HashMap<String, QdrantValue>) -> (String, JsonValue) {
        let namespace = payload
            .remove(NAMESPACE_KEY)
            .and_then(|v| match qdrant_to_json_value(v) {
                JsonValue::String(s) => Some(s),
                _ => None,
            })
            .unwrap_or_default();
        payload.remove(CREATED_AT_KEY);

        let map: serde_json::Map<String, JsonValue> = payload
            .into_iter()
            .map(|(k, v)| (k, qdrant_to_json_value(v)))
            .collect();
        (namespace, JsonValue::Object(map))
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn upsert(&self, item: VectorItem) -> Result<()> {
        self.upsert_batch(vec![item]).await.map(|_| ())
    }

    async fn upsert_batch(&self, items: Vec<VectorItem>) -> Result<usize> {
        let Some(first) = items.first() else {
            return Ok(0);
        };
        self.ensure_collection(first.vector.len()).await?;

        let count = items.len();
        let points: Vec<PointStruct> = items.into_iter().map(Self::to_point).collect();
        self.client
            .upsert_points(UpsertPointsBuilder::new(self.collection_name.as_str(), points).wait(true))
            .await
            .map_err(store_err)?;

        tracing::debug!("Upserted {} points into {}", count, self.collection_name);
        Ok(count)
    }

    async fn search(&self, query: SearchQuery) -> Result<Vec<SearchResult>> {
        if !self.collection_exists().await? {
            return Ok(Vec::new());
        }

        let mut builder = QueryPointsBuilder::new(self.collection_name.as_str())
            .query(Query::new_nearest(query.vector))
            .limit(query.limit as u64)
            .with_payload(true);
        if let Some(namespace) = query.namespace {
            builder = builder.filter(Filter::must([Condition::matches(NAMESPACE_KEY, namespace)]));
        }
        if let Some(min_score) = query.min_score {
            builder = builder.score_threshold(min_score);
        }

        let response = self.client.query(builder).await.map_err(store_err)?;

        Ok(response
            .result
            .into_iter()
            .map(|point| {
                let (_, payload) = Self::split_payload(point.payload);
                SearchResult {
                    id: point_id_to_string(point.id),
                    score: point.score,
                    payload,
                }
            })
            .collect())
    }

    #[allow(deprecated)]
    async fn get(&self, id: &str) -> Result<Option<VectorItem>> {
        if !self.collection_exists().await? {
            return Ok(None);
        }

        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(
                    self.collection_name.as_str(),
                    vec![PointId::from(id.to_string())],
                )
                .with_payload(true)
                .with_vectors(true),
            )
            .await
            .map_err(store_err)?;

        Ok(response.result.into_iter().next().map(|point| {
            let vector = match point.vectors.and_then(|v| v.vectors_options) {
                Some(VectorsOptions::Vector(v)) => v.data,
                _ => Vec::new(),
            };
            let (namespace, payload) = Self::split_payload(point.payload);
            VectorItem {
                id: point_id_to_string(point.id),
                namespace,
                vector,
                payload,
                created_at: Utc::now(),
            }
        }))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        if !self.collection_exists().await? {
            return Ok(());
        }

        self.client
            .delete_points(
                DeletePointsBuilder::new(self.collection_name.as_str())
                    .points(PointsIdsList {
                        ids: vec![PointId::from(id.to_string())],
                    })
                    .wait(true),
            )
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let total = if self.collection_exists().await? {
            self.client
                .count(CountPointsBuilder::new(self.collection_name.as_str()).exact(true))
                .await
                .map_err(store_err)?
                .result
                .map(|r| r.count as usize)
                .unwrap_or(0)
        } else {
            0
        };

        Ok(StoreStats {
            total_vectors: total,
            namespaces: BTreeMap::new(),
            last_updated: Utc::now(),
        })
    }

    async fn clear(&self) -> Result<()> {
        let mut ready = self.ready.lock().await;
        *ready = false;
        if self.collection_exists().await? {
            self.client
                .delete_collection(self.collection_name.as_str())
                .await
                .map_err(store_err)?;
        }
        Ok(())
    }
}

fn json_to_qdrant_value(json: JsonValue) -> QdrantValue {
    match json {
        JsonValue::String(s) => QdrantValue::from(s),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                QdrantValue::from(i)
            } else {
                QdrantValue::from(n.as_f64().unwrap_or(0.0))
            }
        }
        JsonValue::Bool(b) => QdrantValue::from(b),
        // 嵌套结构按 JSON 文本保存
        other => QdrantValue::from(other.to_string()),
    }
}

fn qdrant_to_json_value(value: QdrantValue) -> JsonValue {
    match value.kind {
        Some(Kind::StringValue(s)) => JsonValue::String(s),
        Some(Kind::IntegerValue(i)) => JsonValue::Number(i.into()),
        Some(Kind::DoubleValue(f)) => serde_json::Number::from_f64(f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Some(Kind::BoolValue(b)) => JsonValue::Bool(b),
        _ => JsonValue::Null,
    }
}

fn point_id_to_string(point_id: Option<PointId>) -> String {
    match point_id.and_then(|id| id.point_id_options) {
        Some(PointIdOptions::Num(n)) => n.to_string(),
        Some(PointIdOptions::Uuid(u)) => u,
        None => String::new(),
    }
}
