//! HTTP API 路由

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use codesage_core::{ChatTurn, history_from_turns};
use codesage_vector::Document;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::admission::{Admission, USER_API_KEY_HEADER};
use crate::app_context::AppContext;
use crate::sse::query_events_to_sse;

/// 创建完整 API 路由
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/query", post(query_handler))
        .route("/index", post(index_handler))
        .with_state(ctx)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "status": "CodeSage API is running." }))
}

/// 健康检查
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// 查询请求
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

/// 索引请求
#[derive(Debug, Deserialize)]
pub struct IndexRequest {
    pub documents: Vec<Document>,
    #[serde(default)]
    pub summaries: Vec<Document>,
    /// 为 `documents` 生成一句话摘要并写入摘要命名空间
    #[serde(default)]
    pub generate_summaries: bool,
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub message: String,
    pub indexed: usize,
    pub generated_summaries: usize,
}

/// API 错误, 响应体为 `{"detail": ...}`
#[derive(Debug)]
pub enum ApiError {
    QuotaExceeded,
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::QuotaExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                "Daily free tier quota exceeded.".to_string(),
            ),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            ApiError::Internal(detail) => (StatusCode::INTERNAL_SERVER_ERROR, detail),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<codesage_core::CodeSageError> for ApiError {
    fn from(e: codesage_core::CodeSageError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

/// 准入检查, 返回构建助手时使用的 key (`None` 表示服务端 key)
async fn admit(ctx: &AppContext, headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let user_key = headers
        .get(USER_API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match ctx.limiter.admit(user_key).await {
        Some(Admission::OwnKey(key)) => Ok(Some(key)),
        Some(Admission::Guest) => Ok(None),
        None => Err(ApiError::QuotaExceeded),
    }
}

/// 查询, 以 SSE 推送事件
async fn query_handler(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Json(request): Json<QueryRequest>,
) -> Result<Response, ApiError> {
    if request.question.trim().is_empty() {
        return Err(ApiError::BadRequest("question 不能为空".to_string()));
    }

    let api_key = admit(&ctx, &headers).await?;
    let assistant = ctx.factory.build(api_key)?;

    tracing::info!(
        "Query received ({} history turns): {}",
        request.history.len(),
        request.question
    );

    let history = history_from_turns(&request.history);
    let events = assistant.run_query(request.question, history);
    Ok(query_events_to_sse(events).into_response())
}

/// 写入代码块和摘要
async fn index_handler(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Json(request): Json<IndexRequest>,
) -> Result<Json<IndexResponse>, ApiError> {
    if request.documents.is_empty() && request.summaries.is_empty() {
        return Err(ApiError::BadRequest("没有可索引的文档".to_string()));
    }

    let api_key = admit(&ctx, &headers).await?;
    let vector = &ctx.config().vector;

    let mut summaries = request.summaries;
    let mut generated_summaries = 0;
    if request.generate_summaries && !request.documents.is_empty() {
        let summarizer = ctx.factory.summarizer(api_key.clone())?;
        let generated = summarizer.summarize(&request.documents).await;
        generated_summaries = generated.len();
        summaries.extend(generated);
    }

    let indexer = ctx.factory.indexer(api_key)?;
    let mut indexed = indexer
        .index(&vector.code_namespace, request.documents)
        .await?;
    if !summaries.is_empty() {
        indexed += indexer.index(&vector.summary_namespace, summaries).await?;
    }

    tracing::info!("Indexed {} documents", indexed);

    Ok(Json(IndexResponse {
        message: format!("Indexed {} documents.", indexed),
        indexed,
        generated_summaries,
    }))
}
