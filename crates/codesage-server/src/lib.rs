//! CodeSage Server - HTTP 服务
//!
//! - `GET /`、`GET /health` 状态
//! - `POST /query` 以 SSE 推送查询事件
//! - `POST /index` 写入已切分的代码块和摘要

pub mod admission;
pub mod api;
pub mod app_context;
pub mod gateway;
pub mod sse;

pub use admission::*;
pub use api::*;
pub use app_context::*;
pub use gateway::*;
pub use sse::*;
