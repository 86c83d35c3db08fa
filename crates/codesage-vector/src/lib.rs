//! CodeSage Vector - 向量存储与检索
//!
//! 提供统一的向量存储接口 (按命名空间隔离)，支持：
//! - 内存存储 (默认, 开发和测试)
//! - Qdrant (需要 `qdrant` feature)
//!
//! 以及建立在其上的嵌入、段落检索、文档索引和代码摘要。

pub mod embedding;
pub mod indexer;
pub mod search;
pub mod store;
pub mod summary;
pub mod types;

pub use embedding::*;
pub use indexer::*;
pub use search::*;
pub use store::*;
pub use summary::*;
pub use types::*;
