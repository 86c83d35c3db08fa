//! CodeSage AI - 语言模型提供商抽象层
//!
//! 支持的提供商：
//! - Google (Gemini)
//! - OpenAI 及兼容 API (DeepSeek, OpenRouter, Ollama, 自定义)
//!
//! 三种能力：文本补全、结构化输出 (带 schema 校验)、嵌入向量。

pub mod providers;
pub mod schema;
pub mod types;

pub use providers::*;
pub use schema::*;
pub use types::*;
