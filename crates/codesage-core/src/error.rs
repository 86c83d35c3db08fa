//! 统一错误处理

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodeSageError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("AI 提供商错误: {0}")]
    AIProvider(String),

    #[error("HTTP 请求错误: {0}")]
    Http(String),

    #[error("向量存储错误: {0}")]
    VectorStore(String),

    #[error("检索失败: {0}")]
    Retrieval(String),

    #[error("生成失败: {0}")]
    Generation(String),

    #[error("评估失败: {0}")]
    Evaluation(String),

    #[error("结构化输出不符合约定: {0}")]
    SchemaViolation(String),

    #[error("准入被拒绝: {0}")]
    Admission(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CodeSageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_keeps_detail() {
        let err = CodeSageError::SchemaViolation("missing field `reasoning`".to_string());
        assert!(err.to_string().contains("missing field `reasoning`"));
    }

    #[test]
    fn test_serde_error_converts() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: CodeSageError = parse.unwrap_err().into();
        assert!(matches!(err, CodeSageError::Serialization(_)));
    }
}
