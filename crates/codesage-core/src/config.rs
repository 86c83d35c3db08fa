//! 配置管理

use serde::{Deserialize, Serialize};

/// 主配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 服务配置
    pub server: ServerConfig,
    /// AI 提供商配置
    pub ai: AiConfig,
    /// 向量存储配置
    pub vector: VectorConfig,
    /// 智能体循环配置
    pub agent: AgentConfig,
    /// 访客配额配置
    pub admission: AdmissionConfig,
}

/// 服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            log_level: "info".to_string(),
        }
    }
}

/// AI 提供商配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// 提供商名称 (gemini / openai / deepseek / ollama ...)
    pub provider: String,
    /// 服务端 API Key, 访客请求使用
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    /// 生成与查询扩展使用的温度
    pub generation_temperature: f32,
    /// 评估使用的温度
    pub evaluation_temperature: f32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            api_key: None,
            base_url: None,
            chat_model: "gemini-2.5-flash".to_string(),
            embedding_model: "models/embedding-001".to_string(),
            generation_temperature: 0.3,
            evaluation_temperature: 0.0,
        }
    }
}

/// 向量存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    /// 后端类型
    pub backend: VectorBackend,
    /// Qdrant 地址
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub collection: String,
    /// 代码块命名空间 (查询时使用)
    pub code_namespace: String,
    /// 摘要命名空间
    pub summary_namespace: String,
    /// 每个查询返回的结果数
    pub top_k: usize,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Memory,
            url: None,
            api_key: None,
            collection: "code-assistant".to_string(),
            code_namespace: "code-chunks".to_string(),
            summary_namespace: "summaries".to_string(),
            top_k: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VectorBackend {
    Memory,
    Qdrant,
}

/// 智能体循环配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// 检索次数上限, 超过 3 时按 3 处理
    pub max_iterations: u32,
    /// 查询扩展生成的改写数量
    pub num_queries: usize,
    /// 是否同时检索原始问题
    pub include_original: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            num_queries: 3,
            include_original: false,
        }
    }
}

/// 访客配额配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    pub guest_enabled: bool,
    /// 每个 UTC 日的访客请求上限
    pub daily_guest_limit: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            guest_enabled: true,
            daily_guest_limit: 450,
        }
    }
}

impl Config {
    /// 从 JSON 文件加载配置
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::CodeSageError::Config(format!("读取配置文件失败: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| crate::CodeSageError::Config(format!("解析配置文件失败: {}", e)))?;

        Ok(config)
    }
}
