//! 统一配置加载器
//!
//! 按顺序合并配置源: 配置文件 (可选) → `CODESAGE__*` 环境变量 → 兼容变量 (`GOOGLE_API_KEY`)

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::{CodeSageError, Result};

pub const ENV_PREFIX: &str = "CODESAGE";

/// 兼容旧部署方式的 API Key 变量
const LEGACY_API_KEY_VARS: &[&str] = &["GOOGLE_API_KEY", "OPENAI_API_KEY"];

#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
    env: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// 使用给定变量表代替进程环境
    pub fn with_env(mut self, vars: HashMap<String, String>) -> Self {
        self.env = Some(vars);
        self
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".codesage")
            .join("codesage.json")
    }

    pub fn load(&self) -> Result<Config> {
        let mut builder = config::Config::builder();

        if let Some(path) = &self.path {
            tracing::debug!("Loading config file {}", path.display());
            builder = builder.add_source(config::File::from(path.as_path()).required(false));
        }

        let mut env = config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true);
        if let Some(vars) = &self.env {
            env = env.source(Some(vars.clone()));
        }

        let mut config: Config = builder
            .add_source(env)
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| CodeSageError::Config(format!("加载配置失败: {}", e)))?;

        if config.ai.api_key.is_none() {
            config.ai.api_key = LEGACY_API_KEY_VARS.iter().find_map(|var| self.var(var));
        }

        Ok(config)
    }

    fn var(&self, key: &str) -> Option<String> {
        match &self.env {
            Some(vars) => vars.get(key).cloned(),
            None => std::env::var(key).ok(),
        }
        .filter(|v| !v.is_empty())
    }
}
