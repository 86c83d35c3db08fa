//! AI 提供商工厂

use std::fmt;
use std::sync::Arc;

use codesage_core::{AiConfig, CodeSageError, Result};

use super::{
    AIProvider, GeminiProvider, OpenAICompatibleProvider, ProviderConfig, ProviderInfo,
};

/// 提供商类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderType {
    Gemini,
    OpenAI,
    DeepSeek,
    OpenRouter,
    Ollama,
    Custom,
}

impl ProviderType {
    /// 从字符串解析提供商类型
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Some(Self::Gemini),
            "openai" => Some(Self::OpenAI),
            "deepseek" => Some(Self::DeepSeek),
            "openrouter" => Some(Self::OpenRouter),
            "ollama" | "local" => Some(Self::Ollama),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    /// 获取默认模型
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini-2.5-flash",
            Self::OpenAI => "gpt-4o",
            Self::DeepSeek => "deepseek-chat",
            Self::OpenRouter => "openai/gpt-4o",
            Self::Ollama => "llama3.1",
            Self::Custom => "gpt-4o",
        }
    }

    fn openai_compatible_info(&self) -> Option<ProviderInfo> {
        let (name, default_base_url) = match self {
            Self::Gemini => return None,
            Self::OpenAI => ("openai", "https://api.openai.com/v1"),
            Self::DeepSeek => ("deepseek", "https://api.deepseek.com/v1"),
            Self::OpenRouter => ("openrouter", "https://openrouter.ai/api/v1"),
            Self::Ollama => ("ollama", "http://localhost:11434/v1"),
            Self::Custom => ("custom", ""),
        };
        Some(ProviderInfo {
            name,
            default_base_url,
        })
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Gemini => "gemini",
            Self::OpenAI => "openai",
            Self::DeepSeek => "deepseek",
            Self::OpenRouter => "openrouter",
            Self::Ollama => "ollama",
            Self::Custom => "custom",
        };
        write!(f, "{}", name)
    }
}

/// 提供商工厂
pub struct ProviderFactory;

impl ProviderFactory {
    /// 根据配置创建提供商实例
    pub fn create(provider_type: ProviderType, config: ProviderConfig) -> Result<Arc<dyn AIProvider>> {
        match provider_type.openai_compatible_info() {
            None => Ok(Arc::new(GeminiProvider::new(config))),
            Some(_) if provider_type == ProviderType::Custom && config.base_url.is_none() => Err(
                CodeSageError::Config("custom 提供商必须配置 base_url".to_string()),
            ),
            Some(info) => Ok(Arc::new(OpenAICompatibleProvider::new(config, info))),
        }
    }

    /// 从 `ai` 配置段创建提供商
    ///
    /// `api_key` 不为空时优先于配置中的服务端 key (调用方自带 key 的请求)。
    pub fn from_config(ai: &AiConfig, api_key: Option<String>) -> Result<Arc<dyn AIProvider>> {
        let provider_type = ProviderType::from_name(&ai.provider)
            .ok_or_else(|| CodeSageError::Config(format!("未知的 AI 提供商: {}", ai.provider)))?;

        let api_key = api_key.or_else(|| ai.api_key.clone());
        if api_key.is_none() && !matches!(provider_type, ProviderType::Ollama | ProviderType::Custom)
        {
            return Err(CodeSageError::Config(format!(
                "{} 提供商缺少 API key",
                provider_type
            )));
        }

        let config = ProviderConfig {
            name: provider_type.to_string(),
            api_key,
            base_url: ai.base_url.clone(),
            default_model: ai.chat_model.clone(),
        };

        tracing::debug!("Creating {} provider with model {}", provider_type, ai.chat_model);
        Self::create(provider_type, config)
    }

    /// 获取所有支持的提供商列表
    pub fn supported_providers() -> Vec<(&'static str, &'static str)> {
        vec![
            ("gemini", "Google Gemini"),
            ("openai", "OpenAI (GPT-4o)"),
            ("deepseek", "DeepSeek"),
            ("openrouter", "OpenRouter"),
            ("ollama", "Ollama (Local models)"),
            ("custom", "Custom OpenAI-compatible endpoint"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_type_from_name() {
        assert_eq!(ProviderType::from_name("gemini"), Some(ProviderType::Gemini));
        assert_eq!(ProviderType::from_name("Google"), Some(ProviderType::Gemini));
        assert_eq!(ProviderType::from_name("OpenAI"), Some(ProviderType::OpenAI));
        assert_eq!(ProviderType::from_name("local"), Some(ProviderType::Ollama));
        assert_eq!(ProviderType::from_name("unknown_provider"), None);
    }

    #[test]
    fn test_provider_type_display_round_trips() {
        for (name, _) in ProviderFactory::supported_providers() {
            let parsed = ProviderType::from_name(name).unwrap();
            assert_eq!(parsed.to_string(), name);
        }
    }

    #[test]
    fn test_from_config_prefers_caller_key() {
        let ai = AiConfig {
            api_key: Some("server-key".to_string()),
            ..AiConfig::default()
        };
        let provider = ProviderFactory::from_config(&ai, Some("user-key".to_string())).unwrap();
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn test_from_config_without_key_fails() {
        let ai = AiConfig::default();
        let err = ProviderFactory::from_config(&ai, None).err().unwrap();
        assert!(matches!(err, CodeSageError::Config(_)));
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let ai = AiConfig {
            provider: "ollama".to_string(),
            chat_model: "llama3.1".to_string(),
            ..AiConfig::default()
        };
        let provider = ProviderFactory::from_config(&ai, None).unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn test_custom_requires_base_url() {
        let config = ProviderConfig::new("custom", "k");
        assert!(ProviderFactory::create(ProviderType::Custom, config).is_err());
    }

    #[test]
    fn test_unknown_provider_is_config_error() {
        let ai = AiConfig {
            provider: "nope".to_string(),
            ..AiConfig::default()
        };
        assert!(ProviderFactory::from_config(&ai, Some("k".to_string())).is_err());
    }
}
