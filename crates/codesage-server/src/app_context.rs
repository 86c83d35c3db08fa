//! 应用上下文 - 持有共享的向量库、助手工厂和访客配额

use std::sync::Arc;

use codesage_agent::AssistantFactory;
use codesage_core::{Config, Result};
use codesage_vector::{StoreBackend, create_store};

use crate::admission::DailyUsageLimiter;

#[derive(Clone)]
pub struct AppContext {
    pub factory: AssistantFactory,
    pub limiter: Arc<DailyUsageLimiter>,
}

impl AppContext {
    pub fn new(factory: AssistantFactory, limiter: DailyUsageLimiter) -> Self {
        Self {
            factory,
            limiter: Arc::new(limiter),
        }
    }

    /// 按配置创建向量库; 服务端缺少可用凭据时关闭访客通道
    pub fn from_config(config: Config) -> Result<Self> {
        let store = create_store(StoreBackend::from_config(&config.vector)?)?;
        let factory = AssistantFactory::new(config, store);

        let admission = &factory.config().admission;
        let guest_enabled = admission.guest_enabled
            && match factory.build(None) {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!("Guest tier disabled, server credentials unavailable: {}", e);
                    false
                }
            };
        let limiter = DailyUsageLimiter::new(admission.daily_guest_limit, guest_enabled);

        Ok(Self::new(factory, limiter))
    }

    pub fn config(&self) -> &Config {
        self.factory.config()
    }
}
