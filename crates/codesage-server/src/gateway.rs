//! 网关服务

use std::net::SocketAddr;

use axum::Router;
use codesage_core::{CodeSageError, Config, Result};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::create_router;
use crate::app_context::AppContext;

pub struct Gateway {
    ctx: AppContext,
}

impl Gateway {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    pub fn from_config(config: Config) -> Result<Self> {
        Ok(Self::new(AppContext::from_config(config)?))
    }

    /// 带 CORS 和请求追踪的完整路由
    pub fn router(&self) -> Router {
        Router::new()
            .merge(create_router(self.ctx.clone()))
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .layer(TraceLayer::new_for_http())
    }

    /// 启动服务
    pub async fn start(&self) -> Result<()> {
        let server = &self.ctx.config().server;
        let addr: SocketAddr = format!("{}:{}", server.host, server.port)
            .parse()
            .map_err(|e| CodeSageError::Config(format!("无效的监听地址: {}", e)))?;

        tracing::info!("CodeSage Gateway starting on {}", addr);
        tracing::info!(
            "Guest tier: enabled={}, daily limit={}",
            self.ctx.limiter.is_enabled(),
            self.ctx.config().admission.daily_guest_limit
        );

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| CodeSageError::Config(format!("绑定地址失败: {}", e)))?;

        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}
