//! Serve 命令

use anyhow::Result;
use codesage_core::Config;
use codesage_server::Gateway;

pub async fn run(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting CodeSage server...");
    tracing::info!(
        "Provider: {}, model: {}, vector backend: {:?}",
        config.ai.provider,
        config.ai.chat_model,
        config.vector.backend
    );

    let gateway = Gateway::from_config(config)?;
    gateway.start().await?;

    Ok(())
}
