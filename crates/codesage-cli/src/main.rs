//! CodeSage CLI - 命令行工具

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use codesage_core::{Config, ConfigLoader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "codesage")]
#[command(about = "CodeSage - Ask questions about your codebase", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Ask one question against the configured index
    Ask {
        /// The question to ask
        question: String,
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Use this API key instead of the configured one
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Show version info
    Version,
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(ConfigLoader::default_path);
    Ok(ConfigLoader::new().with_file(path).load()?)
}

fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("codesage={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port, config } => {
            let config = load_config(config)?;
            init_tracing(&config.server.log_level);
            commands::serve::run(config, host, port).await?;
        }
        Commands::Ask {
            question,
            config,
            api_key,
        } => {
            let config = load_config(config)?;
            init_tracing(&config.server.log_level);
            commands::ask::run(config, question, api_key).await?;
        }
        Commands::Version => {
            println!("CodeSage {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
