//! Ask 命令 - 在进程内运行一次查询

use anyhow::{Result, bail};
use codesage_agent::QueryEvent;
use codesage_core::Config;
use codesage_server::AppContext;
use futures::StreamExt;

pub async fn run(config: Config, question: String, api_key: Option<String>) -> Result<()> {
    let ctx = AppContext::from_config(config)?;
    let assistant = ctx.factory.build(api_key)?;

    let mut events = assistant.run_query(question, Vec::new());
    while let Some(event) = events.next().await {
        match event {
            QueryEvent::StatusUpdate { node } => {
                println!("[{}]", node);
            }
            QueryEvent::FinalAnswer {
                answer,
                evaluation,
                iteration,
            } => {
                println!();
                println!("{}", answer);
                println!();
                match evaluation {
                    Some(evaluation) => println!(
                        "supported: {} ({} iteration(s)) - {}",
                        evaluation.is_supported, iteration, evaluation.reasoning
                    ),
                    None => println!("({} iteration(s), not evaluated)", iteration),
                }
            }
            QueryEvent::Error { message } => {
                bail!("查询失败: {}", message);
            }
        }
    }

    Ok(())
}
