use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use swlc::LotteryService;
use swlc_mcp::{LotteryUseCase, MCPHandler, config, stdio};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("Serving welfare lottery draws from {}", config.database_url);

    let service = LotteryService::open(&config)?;
    let lottery_use_case = LotteryUseCase::new(Arc::new(service));
    let handler = MCPHandler::new(Arc::new(lottery_use_case));

    let (reader, writer) = stdio();

    handler.serve(reader, writer).await.inspect_err(|e| {
        tracing::error!("serving error: {:?}", e);
    })?;

    Ok(())
}
