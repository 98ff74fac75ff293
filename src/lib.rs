mod bridge;
pub mod broadcast;
pub mod config;
pub mod db;
pub mod gesture;
pub mod interpret;
pub mod sequence;
mod utils;

#[cfg(test)]
mod test_support;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

use broadcast::BroadcastHub;
use config::AppConfig;
use db::Database;
use interpret::{AnthropicGenerator, Interpreter, TextGenerator};
use sequence::PipelineController;

pub use bridge::{bridge_loop, log_feed};

pub struct AppState {
    pub pipeline: PipelineController,
    pub config: AppConfig,
}

impl AppState {
    pub async fn new(config: AppConfig, generator: Arc<dyn TextGenerator>) -> Result<Self> {
        let database = Database::new(config.storage.db_path.clone())?;
        Self::with_database(config, generator, database).await
    }

    pub async fn with_database(
        config: AppConfig,
        generator: Arc<dyn TextGenerator>,
        database: Database,
    ) -> Result<Self> {
        let hub = BroadcastHub::new(database.clone(), config.broadcast.capacity);
        let interpreter = Interpreter::new(
            generator,
            Duration::from_millis(config.generator.timeout_ms),
        );
        let pipeline =
            PipelineController::new(config.buffer.clone(), interpreter, database, hub);

        // A corrupt stored frame should not keep the glove from working.
        if let Err(err) = pipeline.restore_latest().await {
            warn!("Starting from an all-false reading: {err:#}");
        }

        Ok(Self { pipeline, config })
    }
}

pub async fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    info!("Glove bridge starting up...");

    let config = AppConfig::load().context("failed to load configuration")?;
    let generator = AnthropicGenerator::new(&config.generator)?;
    if !generator.is_configured() {
        warn!("No ANTHROPIC_API_KEY configured; completed sentences will fail upstream");
    }

    let state = Arc::new(AppState::new(config, Arc::new(generator)).await?);
    let cancel_token = CancellationToken::new();

    let feed = tokio::spawn({
        let state = state.clone();
        let token = cancel_token.clone();
        async move { log_feed(&state, token).await }
    });

    tokio::spawn({
        let token = cancel_token.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received");
                token.cancel();
            }
        }
    });

    let result = bridge_loop(
        &state,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        cancel_token.clone(),
    )
    .await;

    cancel_token.cancel();
    if let Err(err) = feed.await {
        warn!("Feed task failed to join: {err}");
    }

    result
}
