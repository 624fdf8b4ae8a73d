//! Replay command implementation

use crate::abstractions::{RedisKeyStore, RedisTransport};
use crate::app::signals::shutdown_signal;
use crate::config::Settings;
use crate::replay::{load_artifact, ReplayEngine, ReplayOptions};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Parameters for the replay command
#[derive(Debug, Clone)]
pub struct ReplayParams {
    pub config_file: PathBuf,
    pub filename: PathBuf,
    pub send_game_state: bool,
    pub number: usize,
    pub skip: usize,
    pub delay_ms: u64,
}

impl ReplayParams {
    pub fn options(&self) -> ReplayOptions {
        ReplayOptions {
            send_initial_state: self.send_game_state,
            skip: self.skip,
            limit: self.number,
            delay: std::time::Duration::from_millis(self.delay_ms),
        }
    }
}

/// Replay an artifact onto the bot's channels
pub async fn run_replay_command(params: ReplayParams) -> Result<()> {
    let settings = Settings::load(&params.config_file)?;
    let recorder_config = &settings.recorder_config;
    let primary = recorder_config.tracked_channels[0].clone();

    // Fail on a bad artifact before touching the network
    let record = load_artifact(&params.filename, &primary).await?;
    info!(
        "Loaded {} ({} events, botId {})",
        params.filename.display(),
        record.sequence(&primary).map_or(0, <[String]>::len),
        record.owner_id
    );

    let transport = Arc::new(RedisTransport::connect(&settings.redis_config).await?);
    let key_store = Arc::new(RedisKeyStore::new(transport.connection()));
    let engine = ReplayEngine::new(
        transport,
        key_store,
        recorder_config.control_channel.clone(),
        primary,
    );

    let summary = engine
        .run_until(&record, &params.options(), shutdown_signal())
        .await?;

    println!(
        "Sent {} of {} events to {}{}",
        summary.sent,
        summary.total,
        record.owner_id,
        if summary.failed_publishes > 0 {
            format!(" ({} publishes failed)", summary.failed_publishes)
        } else {
            String::new()
        }
    );
    Ok(())
}
