//! Save command implementation
//!
//! Connects to Redis, subscribes to the bot's channels and writes one
//! artifact per finished game until interrupted.

use crate::abstractions::{RedisKeyStore, RedisTransport};
use crate::app::signals::shutdown_signal;
use crate::config::Settings;
use crate::session::{
    ArtifactWriter, ChannelLayout, ListenerOptions, Recorder, RecorderPolicy, SessionListener,
};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Record games until interrupted
pub async fn run_save_command(config_file: PathBuf, data_directory: PathBuf) -> Result<()> {
    let settings = Settings::load(&config_file)?;
    let bot_id = settings.game_config.bot_id();
    info!("[initializing] botId: {}", bot_id);
    debug!("Recorder configuration: {:?}", settings.recorder_config);

    let data_directory = if data_directory.is_absolute() {
        data_directory
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(data_directory)
    };

    let transport = Arc::new(RedisTransport::connect(&settings.redis_config).await?);
    let key_store = Arc::new(RedisKeyStore::new(transport.connection()));

    let recorder_config = &settings.recorder_config;
    let layout = ChannelLayout::new(bot_id, recorder_config);
    let recorder = Recorder::new(layout, RecorderPolicy::from(recorder_config));
    let listener = SessionListener::new(
        transport,
        key_store,
        recorder,
        ArtifactWriter::new(data_directory),
    )
    .with_options(ListenerOptions {
        max_pending_snapshots: recorder_config.max_pending_snapshots,
        flush_on_shutdown: recorder_config.flush_on_shutdown,
    });

    let summary = listener.run(shutdown_signal()).await?;
    info!(
        "Saved {} games ({} failed) from {} messages",
        summary.saved.len(),
        summary.failed_saves,
        summary.messages_received
    );
    let stats = &summary.recorder;
    info!(
        "{} games started, {} discarded unfinished, {} messages outside a game, {} chat messages",
        stats.sessions_started,
        stats.sessions_discarded,
        stats.discarded_while_idle,
        stats.chat_ignored
    );
    if stats.unknown_channel > 0 || summary.malformed_messages > 0 {
        warn!(
            "{} messages on untracked channels, {} malformed control messages",
            stats.unknown_channel, summary.malformed_messages
        );
    }
    Ok(())
}
