//! Configuration file loading
//!
//! The recorder and the replay command share one JSON configuration file with
//! three sections: `redisConfig` (connection), `gameConfig` (owner identity)
//! and the optional `recorderConfig` (channel layout and recording policies).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[cfg(test)]
mod tests;

/// Top-level configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Redis connection settings
    pub redis_config: RedisSettings,

    /// Identity of the bot whose channels are recorded
    pub game_config: GameSettings,

    /// Recording policies, all optional
    #[serde(default)]
    pub recorder_config: RecorderSettings,
}

/// Redis connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    #[serde(rename = "HOST")]
    pub host: String,

    #[serde(rename = "PORT", default = "default_port")]
    pub port: u16,

    #[serde(rename = "USERNAME", default)]
    pub username: Option<String>,

    #[serde(rename = "PASSWORD", default)]
    pub password: Option<String>,

    /// Connect with `rediss://`
    #[serde(rename = "TLS", default = "default_true")]
    pub tls: bool,

    #[serde(rename = "DATABASE", default)]
    pub database: u16,
}

impl RedisSettings {
    /// Connection URL understood by `redis::Client::open`
    pub fn url(&self) -> String {
        let scheme = if self.tls { "rediss" } else { "redis" };
        let auth = match (&self.username, &self.password) {
            (Some(user), Some(pass)) => format!("{user}:{pass}@"),
            (None, Some(pass)) => format!(":{pass}@"),
            (Some(user), None) => format!("{user}@"),
            (None, None) => String::new(),
        };
        format!(
            "{scheme}://{auth}{}:{}/{}",
            self.host, self.port, self.database
        )
    }

    /// Same as [`url`](Self::url) with the password masked, for logging
    pub fn redacted_url(&self) -> String {
        let mut redacted = self.clone();
        if redacted.password.is_some() {
            redacted.password = Some("***".to_string());
        }
        redacted.url()
    }
}

/// Bot identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSettings {
    #[serde(rename = "BOT_ID_PREFIX")]
    pub bot_id_prefix: String,

    #[serde(rename = "userId")]
    pub user_id: String,
}

impl GameSettings {
    /// Owner id used to prefix every channel and key scope
    pub fn bot_id(&self) -> String {
        crate::identity::bot_id(&self.bot_id_prefix, &self.user_id)
    }
}

/// What to do with an open session when a new start marker arrives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestartPolicy {
    /// Persist the unfinished session before opening the new one
    #[default]
    Persist,
    /// Drop the unfinished session
    Discard,
}

/// What to do when tracked channels end a session with different lengths
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MismatchPolicy {
    /// Log the mismatch and keep every payload
    #[default]
    Warn,
    /// Truncate all sequences to the shortest tracked channel
    Truncate,
}

/// Channel layout and recording policies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderSettings {
    #[serde(default = "default_control_channel")]
    pub control_channel: String,

    /// Tracked channels; the first one is the primary channel
    #[serde(default = "default_tracked_channels")]
    pub tracked_channels: Vec<String>,

    /// Tracked channel whose messages trigger a key snapshot
    #[serde(default = "default_snapshot_channel")]
    pub snapshot_channel: Option<String>,

    /// Time to keep collecting tracked messages after the end marker
    #[serde(with = "humantime_serde", default = "default_grace_period")]
    pub grace_period: Duration,

    #[serde(default)]
    pub on_restart: RestartPolicy,

    #[serde(default)]
    pub length_mismatch: MismatchPolicy,

    /// Upper bound on key lookups in flight at once
    #[serde(default = "default_max_pending_snapshots")]
    pub max_pending_snapshots: usize,

    /// Persist an open session when interrupted instead of discarding it
    #[serde(default)]
    pub flush_on_shutdown: bool,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            control_channel: default_control_channel(),
            tracked_channels: default_tracked_channels(),
            snapshot_channel: default_snapshot_channel(),
            grace_period: default_grace_period(),
            on_restart: RestartPolicy::default(),
            length_mismatch: MismatchPolicy::default(),
            max_pending_snapshots: default_max_pending_snapshots(),
            flush_on_shutdown: false,
        }
    }
}

impl RecorderSettings {
    /// Check channel names for consistency
    pub fn validate(&self) -> Result<()> {
        if self.control_channel.is_empty() {
            return Err(Error::config("controlChannel must not be empty"));
        }
        if self.tracked_channels.is_empty() {
            return Err(Error::config("trackedChannels must name at least one channel"));
        }
        for (i, channel) in self.tracked_channels.iter().enumerate() {
            if channel.is_empty() {
                return Err(Error::config("trackedChannels contains an empty name"));
            }
            if *channel == self.control_channel {
                return Err(Error::config(format!(
                    "channel '{channel}' cannot be both control and tracked"
                )));
            }
            if self.tracked_channels[..i].contains(channel) {
                return Err(Error::config(format!(
                    "channel '{channel}' is listed twice in trackedChannels"
                )));
            }
            if crate::session::record::RESERVED_FIELDS.contains(&channel.as_str()) {
                return Err(Error::config(format!(
                    "channel name '{channel}' collides with an artifact field"
                )));
            }
        }
        if let Some(snapshot) = &self.snapshot_channel {
            if !self.tracked_channels.contains(snapshot) {
                return Err(Error::config(format!(
                    "snapshotChannel '{snapshot}' is not a tracked channel"
                )));
            }
        }
        if self.max_pending_snapshots == 0 {
            return Err(Error::config("maxPendingSnapshots must be at least 1"));
        }
        Ok(())
    }
}

impl Settings {
    /// Parse settings from JSON text and validate them
    pub fn from_json(content: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(content).map_err(Error::config)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.redis_config.host.is_empty() {
            return Err(Error::config("redisConfig.HOST must not be empty"));
        }
        if self.game_config.bot_id_prefix.is_empty() {
            return Err(Error::config("gameConfig.BOT_ID_PREFIX must not be empty"));
        }
        self.recorder_config.validate()
    }
}

// Default value functions for serde
fn default_port() -> u16 {
    6379
}

fn default_true() -> bool {
    true
}

fn default_control_channel() -> String {
    "state".to_string()
}

fn default_tracked_channels() -> Vec<String> {
    vec!["turn".to_string(), "gameUpdate".to_string()]
}

fn default_snapshot_channel() -> Option<String> {
    Some("turn".to_string())
}

fn default_grace_period() -> Duration {
    Duration::from_secs(1)
}

fn default_max_pending_snapshots() -> usize {
    64
}
