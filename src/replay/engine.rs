//! Replay of persisted sessions onto the transport

use crate::abstractions::{KeyStore, Transport};
use crate::error::{Error, Result};
use crate::replay::plan::{ReplayOptions, ReplayPlan};
use crate::session::record::SessionRecord;
use serde_json::Value;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Read and parse a persisted session artifact
pub async fn load_artifact(path: &Path, primary_channel: &str) -> Result<SessionRecord> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| Error::corrupt_artifact(path, e))?;
    let record: SessionRecord =
        serde_json::from_str(&content).map_err(|e| Error::corrupt_artifact(path, e))?;

    if record.sequence(primary_channel).is_none() {
        return Err(Error::corrupt_artifact(
            path,
            format!("missing channel sequence '{primary_channel}'"),
        ));
    }
    if record.session_id.is_none() {
        return Err(Error::corrupt_artifact(path, "replayId is null"));
    }
    Ok(record)
}

/// Outcome of a replay run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub total: usize,
    pub requested: usize,
    /// Events issued, after clamping
    pub sent: usize,
    pub clamped: bool,
    pub skipped_all: bool,
    pub interrupted: bool,
    pub initial_state_sent: bool,
    pub failed_publishes: usize,
    pub failed_key_writes: usize,
}

/// Publishes a recorded session with fixed pacing
pub struct ReplayEngine {
    transport: Arc<dyn Transport>,
    key_store: Arc<dyn KeyStore>,
    control_channel: String,
    primary_channel: String,
}

impl ReplayEngine {
    pub fn new(
        transport: Arc<dyn Transport>,
        key_store: Arc<dyn KeyStore>,
        control_channel: impl Into<String>,
        primary_channel: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            key_store,
            control_channel: control_channel.into(),
            primary_channel: primary_channel.into(),
        }
    }

    pub async fn run(&self, record: &SessionRecord, options: &ReplayOptions) -> Result<ReplaySummary> {
        self.run_until(record, options, std::future::pending()).await
    }

    /// Replay `record`, stopping early when `shutdown` resolves.
    ///
    /// The transport is closed when the run ends.
    pub async fn run_until<F>(
        &self,
        record: &SessionRecord,
        options: &ReplayOptions,
        shutdown: F,
    ) -> Result<ReplaySummary>
    where
        F: Future<Output = ()>,
    {
        let owner = record.owner_id.as_str();
        let primary = record.sequence(&self.primary_channel).ok_or_else(|| {
            Error::corrupt_artifact(
                owner,
                format!("missing channel sequence '{}'", self.primary_channel),
            )
        })?;

        let plan = ReplayPlan::new(primary.len(), options.skip, options.limit);
        let mut summary = ReplaySummary {
            total: plan.total,
            requested: options.limit,
            clamped: plan.clamped,
            skipped_all: plan.skipped_all,
            ..ReplaySummary::default()
        };

        if plan.skipped_all {
            warn!(
                "Number of events to skip ({}) exceeds total events ({}). Skipping all events.",
                options.skip, plan.total
            );
            self.close().await;
            return Ok(summary);
        }
        if plan.clamped {
            warn!(
                "Number of events to send exceeds total events. Sending {} events.",
                plan.count
            );
        }

        if options.send_initial_state {
            summary.initial_state_sent = self.send_initial_state(record, &mut summary).await;
        }

        // Primary channel first, then the rest in artifact order
        let mut channels: Vec<&str> = vec![self.primary_channel.as_str()];
        channels.extend(
            record
                .channels
                .keys()
                .map(String::as_str)
                .filter(|c| *c != self.primary_channel),
        );
        let scope = record.key_scope().unwrap_or_default();

        let mut publishes: Vec<(usize, JoinHandle<Result<()>>)> = Vec::new();
        let mut key_writes: Vec<(usize, JoinHandle<Result<()>>)> = Vec::new();

        tokio::pin!(shutdown);
        for (n, index) in plan.indices().enumerate() {
            if n > 0 {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => {
                        warn!("Interrupted. Stopping replay after {} events.", summary.sent);
                        summary.interrupted = true;
                        break;
                    }
                    _ = tokio::time::sleep(options.delay) => {}
                }
            }

            for channel in &channels {
                let destination = format!("{owner}-{channel}");
                match record.sequence(channel).and_then(|seq| seq.get(index)) {
                    Some(payload) => {
                        let transport = Arc::clone(&self.transport);
                        let payload = payload.clone();
                        publishes.push((
                            index,
                            tokio::spawn(async move {
                                transport.publish(&destination, &payload).await
                            }),
                        ));
                    }
                    None => {
                        summary.failed_publishes += 1;
                        warn!("Channel {} has no event {}", channel, index + 1);
                    }
                }
            }

            if let Some(keys) = record.key_snapshots.get(index).filter(|k| has_keys(k)) {
                debug!("Setting keys for event {} of {}", index + 1, plan.total);
                let store = Arc::clone(&self.key_store);
                let scope = scope.clone();
                let keys = keys.clone();
                key_writes.push((
                    index,
                    tokio::spawn(async move { store.set_keys(&scope, &keys).await }),
                ));
            }

            summary.sent += 1;
            info!("Sent event {} of {} to {}", index + 1, plan.total, owner);
        }

        for (index, handle) in publishes {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    summary.failed_publishes += 1;
                    warn!("Publish for event {} failed: {}", index + 1, e);
                }
                Err(e) => {
                    summary.failed_publishes += 1;
                    warn!("Publish task for event {} failed: {}", index + 1, e);
                }
            }
        }
        for (index, handle) in key_writes {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    summary.failed_key_writes += 1;
                    error!("Error setting keys for event {}: {}", index + 1, e);
                }
                Err(e) => {
                    summary.failed_key_writes += 1;
                    error!("Key write task for event {} failed: {}", index + 1, e);
                }
            }
        }

        if summary.failed_publishes > 0 {
            warn!("{} publishes failed", summary.failed_publishes);
        }
        info!("Sent {} events to {}", summary.sent, owner);
        self.close().await;
        Ok(summary)
    }

    async fn send_initial_state(&self, record: &SessionRecord, summary: &mut ReplaySummary) -> bool {
        let Some(initial_state) = &record.initial_state else {
            warn!("Artifact has no game start state; not sending it");
            return false;
        };
        let destination = format!("{}-{}", record.owner_id, self.control_channel);
        match self
            .transport
            .publish(&destination, &initial_state.to_string())
            .await
        {
            Ok(()) => {
                info!("Sent game state to {}", record.owner_id);
                true
            }
            Err(e) => {
                summary.failed_publishes += 1;
                warn!("Failed to send game state: {}", e);
                false
            }
        }
    }

    async fn close(&self) {
        if let Err(e) = self.transport.quit().await {
            warn!("Failed to close transport cleanly: {}", e);
        }
    }
}

/// Snapshot worth writing back: a non-empty object
fn has_keys(keys: &Value) -> bool {
    keys.as_object().is_some_and(|map| !map.is_empty())
}
