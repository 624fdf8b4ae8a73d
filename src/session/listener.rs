//! Subscription loop driving the recorder
//!
//! One task owns the [`Recorder`] and multiplexes four event sources with
//! `select!`: shutdown, the grace-period deadline, completed key lookups and
//! inbound transport messages. Key lookups run as separate tasks in a
//! [`JoinSet`] so ingestion never waits on the key store.

use crate::abstractions::{InboundMessage, KeyStore, Transport};
use crate::error::Result;
use crate::session::channels::ChannelKind;
use crate::session::control::ControlMessage;
use crate::session::recorder::{Recorder, RecorderState, RecorderStats, SnapshotRequest};
use crate::session::record::SessionRecord;
use crate::session::writer::ArtifactWriter;
use futures::StreamExt;
use serde_json::Value;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Listener tuning
#[derive(Debug, Clone, Copy)]
pub struct ListenerOptions {
    pub max_pending_snapshots: usize,
    pub flush_on_shutdown: bool,
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            max_pending_snapshots: 64,
            flush_on_shutdown: false,
        }
    }
}

/// Outcome of a listening run
#[derive(Debug, Clone, Default)]
pub struct ListenerSummary {
    pub messages_received: usize,
    pub malformed_messages: usize,
    pub saved: Vec<PathBuf>,
    pub failed_saves: usize,
    pub skipped_snapshots: usize,
    /// Recorder counters at the end of the run
    pub recorder: RecorderStats,
}

struct SnapshotResult {
    request: SnapshotRequest,
    keys: Result<Value>,
}

pub struct SessionListener {
    transport: Arc<dyn Transport>,
    key_store: Arc<dyn KeyStore>,
    recorder: Recorder,
    writer: ArtifactWriter,
    options: ListenerOptions,
    lookups: JoinSet<SnapshotResult>,
    summary: ListenerSummary,
}

impl SessionListener {
    pub fn new(
        transport: Arc<dyn Transport>,
        key_store: Arc<dyn KeyStore>,
        recorder: Recorder,
        writer: ArtifactWriter,
    ) -> Self {
        Self {
            transport,
            key_store,
            recorder,
            writer,
            options: ListenerOptions::default(),
            lookups: JoinSet::new(),
            summary: ListenerSummary::default(),
        }
    }

    pub fn with_options(mut self, options: ListenerOptions) -> Self {
        self.options = options;
        self
    }

    /// Listen until `shutdown` resolves or the subscription ends
    pub async fn run<F>(mut self, shutdown: F) -> Result<ListenerSummary>
    where
        F: Future<Output = ()>,
    {
        let subscriptions = self.recorder.layout().subscriptions();
        let mut stream = self.transport.subscribe(&subscriptions).await?;
        info!("Listening for updates on {} ...", subscriptions.join(", "));

        tokio::pin!(shutdown);
        loop {
            let deadline = self.recorder.deadline();
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Interrupted. Exiting gracefully.");
                    self.close_open_session().await;
                    break;
                }
                _ = wait_until(deadline) => {
                    self.finalize().await;
                }
                Some(joined) = self.lookups.join_next(), if !self.lookups.is_empty() => {
                    self.apply_lookup(joined);
                }
                next = stream.next() => match next {
                    Some(message) => self.dispatch(message).await,
                    None => {
                        warn!("Subscription closed by the transport");
                        self.close_open_session().await;
                        break;
                    }
                },
            }
        }

        drop(stream);
        if let Err(e) = self.transport.quit().await {
            warn!("Failed to close transport cleanly: {}", e);
        }
        self.summary.recorder = self.recorder.stats().clone();
        Ok(self.summary)
    }

    async fn dispatch(&mut self, message: InboundMessage) {
        self.summary.messages_received += 1;
        let layout = self.recorder.layout().clone();
        match layout.classify(&message.channel) {
            ChannelKind::Control => self.handle_control(&message.payload).await,
            ChannelKind::Tracked(channel) => {
                if let Some(request) = self.recorder.on_tracked(channel, message.payload) {
                    self.spawn_lookup(request);
                }
            }
            ChannelKind::Unknown => debug!("Ignoring message on {}", message.channel),
        }
    }

    async fn handle_control(&mut self, payload: &str) {
        let control = match ControlMessage::decode(payload) {
            Ok(control) => control,
            Err(e) => {
                self.summary.malformed_messages += 1;
                warn!("{}", e);
                return;
            }
        };

        // A start marker may close the open record; collect its snapshots first
        if matches!(control, ControlMessage::Start { .. }) && self.recorder.is_open() {
            self.drain_lookups().await;
        }

        if let Some(prior) = self.recorder.on_control(control, Instant::now()) {
            self.persist(prior).await;
        }
    }

    fn spawn_lookup(&mut self, request: SnapshotRequest) {
        if self.lookups.len() >= self.options.max_pending_snapshots {
            self.summary.skipped_snapshots += 1;
            warn!(
                "Too many key lookups in flight; snapshot {} of {} left empty",
                request.index, request.session_id
            );
            return;
        }
        let store = Arc::clone(&self.key_store);
        self.lookups.spawn(async move {
            let keys = store.list_keys(&request.scope).await;
            SnapshotResult { request, keys }
        });
    }

    fn apply_lookup(&mut self, joined: std::result::Result<SnapshotResult, JoinError>) {
        match joined {
            Ok(SnapshotResult {
                request,
                keys: Ok(keys),
            }) => self.recorder.on_snapshot(&request, keys),
            Ok(SnapshotResult {
                request,
                keys: Err(e),
            }) => warn!("Key snapshot {} of {}: {}", request.index, request.session_id, e),
            Err(e) => warn!("Key lookup task failed: {}", e),
        }
    }

    async fn drain_lookups(&mut self) {
        while let Some(joined) = self.lookups.join_next().await {
            self.apply_lookup(joined);
        }
    }

    /// Grace period over: persist and reset
    async fn finalize(&mut self) {
        self.drain_lookups().await;
        if let Some(record) = self.recorder.finish() {
            self.persist(record).await;
        }
    }

    async fn close_open_session(&mut self) {
        match self.recorder.state() {
            RecorderState::Idle => {}
            RecorderState::Finishing { .. } => self.finalize().await,
            RecorderState::Recording if self.options.flush_on_shutdown => {
                info!("Saving unfinished game before exit");
                self.finalize().await;
            }
            RecorderState::Recording => {
                if let Some(id) = self.recorder.discard() {
                    warn!("Discarding unfinished game {}", id);
                }
            }
        }
    }

    async fn persist(&mut self, record: SessionRecord) {
        match self.writer.write(&record).await {
            Ok(path) => self.summary.saved.push(path),
            Err(e) => {
                self.summary.failed_saves += 1;
                error!(
                    "{} (game {} lost)",
                    e,
                    record.session_id.as_deref().unwrap_or_default()
                );
            }
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
