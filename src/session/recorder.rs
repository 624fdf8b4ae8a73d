//! Recording state machine and channel aggregation
//!
//! The [`Recorder`] owns the open [`SessionRecord`] and decides, from control
//! channel messages, when a session starts and ends. Tracked channel payloads
//! are appended while a session is open. The recorder never performs I/O: it
//! returns finished records and snapshot requests to its caller.

use crate::config::{MismatchPolicy, RecorderSettings, RestartPolicy};
use crate::session::channels::ChannelLayout;
use crate::session::control::ControlMessage;
use crate::session::record::SessionRecord;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Recording state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    /// End marker seen; tracked messages are still appended until `deadline`
    Finishing { deadline: Instant },
}

/// Policies applied by the state machine
#[derive(Debug, Clone, Copy)]
pub struct RecorderPolicy {
    pub grace_period: Duration,
    pub on_restart: RestartPolicy,
    pub length_mismatch: MismatchPolicy,
}

impl From<&RecorderSettings> for RecorderPolicy {
    fn from(settings: &RecorderSettings) -> Self {
        Self {
            grace_period: settings.grace_period,
            on_restart: settings.on_restart,
            length_mismatch: settings.length_mismatch,
        }
    }
}

impl Default for RecorderPolicy {
    fn default() -> Self {
        Self::from(&RecorderSettings::default())
    }
}

/// Key lookup to run for a snapshot-channel message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRequest {
    pub session_id: String,
    pub scope: String,
    pub index: usize,
}

/// Session and message counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecorderStats {
    pub sessions_started: usize,
    pub sessions_discarded: usize,
    pub discarded_while_idle: usize,
    pub chat_ignored: usize,
    pub unknown_channel: usize,
}

pub struct Recorder {
    layout: ChannelLayout,
    policy: RecorderPolicy,
    state: RecorderState,
    record: SessionRecord,
    stats: RecorderStats,
}

impl Recorder {
    pub fn new(layout: ChannelLayout, policy: RecorderPolicy) -> Self {
        let record = SessionRecord::idle(layout.owner_id());
        Self {
            layout,
            policy,
            state: RecorderState::Idle,
            record,
            stats: RecorderStats::default(),
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn layout(&self) -> &ChannelLayout {
        &self.layout
    }

    pub fn stats(&self) -> &RecorderStats {
        &self.stats
    }

    /// Open record, if any
    pub fn record(&self) -> Option<&SessionRecord> {
        self.is_open().then_some(&self.record)
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.state, RecorderState::Idle)
    }

    pub fn session_id(&self) -> Option<&str> {
        if self.is_open() {
            self.record.session_id.as_deref()
        } else {
            None
        }
    }

    /// When the grace period of a finished session runs out
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            RecorderState::Finishing { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// Apply a control message.
    ///
    /// Returns the prior record when a start marker arrives while a finished
    /// session is in its grace period, or interrupts an open session under
    /// [`RestartPolicy::Persist`]; the caller persists it.
    pub fn on_control(&mut self, message: ControlMessage, now: Instant) -> Option<SessionRecord> {
        match message {
            ControlMessage::Chat => {
                self.stats.chat_ignored += 1;
                None
            }
            ControlMessage::Start {
                session_id,
                payload,
            } => {
                let prior = self.close_for_restart(&session_id);
                info!("Game started: {}", session_id);
                self.record = SessionRecord::open(
                    self.layout.owner_id(),
                    session_id,
                    payload,
                    self.layout.tracked(),
                );
                self.state = RecorderState::Recording;
                self.stats.sessions_started += 1;
                prior
            }
            ControlMessage::Won => {
                self.on_end("won", now);
                None
            }
            ControlMessage::Lost => {
                self.on_end("lost", now);
                None
            }
            ControlMessage::Other => {
                debug!("Ignoring control update in state {:?}", self.state);
                None
            }
        }
    }

    fn on_end(&mut self, outcome: &str, now: Instant) {
        match self.state {
            RecorderState::Recording => {
                info!(
                    "Game over: {} ({})",
                    self.record.session_id.as_deref().unwrap_or_default(),
                    outcome
                );
                self.state = RecorderState::Finishing {
                    deadline: now + self.policy.grace_period,
                };
            }
            RecorderState::Finishing { .. } => debug!("Ignoring repeated end marker"),
            RecorderState::Idle => debug!("Ignoring end marker while idle"),
        }
    }

    /// Close an open session because `next` is starting
    fn close_for_restart(&mut self, next: &str) -> Option<SessionRecord> {
        if !self.is_open() {
            return None;
        }
        let prior = self.record.session_id.clone().unwrap_or_default();
        // A finished game in its grace period is saved whatever the policy
        if let RecorderState::Finishing { .. } = self.state {
            info!("Game {} started; saving finished game {}", next, prior);
            return self.finish();
        }
        match self.policy.on_restart {
            RestartPolicy::Persist => {
                warn!(
                    "Game {} started before {} was saved; saving {} first",
                    next, prior, prior
                );
                self.finish()
            }
            RestartPolicy::Discard => {
                warn!(
                    "Game {} started before {} was saved; discarding {} (data loss)",
                    next, prior, prior
                );
                self.discard();
                None
            }
        }
    }

    /// Append a tracked-channel payload.
    ///
    /// Returns a snapshot request when `channel` is the snapshot channel. The
    /// matching `KEYS` slot is reserved as `null` until the lookup completes.
    pub fn on_tracked(&mut self, channel: &str, payload: String) -> Option<SnapshotRequest> {
        if !self.is_open() {
            self.stats.discarded_while_idle += 1;
            return None;
        }
        if !self.layout.tracked().iter().any(|c| c == channel) {
            self.stats.unknown_channel += 1;
            warn!("Ignoring message on untracked channel {}", channel);
            return None;
        }

        let index = self.record.append(channel, payload);
        if self.layout.snapshot() != Some(channel) {
            return None;
        }

        self.record.key_snapshots.push(Value::Null);
        Some(SnapshotRequest {
            session_id: self.record.session_id.clone().unwrap_or_default(),
            scope: self.record.key_scope().unwrap_or_default(),
            index,
        })
    }

    /// Store the result of a key lookup. Stale results are dropped.
    pub fn on_snapshot(&mut self, request: &SnapshotRequest, keys: Value) {
        if self.session_id() != Some(request.session_id.as_str()) {
            debug!(
                "Dropping key snapshot {} for closed session {}",
                request.index, request.session_id
            );
            return;
        }
        match self.record.key_snapshots.get_mut(request.index) {
            Some(slot) => *slot = keys,
            None => warn!("Key snapshot index {} out of range", request.index),
        }
    }

    /// Finalize the open session and reset to idle
    pub fn finish(&mut self) -> Option<SessionRecord> {
        if !self.is_open() {
            return None;
        }
        self.state = RecorderState::Idle;
        let mut record = std::mem::replace(
            &mut self.record,
            SessionRecord::idle(self.layout.owner_id()),
        );

        if let Some(mismatch) = record.length_mismatch() {
            match self.policy.length_mismatch {
                MismatchPolicy::Warn => warn!(
                    "Channel lengths differ for {}: {} (messages were dropped)",
                    record.session_id.as_deref().unwrap_or_default(),
                    mismatch
                ),
                MismatchPolicy::Truncate => {
                    warn!(
                        "Channel lengths differ for {}: {}; truncating from {} to {}",
                        record.session_id.as_deref().unwrap_or_default(),
                        mismatch,
                        mismatch.longest,
                        mismatch.shortest
                    );
                    record.truncate(mismatch.shortest);
                }
            }
        }

        let missing = record.key_snapshots.iter().filter(|k| k.is_null()).count();
        if missing > 0 {
            warn!(
                "{} of {} key snapshots missing for {}",
                missing,
                record.key_snapshots.len(),
                record.session_id.as_deref().unwrap_or_default()
            );
        }

        Some(record)
    }

    /// Drop the open session, returning its id
    pub fn discard(&mut self) -> Option<String> {
        if !self.is_open() {
            return None;
        }
        self.state = RecorderState::Idle;
        self.stats.sessions_discarded += 1;
        let record = std::mem::replace(
            &mut self.record,
            SessionRecord::idle(self.layout.owner_id()),
        );
        record.session_id
    }
}
