//! Session record: the accumulator for one game and its persisted form

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Artifact field names that cannot be used as channel names
pub const RESERVED_FIELDS: [&str; 4] = ["botId", "replayId", "gameStart", "KEYS"];

/// All data captured for one session.
///
/// Serialized as a flat JSON object: the fixed fields plus one array of raw
/// payloads per tracked channel, keyed by the channel's logical name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(rename = "botId")]
    pub owner_id: String,

    #[serde(rename = "replayId")]
    pub session_id: Option<String>,

    #[serde(rename = "gameStart", default)]
    pub initial_state: Option<Value>,

    #[serde(rename = "KEYS", default)]
    pub key_snapshots: Vec<Value>,

    #[serde(flatten)]
    pub channels: BTreeMap<String, Vec<String>>,
}

/// Per-channel lengths of a record whose tracked channels disagree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthMismatch {
    pub lengths: Vec<(String, usize)>,
    pub shortest: usize,
    pub longest: usize,
}

impl std::fmt::Display for LengthMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .lengths
            .iter()
            .map(|(channel, len)| format!("{channel}={len}"))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

impl SessionRecord {
    /// Empty record with no session
    pub fn idle(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            session_id: None,
            initial_state: None,
            key_snapshots: Vec::new(),
            channels: BTreeMap::new(),
        }
    }

    /// Fresh record for a new session with an empty sequence per tracked channel
    pub fn open(
        owner_id: impl Into<String>,
        session_id: impl Into<String>,
        initial_state: Value,
        tracked: &[String],
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            session_id: Some(session_id.into()),
            initial_state: Some(initial_state),
            key_snapshots: Vec::new(),
            channels: tracked.iter().map(|c| (c.clone(), Vec::new())).collect(),
        }
    }

    /// Append a payload and return its index in the channel's sequence
    pub fn append(&mut self, channel: &str, payload: String) -> usize {
        let sequence = self.channels.entry(channel.to_string()).or_default();
        sequence.push(payload);
        sequence.len() - 1
    }

    pub fn sequence(&self, channel: &str) -> Option<&[String]> {
        self.channels.get(channel).map(Vec::as_slice)
    }

    /// Scope of the bot's key-value state for this session
    pub fn key_scope(&self) -> Option<String> {
        self.session_id
            .as_ref()
            .map(|id| format!("{}-{}", self.owner_id, id))
    }

    /// Deterministic artifact file name, `{botId}-{replayId}.json`
    pub fn file_name(&self) -> Option<String> {
        self.session_id.as_ref().map(|id| {
            format!(
                "{}-{}.json",
                sanitize_file_component(&self.owner_id),
                sanitize_file_component(id)
            )
        })
    }

    /// Detect tracked channels with different lengths
    pub fn length_mismatch(&self) -> Option<LengthMismatch> {
        let lengths: Vec<(String, usize)> = self
            .channels
            .iter()
            .map(|(channel, seq)| (channel.clone(), seq.len()))
            .collect();
        let shortest = lengths.iter().map(|(_, len)| *len).min()?;
        let longest = lengths.iter().map(|(_, len)| *len).max()?;
        (shortest != longest).then_some(LengthMismatch {
            lengths,
            shortest,
            longest,
        })
    }

    /// Truncate every tracked sequence and the key snapshots to `len`
    pub fn truncate(&mut self, len: usize) {
        for sequence in self.channels.values_mut() {
            sequence.truncate(len);
        }
        self.key_snapshots.truncate(len);
    }
}

/// Replace characters that are unsafe in a file name
fn sanitize_file_component(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
