//! Control channel message decoding
//!
//! Control payloads are JSON objects whose top-level key marks the kind of
//! event. They are decoded once at ingestion into [`ControlMessage`].

use crate::error::{Error, Result};
use serde_json::Value;

const CHAT_MARKER: &str = "chat_message";
const START_MARKER: &str = "game_start";
const WON_MARKER: &str = "game_won";
const LOST_MARKER: &str = "game_lost";

/// Kinds of control channel messages
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// A game started; `payload` is the whole decoded message
    Start { session_id: String, payload: Value },
    Won,
    Lost,
    /// Chat traffic, never affects recording
    Chat,
    /// Any other state update
    Other,
}

impl ControlMessage {
    pub fn decode(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw).map_err(Error::malformed)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::malformed("control message is not a JSON object"))?;

        if object.contains_key(CHAT_MARKER) {
            return Ok(Self::Chat);
        }

        if let Some(start) = object.get(START_MARKER) {
            let session_id = start
                .get("replay_id")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::malformed("game_start without a string replay_id"))?
                .to_string();
            return Ok(Self::Start {
                session_id,
                payload: value,
            });
        }

        if object.contains_key(WON_MARKER) {
            return Ok(Self::Won);
        }
        if object.contains_key(LOST_MARKER) {
            return Ok(Self::Lost);
        }
        Ok(Self::Other)
    }
}
