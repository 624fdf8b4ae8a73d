//! Session recording
//!
//! Captures the tracked channels of one game into a [`SessionRecord`],
//! driven by lifecycle markers on the control channel, and persists the
//! finished record as a JSON artifact.
//!
//! ```text
//! transport ──► SessionListener ──► Recorder ──► ArtifactWriter
//!                     │                 ▲
//!                     └── key lookups ──┘
//! ```

pub mod channels;
pub mod control;
pub mod listener;
pub mod record;
pub mod recorder;
pub mod writer;

pub use channels::{ChannelKind, ChannelLayout};
pub use control::ControlMessage;
pub use listener::{ListenerOptions, ListenerSummary, SessionListener};
pub use record::{LengthMismatch, SessionRecord};
pub use recorder::{Recorder, RecorderPolicy, RecorderState, RecorderStats, SnapshotRequest};
pub use writer::ArtifactWriter;
