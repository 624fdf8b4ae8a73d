//! Session replay
//!
//! Reads a persisted artifact and republishes its tracked channels in
//! recorded order, one event index at a time with a fixed delay between
//! indices. Key snapshots are written back to the key store alongside.
//! Replay never touches live recording state.

pub mod engine;
pub mod plan;

pub use engine::{load_artifact, ReplayEngine, ReplaySummary};
pub use plan::{ReplayOptions, ReplayPlan};
