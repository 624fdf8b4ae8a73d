//! # game-replay
//!
//! Records the event channels a game bot publishes on Redis into one JSON
//! artifact per game, and replays those artifacts back onto Redis.
//!
//! ## Usage
//!
//! ```bash
//! game-replay save config.json [--data-directory data]
//! game-replay replay config.json data/<botId>-<replayId>.json [--send-game-state] [--number N] [--skip N] [--delay MS]
//! ```
//!
//! ## Modules
//!
//! - `abstractions` - Transport and key store traits with Redis and mock implementations
//! - `app` - Logging, signal handling and fatal error reporting
//! - `cli` - Argument parsing and command implementations
//! - `config` - JSON configuration file
//! - `error` - Error taxonomy
//! - `identity` - Bot id derivation
//! - `replay` - Replay engine
//! - `session` - Recording state machine, aggregation and persistence
pub mod abstractions;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod identity;
pub mod replay;
pub mod session;

pub use error::{Error, Result};
