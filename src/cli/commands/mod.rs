//! Command implementation modules
//!
//! Each command is implemented as a separate module.

pub mod replay;
pub mod save;

// Re-export command execution functions
pub use replay::{run_replay_command, ReplayParams};
pub use save::run_save_command;
