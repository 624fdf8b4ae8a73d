//! Command routing and execution
//!
//! This module handles routing CLI commands to their respective implementations.

use crate::cli::args::Commands;
use crate::cli::commands::*;
use anyhow::Result;

/// Execute a CLI command based on the parsed arguments
pub async fn execute_command(command: Commands) -> Result<()> {
    match command {
        Commands::Save {
            config_file,
            data_directory,
        } => run_save_command(config_file, data_directory).await,
        Commands::Replay {
            config_file,
            filename,
            send_game_state,
            number,
            skip,
            delay,
        } => {
            run_replay_command(ReplayParams {
                config_file,
                filename,
                send_game_state,
                number,
                skip,
                delay_ms: delay,
            })
            .await
        }
    }
}
