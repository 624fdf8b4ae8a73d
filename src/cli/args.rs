//! CLI argument structures
//!
//! This module defines the command-line interface: the `save` command that
//! records games and the `replay` command that plays an artifact back.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Record game sessions from Redis and replay them
#[derive(Parser)]
#[command(name = "game-replay")]
#[command(about = "game-replay - Record game events from Redis and replay them", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Receive events from Redis and save them to a file
    #[command(name = "save")]
    Save {
        /// Configuration file (JSON)
        config_file: PathBuf,

        /// Directory to store event replay files
        #[arg(long, default_value = "data")]
        data_directory: PathBuf,
    },

    /// Load events from a file and send them to Redis
    #[command(name = "replay")]
    Replay {
        /// Configuration file (JSON)
        config_file: PathBuf,

        /// Artifact written by `save`
        filename: PathBuf,

        /// Send the initial game state event first
        #[arg(long)]
        send_game_state: bool,

        /// Number of events to send (0 sends all remaining)
        #[arg(long, default_value = "10")]
        number: usize,

        /// Number of events to skip
        #[arg(long, default_value = "0")]
        skip: usize,

        /// Delay between messages in milliseconds
        #[arg(long, default_value = "1000")]
        delay: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_save_defaults() {
        let cli = Cli::try_parse_from(["game-replay", "save", "config.json"]).unwrap();
        match cli.command {
            Commands::Save {
                config_file,
                data_directory,
            } => {
                assert_eq!(config_file, PathBuf::from("config.json"));
                assert_eq!(data_directory, PathBuf::from("data"));
            }
            _ => panic!("expected save"),
        }
    }

    #[test]
    fn test_parse_replay_options() {
        let cli = Cli::try_parse_from([
            "game-replay",
            "-vv",
            "replay",
            "config.json",
            "data/bot-A.json",
            "--send-game-state",
            "--number",
            "1",
            "--skip",
            "1",
            "--delay",
            "100",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Replay {
                filename,
                send_game_state,
                number,
                skip,
                delay,
                ..
            } => {
                assert_eq!(filename, PathBuf::from("data/bot-A.json"));
                assert!(send_game_state);
                assert_eq!((number, skip, delay), (1, 1, 100));
            }
            _ => panic!("expected replay"),
        }
    }

    #[test]
    fn test_replay_defaults() {
        let cli = Cli::try_parse_from(["game-replay", "replay", "c.json", "a.json"]).unwrap();
        match cli.command {
            Commands::Replay {
                send_game_state,
                number,
                skip,
                delay,
                ..
            } => {
                assert!(!send_game_state);
                assert_eq!((number, skip, delay), (10, 0, 1000));
            }
            _ => panic!("expected replay"),
        }
    }

    #[test]
    fn test_negative_number_rejected() {
        assert!(Cli::try_parse_from(["game-replay", "replay", "c.json", "a.json", "--number", "-1"])
            .is_err());
    }
}
