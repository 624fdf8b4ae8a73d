//! Error types for recording and replaying game sessions

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the recorder, the replay engine and their collaborators
#[derive(Error, Debug)]
pub enum Error {
    /// Initial connection to the transport failed
    #[error("Transport connection failed: {0}")]
    TransportConnect(String),

    /// Publish or subscribe failed on an established connection
    #[error("Transport error: {0}")]
    Transport(String),

    /// A control message could not be decoded
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// A persisted artifact could not be read or parsed
    #[error("Corrupt artifact {}: {reason}", path.display())]
    CorruptArtifact { path: PathBuf, reason: String },

    /// Writing an artifact to disk failed
    #[error("Failed to persist session: {0}")]
    PersistenceWrite(String),

    /// Reading the key snapshot for a session failed
    #[error("Key store lookup failed: {0}")]
    KeyStoreLookup(String),

    /// Writing a key snapshot back into the key store failed
    #[error("Key store write failed: {0}")]
    KeyStoreWrite(String),

    /// Configuration file missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a transport connection error
    pub fn transport_connect<E: fmt::Display>(err: E) -> Self {
        Self::TransportConnect(err.to_string())
    }

    /// Create a transport error
    pub fn transport<E: fmt::Display>(err: E) -> Self {
        Self::Transport(err.to_string())
    }

    /// Create a malformed message error
    pub fn malformed<E: fmt::Display>(err: E) -> Self {
        Self::MalformedMessage(err.to_string())
    }

    /// Create a corrupt artifact error
    pub fn corrupt_artifact<P: Into<PathBuf>, E: fmt::Display>(path: P, reason: E) -> Self {
        Self::CorruptArtifact {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a persistence error
    pub fn persistence<E: fmt::Display>(err: E) -> Self {
        Self::PersistenceWrite(err.to_string())
    }

    /// Create a key store lookup error
    pub fn key_lookup<E: fmt::Display>(err: E) -> Self {
        Self::KeyStoreLookup(err.to_string())
    }

    /// Create a key store write error
    pub fn key_write<E: fmt::Display>(err: E) -> Self {
        Self::KeyStoreWrite(err.to_string())
    }

    /// Create a configuration error
    pub fn config<E: fmt::Display>(err: E) -> Self {
        Self::Config(err.to_string())
    }

    /// Whether the error terminates the current command.
    ///
    /// Everything else is scoped to one message or one replay index and is
    /// only logged.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::TransportConnect(_) | Self::CorruptArtifact { .. } | Self::Config(_)
        )
    }

    /// Process exit code for a fatal error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            _ => 1,
        }
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Self::transport(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::transport_connect("refused").is_fatal());
        assert!(Error::corrupt_artifact("a.json", "eof").is_fatal());
        assert!(Error::config("missing HOST").is_fatal());

        assert!(!Error::malformed("not json").is_fatal());
        assert!(!Error::persistence("disk full").is_fatal());
        assert!(!Error::key_lookup("timeout").is_fatal());
        assert!(!Error::key_write("timeout").is_fatal());
        assert!(!Error::transport("broken pipe").is_fatal());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::config("bad").exit_code(), 2);
        assert_eq!(Error::transport_connect("refused").exit_code(), 1);
    }

    #[test]
    fn test_corrupt_artifact_message_names_path() {
        let err = Error::corrupt_artifact("data/bot-abc.json", "missing field `turn`");
        let msg = err.to_string();
        assert!(msg.contains("data/bot-abc.json"));
        assert!(msg.contains("missing field `turn`"));
    }
}
