//! Owner identity derivation
//!
//! Every channel and key scope is prefixed with the bot id, built from a
//! configured prefix and a short hash of the user id so that the raw user id
//! never appears on the transport.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Number of hash characters kept in the bot id
const HASH_LENGTH: usize = 7;

/// Short, transport-safe hash of a user id
pub fn hash_user_id(user_id: &str) -> String {
    let digest = Sha256::digest(user_id.as_bytes());
    let encoded = STANDARD.encode(digest);
    let word_chars: Vec<char> = encoded
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    let start = word_chars.len().saturating_sub(HASH_LENGTH);
    word_chars[start..].iter().collect()
}

/// Bot id in the form `{prefix}-{hash}`
pub fn bot_id(prefix: &str, user_id: &str) -> String {
    format!("{}-{}", prefix, hash_user_id(user_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable_and_short() {
        let first = hash_user_id("player-one");
        let second = hash_user_id("player-one");
        assert_eq!(first, second);
        assert_eq!(first.len(), HASH_LENGTH);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }

    #[test]
    fn test_different_users_hash_differently() {
        assert_ne!(hash_user_id("player-one"), hash_user_id("player-two"));
    }

    #[test]
    fn test_bot_id_format() {
        let id = bot_id("cortex", "player-one");
        assert!(id.starts_with("cortex-"));
        assert_eq!(id.len(), "cortex-".len() + HASH_LENGTH);
    }
}
