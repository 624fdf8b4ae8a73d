//! Abstraction layers for external dependencies
//!
//! This module provides trait-based abstractions for the pub/sub transport
//! and the key-value store to enable testing without a Redis server.

pub mod key_store;
pub mod transport;

pub use key_store::{KeyStore, MockKeyStore, RedisKeyStore};
pub use transport::{
    InboundMessage, MessageStream, MockTransport, PublishedMessage, RedisTransport, Transport,
};
