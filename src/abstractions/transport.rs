//! Publish/subscribe transport abstraction
//!
//! Provides a trait over the pub/sub client so the recorder and the replay
//! engine can run against Redis in production and an in-memory mock in tests.

use crate::config::RedisSettings;
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

/// A message delivered by a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Full transport channel name
    pub channel: String,
    /// Raw payload text
    pub payload: String,
}

impl InboundMessage {
    pub fn new(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }
}

/// Stream of messages from every subscribed channel, in delivery order
pub type MessageStream = BoxStream<'static, InboundMessage>;

/// Trait for pub/sub transport operations
#[async_trait]
pub trait Transport: Send + Sync {
    /// Subscribe to the given channels and return a single merged stream
    async fn subscribe(&self, channels: &[String]) -> Result<MessageStream>;

    /// Publish a payload to a channel
    async fn publish(&self, channel: &str, payload: &str) -> Result<()>;

    /// Close the connection
    async fn quit(&self) -> Result<()>;
}

/// Redis implementation of [`Transport`]
pub struct RedisTransport {
    client: redis::Client,
    connection: ConnectionManager,
}

impl RedisTransport {
    /// Connect to Redis. Failure here is fatal for both commands.
    pub async fn connect(settings: &RedisSettings) -> Result<Self> {
        info!("Connecting to Redis at {}", settings.redacted_url());

        let client = redis::Client::open(settings.url()).map_err(Error::transport_connect)?;
        let connection = ConnectionManager::new(client.clone())
            .await
            .map_err(Error::transport_connect)?;

        debug!("Redis connection established");
        Ok(Self { client, connection })
    }

    /// Shared multiplexed connection, also used by the key store
    pub fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

#[async_trait]
impl Transport for RedisTransport {
    async fn subscribe(&self, channels: &[String]) -> Result<MessageStream> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        for channel in channels {
            pubsub.subscribe(channel).await?;
            debug!("Subscribed to {}", channel);
        }

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let channel = msg.get_channel_name().to_string();
            match msg.get_payload::<String>() {
                Ok(payload) => Some(InboundMessage { channel, payload }),
                Err(e) => {
                    warn!("Dropping undecodable payload on {}: {}", channel, e);
                    None
                }
            }
        });

        Ok(stream.boxed())
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        let _receivers: i64 = conn.publish(channel, payload).await?;
        Ok(())
    }

    async fn quit(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: () = redis::cmd("QUIT").query_async(&mut conn).await?;
        info!("Redis connection closed");
        Ok(())
    }
}

/// A publish captured by [`MockTransport`]
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub channel: String,
    pub payload: String,
    pub at: Instant,
}

/// Mock implementation of [`Transport`] for testing
pub struct MockTransport {
    /// Every successful publish, in issue order
    pub published: Arc<Mutex<Vec<PublishedMessage>>>,
    /// Channels on which publishing fails
    pub failing_channels: Arc<Mutex<HashSet<String>>>,
    /// Channels passed to `subscribe`
    pub subscriptions: Arc<Mutex<Vec<String>>>,
    sender: std::sync::Mutex<Option<mpsc::UnboundedSender<InboundMessage>>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<InboundMessage>>>,
    quit_calls: Arc<Mutex<usize>>,
}

impl MockTransport {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            published: Arc::new(Mutex::new(Vec::new())),
            failing_channels: Arc::new(Mutex::new(HashSet::new())),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            sender: std::sync::Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
            quit_calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Queue an inbound message for the subscription stream
    pub fn push_inbound(&self, channel: &str, payload: &str) {
        let guard = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(sender) = guard.as_ref() {
            let _ = sender.send(InboundMessage::new(channel, payload));
        }
    }

    /// End the subscription stream once queued messages are drained
    pub fn close_inbound(&self) {
        self.sender.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    /// Make publishes to `channel` fail
    pub async fn fail_channel(&self, channel: &str) {
        self.failing_channels.lock().await.insert(channel.to_string());
    }

    /// Published messages, in issue order
    pub async fn get_published(&self) -> Vec<PublishedMessage> {
        self.published.lock().await.clone()
    }

    /// Payloads published to one channel, in issue order
    pub async fn published_on(&self, channel: &str) -> Vec<String> {
        self.published
            .lock()
            .await
            .iter()
            .filter(|m| m.channel == channel)
            .map(|m| m.payload.clone())
            .collect()
    }

    pub async fn quit_count(&self) -> usize {
        *self.quit_calls.lock().await
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn subscribe(&self, channels: &[String]) -> Result<MessageStream> {
        let receiver = self
            .receiver
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::transport("mock transport supports a single subscription"))?;
        self.subscriptions
            .lock()
            .await
            .extend(channels.iter().cloned());

        let wanted: HashSet<String> = channels.iter().cloned().collect();
        let stream = UnboundedReceiverStream::new(receiver)
            .filter(move |msg| futures::future::ready(wanted.contains(&msg.channel)));
        Ok(stream.boxed())
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<()> {
        if self.failing_channels.lock().await.contains(channel) {
            return Err(Error::transport(format!("publish to {channel} refused")));
        }
        self.published.lock().await.push(PublishedMessage {
            channel: channel.to_string(),
            payload: payload.to_string(),
            at: Instant::now(),
        });
        Ok(())
    }

    async fn quit(&self) -> Result<()> {
        *self.quit_calls.lock().await += 1;
        Ok(())
    }
}
