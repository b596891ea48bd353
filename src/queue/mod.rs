//! Named message queues.
//!
//! Producers publish raw bytes (JSON in practice) to a queue by name and a
//! single consumer per queue drains it. The in-process implementation uses
//! unbounded tokio channels, so publishing never waits for the consumer.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::{
    Mutex,
    mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
};

/// Outbound email tasks ([`crate::api::email::EmailTask`]).
pub const SEND_EMAIL_QUEUE: &str = "send_email_queue";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue {0} is closed")]
    Closed(String),
    #[error("queue {0} already has a consumer")]
    AlreadyConsumed(String),
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Append a message to `queue`.
    async fn publish(&self, queue: &str, message: Vec<u8>) -> Result<(), QueueError>;

    /// Take the receiving end of `queue`. Only one consumer per queue.
    async fn consume(&self, queue: &str) -> Result<UnboundedReceiver<Vec<u8>>, QueueError>;
}

struct Channel {
    sender: UnboundedSender<Vec<u8>>,
    receiver: Option<UnboundedReceiver<Vec<u8>>>,
}

impl Channel {
    fn new() -> Self {
        let (sender, receiver) = unbounded_channel();
        Self {
            sender,
            receiver: Some(receiver),
        }
    }
}

#[derive(Default)]
pub struct MemoryQueue {
    channels: Mutex<HashMap<String, Channel>>,
}

impl MemoryQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for MemoryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryQueue").finish_non_exhaustive()
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn publish(&self, queue: &str, message: Vec<u8>) -> Result<(), QueueError> {
        let mut channels = self.channels.lock().await;
        let channel = channels
            .entry(queue.to_string())
            .or_insert_with(Channel::new);
        channel
            .sender
            .send(message)
            .map_err(|_| QueueError::Closed(queue.to_string()))
    }

    async fn consume(&self, queue: &str) -> Result<UnboundedReceiver<Vec<u8>>, QueueError> {
        let mut channels = self.channels.lock().await;
        let channel = channels
            .entry(queue.to_string())
            .or_insert_with(Channel::new);
        channel
            .receiver
            .take()
            .ok_or_else(|| QueueError::AlreadyConsumed(queue.to_string()))
    }
}
