//! Task queues
//!
//! At-least-once delivery with a visibility timeout: a received message is
//! hidden from other consumers until the timeout elapses and is removed only
//! when acknowledged with the receipt handle of its latest delivery.

mod memory;
mod sqs;

pub use memory::MemoryQueue;
pub use sqs::SqsQueue;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use shared::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to send message: {0}")]
    Send(String),

    #[error("failed to receive messages: {0}")]
    Receive(String),

    #[error("failed to acknowledge message: {0}")]
    Ack(String),

    #[error("receipt handle is no longer valid: {0}")]
    InvalidReceipt(String),

    #[error("failed to encode message body: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        AppError::queue(err.to_string())
    }
}

/// Message to publish
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub body: String,
    /// String message attributes
    pub attributes: HashMap<String, String>,
}

impl OutgoingMessage {
    /// JSON body plus string attributes
    pub fn json<T: Serialize>(
        payload: &T,
        attributes: Vec<(&'static str, String)>,
    ) -> Result<Self, QueueError> {
        Ok(Self {
            body: serde_json::to_string(payload)?,
            attributes: attributes
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        })
    }
}

/// One delivery of a message
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub message_id: String,
    /// Handle for this delivery, needed to acknowledge
    pub receipt_handle: String,
    pub body: String,
    pub attributes: HashMap<String, String>,
    /// 1 on first delivery
    pub receive_count: u32,
}

impl ReceivedMessage {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Publish a message, returning its id
    async fn send(&self, message: OutgoingMessage) -> Result<String, QueueError>;

    /// Long-poll for up to `max` messages, waiting at most `wait`
    async fn receive(&self, max: i32, wait: Duration) -> Result<Vec<ReceivedMessage>, QueueError>;

    /// Permanently remove a delivered message
    async fn ack(&self, receipt_handle: &str) -> Result<(), QueueError>;
}
