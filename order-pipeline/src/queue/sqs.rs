//! Amazon SQS task queue

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_sqs::Client as SqsClient;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::{MessageAttributeValue, MessageSystemAttributeName};
use tracing::debug;

use super::{OutgoingMessage, QueueError, ReceivedMessage, TaskQueue};

/// SQS caps a single receive at 10 messages and 20 seconds of long-poll
const MAX_BATCH: i32 = 10;
const MAX_WAIT_SECS: u64 = 20;

pub struct SqsQueue {
    client: SqsClient,
    queue_url: String,
}

impl SqsQueue {
    pub fn new(client: SqsClient, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

    pub fn from_sdk_config(config: &aws_config::SdkConfig, queue_url: impl Into<String>) -> Self {
        Self::new(SqsClient::new(config), queue_url)
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

#[async_trait]
impl TaskQueue for SqsQueue {
    async fn send(&self, message: OutgoingMessage) -> Result<String, QueueError> {
        let mut attrs = HashMap::with_capacity(message.attributes.len());
        for (name, value) in message.attributes {
            let attr = MessageAttributeValue::builder()
                .data_type("String")
                .string_value(value)
                .build()
                .map_err(|e| QueueError::Send(format!("attribute {name}: {e}")))?;
            attrs.insert(name, attr);
        }

        let output = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(message.body)
            .set_message_attributes(Some(attrs))
            .send()
            .await
            .map_err(|e| QueueError::Send(DisplayErrorContext(&e).to_string()))?;

        let message_id = output.message_id().unwrap_or_default().to_string();
        debug!(queue_url = %self.queue_url, message_id = %message_id, "Message sent");
        Ok(message_id)
    }

    async fn receive(&self, max: i32, wait: Duration) -> Result<Vec<ReceivedMessage>, QueueError> {
        let wait_secs = wait.as_secs().min(MAX_WAIT_SECS) as i32;
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max.clamp(1, MAX_BATCH))
            .wait_time_seconds(wait_secs)
            .message_attribute_names("All")
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .map_err(|e| QueueError::Receive(DisplayErrorContext(&e).to_string()))?;

        let mut received = Vec::new();
        for message in output.messages() {
            let Some(receipt_handle) = message.receipt_handle() else {
                continue;
            };
            let attributes = message
                .message_attributes()
                .map(|attrs| {
                    attrs
                        .iter()
                        .filter_map(|(k, v)| v.string_value().map(|s| (k.clone(), s.to_string())))
                        .collect()
                })
                .unwrap_or_default();
            let receive_count = message
                .attributes()
                .and_then(|a| a.get(&MessageSystemAttributeName::ApproximateReceiveCount))
                .and_then(|v| v.parse().ok())
                .unwrap_or(1);

            received.push(ReceivedMessage {
                message_id: message.message_id().unwrap_or_default().to_string(),
                receipt_handle: receipt_handle.to_string(),
                body: message.body().unwrap_or_default().to_string(),
                attributes,
                receive_count,
            });
        }
        Ok(received)
    }

    async fn ack(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| {
                let receipt_invalid = e
                    .as_service_error()
                    .is_some_and(|se| se.is_receipt_handle_is_invalid());
                if receipt_invalid {
                    QueueError::InvalidReceipt(receipt_handle.to_string())
                } else {
                    QueueError::Ack(DisplayErrorContext(&e).to_string())
                }
            })?;
        Ok(())
    }
}
