//! In-memory visibility-timeout queue
//!
//! Runs on tokio time, so tests with paused time can step through
//! visibility timeouts and long-poll waits instantly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use uuid::Uuid;

use super::{OutgoingMessage, QueueError, ReceivedMessage, TaskQueue};

pub struct MemoryQueue {
    name: String,
    visibility_timeout: Duration,
    messages: Mutex<Vec<Stored>>,
    arrivals: Notify,
    fail_sends: AtomicBool,
}

struct Stored {
    id: String,
    body: String,
    attributes: HashMap<String, String>,
    visible_at: Instant,
    receive_count: u32,
    receipt: Option<String>,
}

impl MemoryQueue {
    pub fn new(name: impl Into<String>, visibility_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            visibility_timeout,
            messages: Mutex::new(Vec::new()),
            arrivals: Notify::new(),
            fail_sends: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Make every `send` fail until switched back
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Messages not yet acknowledged, visible or not
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Messages currently hidden by a delivery
    pub fn in_flight(&self) -> usize {
        let now = Instant::now();
        self.messages
            .lock()
            .iter()
            .filter(|m| m.visible_at > now)
            .count()
    }

    /// Bodies of unacknowledged messages in send order
    pub fn bodies(&self) -> Vec<String> {
        self.messages.lock().iter().map(|m| m.body.clone()).collect()
    }

    /// Deliver up to `max` visible messages, longest visible first, so a
    /// redelivery waits behind messages that were already waiting.
    /// Otherwise report when the next hidden one becomes visible.
    fn take_visible(&self, max: usize) -> (Vec<ReceivedMessage>, Option<Instant>) {
        let now = Instant::now();
        let mut visible = Vec::new();
        let mut next_visible: Option<Instant> = None;

        let mut messages = self.messages.lock();
        for (index, stored) in messages.iter().enumerate() {
            if stored.visible_at > now {
                next_visible = Some(next_visible.map_or(stored.visible_at, |t| t.min(stored.visible_at)));
            } else {
                visible.push(index);
            }
        }
        visible.sort_by_key(|&index| messages[index].visible_at);

        let mut batch = Vec::new();
        for index in visible.into_iter().take(max) {
            let stored = &mut messages[index];
            let receipt = Uuid::new_v4().to_string();
            stored.receive_count += 1;
            stored.visible_at = now + self.visibility_timeout;
            stored.receipt = Some(receipt.clone());
            batch.push(ReceivedMessage {
                message_id: stored.id.clone(),
                receipt_handle: receipt,
                body: stored.body.clone(),
                attributes: stored.attributes.clone(),
                receive_count: stored.receive_count,
            });
        }
        (batch, next_visible)
    }
}

#[async_trait]
impl TaskQueue for MemoryQueue {
    async fn send(&self, message: OutgoingMessage) -> Result<String, QueueError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(QueueError::Send(format!("{}: injected outage", self.name)));
        }
        let id = Uuid::new_v4().to_string();
        self.messages.lock().push(Stored {
            id: id.clone(),
            body: message.body,
            attributes: message.attributes,
            visible_at: Instant::now(),
            receive_count: 0,
            receipt: None,
        });
        self.arrivals.notify_waiters();
        Ok(id)
    }

    async fn receive(&self, max: i32, wait: Duration) -> Result<Vec<ReceivedMessage>, QueueError> {
        let max = usize::try_from(max.max(1)).unwrap_or(1);
        let deadline = Instant::now() + wait;

        loop {
            // Register before checking so a send in between is not missed
            let notified = self.arrivals.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let (batch, next_visible) = self.take_visible(max);
            if !batch.is_empty() {
                return Ok(batch);
            }
            if Instant::now() >= deadline {
                return Ok(Vec::new());
            }

            let wake = next_visible.map_or(deadline, |t| t.min(deadline));
            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(wake) => {}
            }
        }
    }

    async fn ack(&self, receipt_handle: &str) -> Result<(), QueueError> {
        let mut messages = self.messages.lock();
        match messages
            .iter()
            .position(|m| m.receipt.as_deref() == Some(receipt_handle))
        {
            Some(index) => {
                messages.remove(index);
                Ok(())
            }
            None => Err(QueueError::InvalidReceipt(receipt_handle.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn message(body: &str) -> OutgoingMessage {
        OutgoingMessage {
            body: body.to_string(),
            attributes: HashMap::from([("taskType".to_string(), "test".to_string())]),
        }
    }

    const VT: Duration = Duration::from_secs(30);

    #[tokio::test(start_paused = true)]
    async fn test_received_message_is_hidden_until_timeout() {
        let queue = MemoryQueue::new("q", VT);
        queue.send(message("a")).await.unwrap();

        let first = queue.receive(1, Duration::ZERO).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].receive_count, 1);
        assert_eq!(first[0].attribute("taskType"), Some("test"));
        assert_eq!(queue.in_flight(), 1);

        // Hidden for the whole wait
        let none = queue.receive(1, Duration::from_secs(20)).await.unwrap();
        assert!(none.is_empty());

        // Visible again once the timeout expires, exactly one redelivery
        let again = queue.receive(10, Duration::from_secs(20)).await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].message_id, first[0].message_id);
        assert_eq!(again[0].receive_count, 2);
        assert_ne!(again[0].receipt_handle, first[0].receipt_handle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ack_removes_and_stale_receipt_is_rejected() {
        let queue = MemoryQueue::new("q", VT);
        queue.send(message("a")).await.unwrap();
        let first = queue.receive(1, Duration::ZERO).await.unwrap().remove(0);

        tokio::time::sleep(VT + Duration::from_secs(1)).await;
        let second = queue.receive(1, Duration::ZERO).await.unwrap().remove(0);

        assert!(matches!(
            queue.ack(&first.receipt_handle).await,
            Err(QueueError::InvalidReceipt(_))
        ));
        queue.ack(&second.receipt_handle).await.unwrap();
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_respects_max() {
        let queue = MemoryQueue::new("q", VT);
        for body in ["a", "b", "c"] {
            queue.send(message(body)).await.unwrap();
        }
        let batch = queue.receive(2, Duration::ZERO).await.unwrap();
        let bodies: Vec<_> = batch.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["a", "b"]);
        assert_eq!(queue.receive(10, Duration::ZERO).await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_redelivery_queues_behind_newer_messages() {
        let queue = MemoryQueue::new("q", VT);
        queue.send(message("stuck")).await.unwrap();
        let first = queue.receive(1, Duration::ZERO).await.unwrap();
        assert_eq!(first[0].body, "stuck");

        queue.send(message("fresh")).await.unwrap();
        tokio::time::advance(VT + Duration::from_secs(1)).await;

        // Both visible; the one never received goes first
        let next = queue.receive(1, Duration::ZERO).await.unwrap();
        assert_eq!(next[0].body, "fresh");
        let again = queue.receive(1, Duration::ZERO).await.unwrap();
        assert_eq!(again[0].body, "stuck");
        assert_eq!(again[0].receive_count, 2);
        assert_eq!(queue.bodies(), vec!["stuck", "fresh"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_poll_wakes_on_send() {
        let queue = Arc::new(MemoryQueue::new("q", VT));
        let receiver = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.receive(1, Duration::from_secs(20)).await })
        };
        tokio::time::sleep(Duration::from_secs(5)).await;
        queue.send(message("late")).await.unwrap();

        let batch = receiver.await.unwrap().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].body, "late");
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_long_poll_is_bounded() {
        let queue = MemoryQueue::new("q", VT);
        let started = Instant::now();
        let batch = queue.receive(1, Duration::from_secs(20)).await.unwrap();
        assert!(batch.is_empty());
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(20) && waited < Duration::from_secs(21));
    }

    #[tokio::test]
    async fn test_injected_send_failure() {
        let queue = MemoryQueue::new("q", VT);
        queue.set_fail_sends(true);
        assert!(matches!(
            queue.send(message("a")).await,
            Err(QueueError::Send(_))
        ));
        assert!(queue.is_empty());
    }
}
