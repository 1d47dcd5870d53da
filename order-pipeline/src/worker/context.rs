//! Worker context shared between the poll loop and the signal handler

use std::sync::Arc;

use parking_lot::Mutex;
use shared::order::{FulfillmentTask, OrderStatus};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Activity progress of the in-flight order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub order_id: String,
    pub stage: OrderStatus,
    pub step: u32,
    pub total_steps: u32,
    pub percent: u8,
}

impl Progress {
    pub fn new(order_id: &str, stage: OrderStatus, step: u32, total_steps: u32) -> Self {
        let total = total_steps.max(1);
        let percent = (u64::from(step.min(total)) * 100 / u64::from(total)) as u8;
        Self {
            order_id: order_id.to_string(),
            stage,
            step,
            total_steps: total,
            percent,
        }
    }
}

#[derive(Clone)]
pub struct WorkerContext {
    shutdown: CancellationToken,
    current: Arc<Mutex<Option<FulfillmentTask>>>,
    progress: Arc<watch::Sender<Option<Progress>>>,
}

impl WorkerContext {
    pub fn new() -> Self {
        let (progress, _) = watch::channel(None);
        Self {
            shutdown: CancellationToken::new(),
            current: Arc::new(Mutex::new(None)),
            progress: Arc::new(progress),
        }
    }

    /// Stop at the next stage boundary
    pub fn request_shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub(crate) fn begin(&self, task: FulfillmentTask) {
        *self.current.lock() = Some(task);
    }

    pub(crate) fn finish(&self) -> Option<FulfillmentTask> {
        self.current.lock().take()
    }

    /// In-flight task, if any
    pub fn current(&self) -> Option<FulfillmentTask> {
        self.current.lock().clone()
    }

    pub(crate) fn report(&self, progress: Progress) {
        self.progress.send_replace(Some(progress));
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Progress>> {
        self.progress.subscribe()
    }
}

impl Default for WorkerContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percent() {
        assert_eq!(Progress::new("o", OrderStatus::Packaging, 3, 6).percent, 50);
        assert_eq!(Progress::new("o", OrderStatus::Shipping, 20, 20).percent, 100);
        assert_eq!(Progress::new("o", OrderStatus::Shipping, 1, 0).total_steps, 1);
    }

    #[test]
    fn test_clones_share_state() {
        let ctx = WorkerContext::new();
        let handler = ctx.clone();
        let mut rx = ctx.subscribe();

        ctx.report(Progress::new("ord_1", OrderStatus::Packaging, 1, 6));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_ref().map(|p| p.step), Some(1));

        assert!(!ctx.is_shutting_down());
        handler.request_shutdown();
        assert!(ctx.is_shutting_down());
        assert!(ctx.shutdown_token().is_cancelled());
    }
}
