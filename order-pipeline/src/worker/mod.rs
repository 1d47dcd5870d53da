//! Fulfillment worker
//!
//! Polls the FulfillmentQueue one task at a time and drives the order
//! through `processing -> packaging -> shipping -> completed`. The message is
//! acknowledged only once `completed` is persisted; anything earlier leaves
//! it for redelivery after the visibility timeout.
//!
//! Shutdown is honoured between iterations and between stages, never inside
//! a stage's activity.

mod context;
mod pacer;
pub mod stages;

pub use context::{Progress, WorkerContext};
pub use pacer::StagePacer;
pub use stages::{Activity, Stage, StagePlan, StageTimings};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use shared::error::AppError;
use shared::order::{FulfillmentTask, MessageError, OrderStatus, StatusUpdate};
use thiserror::Error;

use crate::config::Config;
use crate::creator::QUEUED_MESSAGE;
use crate::queue::{QueueError, TaskQueue};
use crate::store::{OrderStore, StoreError};

/// How a redelivered task is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedeliveryMode {
    /// Continue from the persisted status with conditional updates
    #[default]
    Resume,
    /// Re-run every stage with unconditional appends
    Replay,
}

impl RedeliveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedeliveryMode::Resume => "resume",
            RedeliveryMode::Replay => "replay",
        }
    }
}

impl FromStr for RedeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "resume" => Ok(RedeliveryMode::Resume),
            "replay" => Ok(RedeliveryMode::Replay),
            other => Err(format!("unknown redelivery mode '{other}' (expected resume or replay)")),
        }
    }
}

impl fmt::Display for RedeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Malformed(#[from] MessageError),

    #[error("order {0} not found")]
    OrderNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl From<WorkerError> for AppError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::Malformed(e) => e.into(),
            WorkerError::OrderNotFound(id) => AppError::not_found(format!("Order {id}")),
            WorkerError::Store(e) => e.into(),
            WorkerError::Queue(e) => e.into(),
        }
    }
}

/// Result of one loop iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing to do
    Idle,
    /// Order driven to `completed` and acknowledged
    Completed { order_id: String },
    /// Redelivery of an order that had already completed, acknowledged
    AlreadyCompleted { order_id: String },
    /// Shutdown at a stage boundary, left unacknowledged
    Abandoned { order_id: String, at: OrderStatus },
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub mode: RedeliveryMode,
    pub timings: StageTimings,
    pub receive_wait: Duration,
    pub poll_interval: Duration,
    pub error_backoff: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            mode: RedeliveryMode::default(),
            timings: StageTimings::default(),
            receive_wait: Duration::from_secs(20),
            poll_interval: Duration::from_secs(1),
            error_backoff: Duration::from_secs(10),
        }
    }
}

impl WorkerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mode: config.redelivery_mode,
            timings: config.stage_timings.clone(),
            receive_wait: config.receive_wait,
            poll_interval: config.poll_interval,
            error_backoff: config.error_backoff,
        }
    }
}

pub struct FulfillmentWorker {
    queue: Arc<dyn TaskQueue>,
    store: Arc<dyn OrderStore>,
    ctx: WorkerContext,
    plan: StagePlan,
    pacer: StagePacer,
    settings: WorkerSettings,
}

impl FulfillmentWorker {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        store: Arc<dyn OrderStore>,
        ctx: WorkerContext,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            queue,
            store,
            plan: StagePlan::from_timings(&settings.timings),
            pacer: StagePacer::new(ctx.shutdown_token()),
            ctx,
            settings,
        }
    }

    pub fn context(&self) -> &WorkerContext {
        &self.ctx
    }

    /// Poll until shutdown is requested
    pub async fn run(self) {
        tracing::info!(
            mode = %self.settings.mode,
            poll_interval_ms = self.settings.poll_interval.as_millis() as u64,
            "Fulfillment worker started"
        );

        while !self.ctx.is_shutting_down() {
            let pause = match self.poll_once().await {
                Ok(PollOutcome::Abandoned { order_id, at }) => {
                    tracing::warn!(order_id = %order_id, status = %at, "Task abandoned at shutdown");
                    break;
                }
                Ok(_) => self.settings.poll_interval,
                Err(e) => {
                    tracing::error!(error = %e, "Error processing task");
                    self.settings.error_backoff
                }
            };
            if !self.pacer.idle(pause).await {
                break;
            }
        }

        tracing::info!("Fulfillment worker stopped");
    }

    /// Receive at most one task and drive it as far as it goes
    pub async fn poll_once(&self) -> Result<PollOutcome, WorkerError> {
        let token = self.ctx.shutdown_token();
        let mut messages = tokio::select! {
            _ = token.cancelled() => return Ok(PollOutcome::Idle),
            received = self.queue.receive(1, self.settings.receive_wait) => received?,
        };
        let Some(message) = messages.pop() else {
            return Ok(PollOutcome::Idle);
        };

        let task = FulfillmentTask::parse(&message.body)?;
        if message.receive_count > 1 {
            tracing::warn!(
                order_id = %task.order_id,
                receive_count = message.receive_count,
                "Redelivered fulfillment task"
            );
        }
        tracing::info!(order_id = %task.order_id, mode = %self.settings.mode, "Processing order");

        self.ctx.begin(task.clone());
        let result = self.fulfill(&task).await;
        self.ctx.finish();

        let outcome = result?;
        if matches!(
            outcome,
            PollOutcome::Completed { .. } | PollOutcome::AlreadyCompleted { .. }
        ) {
            self.queue.ack(&message.receipt_handle).await?;
        }
        Ok(outcome)
    }

    async fn fulfill(&self, task: &FulfillmentTask) -> Result<PollOutcome, WorkerError> {
        match self.settings.mode {
            RedeliveryMode::Replay => self.run_stages(task, self.plan.stages(), None).await,
            RedeliveryMode::Resume => {
                let order = self
                    .store
                    .get(&task.order_id)
                    .await?
                    .ok_or_else(|| WorkerError::OrderNotFound(task.order_id.clone()))?;

                match order.order_status {
                    OrderStatus::Pending => {
                        // Published but never marked queued by the creator
                        let update = StatusUpdate::new(OrderStatus::QueuedForProcessing, QUEUED_MESSAGE)
                            .expecting(OrderStatus::Pending);
                        self.store.update_status(&task.order_id, &update).await?;
                        tracing::warn!(order_id = %task.order_id, "Recovered order left pending");

                        let queued = OrderStatus::QueuedForProcessing;
                        self.run_stages(task, self.plan.stages_after(queued), Some(queued))
                            .await
                    }
                    OrderStatus::Completed => {
                        tracing::info!(order_id = %task.order_id, "Order already completed");
                        Ok(PollOutcome::AlreadyCompleted {
                            order_id: task.order_id.clone(),
                        })
                    }
                    current => {
                        if let Some(stage) = self.plan.stage(current) {
                            if self.ctx.is_shutting_down() {
                                return Ok(abandoned(task, current));
                            }
                            tracing::info!(order_id = %task.order_id, status = %current, "Resuming stage");
                            self.run_activity(task, stage).await;
                        }
                        self.run_stages(task, self.plan.stages_after(current), Some(current))
                            .await
                    }
                }
            }
        }
    }

    /// Persist and run each stage. With `previous` set every update is
    /// conditional on the status before it.
    async fn run_stages(
        &self,
        task: &FulfillmentTask,
        stages: &[Stage],
        mut previous: Option<OrderStatus>,
    ) -> Result<PollOutcome, WorkerError> {
        let mut reached = previous.unwrap_or(OrderStatus::QueuedForProcessing);
        for stage in stages {
            if self.ctx.is_shutting_down() {
                return Ok(abandoned(task, reached));
            }

            let mut update = StatusUpdate::new(stage.status, stage.message);
            if let Some(expected) = previous {
                update = update.expecting(expected);
            }
            self.store.update_status(&task.order_id, &update).await?;
            tracing::info!(order_id = %task.order_id, status = %stage.status, "Order status updated");

            reached = stage.status;
            self.run_activity(task, stage).await;
            if previous.is_some() {
                previous = Some(stage.status);
            }
        }

        tracing::info!(order_id = %task.order_id, "Order completed successfully");
        Ok(PollOutcome::Completed {
            order_id: task.order_id.clone(),
        })
    }

    async fn run_activity(&self, task: &FulfillmentTask, stage: &Stage) {
        let status = stage.status;
        self.pacer
            .run_activity(&stage.activity, |step, total| {
                let progress = Progress::new(&task.order_id, status, step, total);
                tracing::info!(
                    order_id = %task.order_id,
                    status = %status,
                    percent = progress.percent,
                    "{} progress: {}/{}",
                    status,
                    step,
                    total
                );
                self.ctx.report(progress);
            })
            .await;
    }
}

fn abandoned(task: &FulfillmentTask, at: OrderStatus) -> PollOutcome {
    PollOutcome::Abandoned {
        order_id: task.order_id.clone(),
        at,
    }
}
