//! Order store
//!
//! Durable key-value record per order. Every mutation touches exactly one
//! record: `put` creates it, `update_status` sets the status, sets
//! `updatedAt` and appends one log entry in a single atomic step.

mod dynamo;
mod memory;

pub use dynamo::DynamoOrderStore;
pub use memory::MemoryOrderStore;

use async_trait::async_trait;
use shared::error::{AppError, ErrorCode};
use shared::order::{Order, OrderStatus, StatusUpdate, TransitionError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("order {0} not found")]
    NotFound(String),

    #[error("order {0} already exists")]
    AlreadyExists(String),

    #[error("order {order_id} is no longer {expected}")]
    Conflict {
        order_id: String,
        expected: OrderStatus,
    },

    #[error("order {order_id} cannot move from {from} to {to}")]
    InvalidTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt order record {order_id}: {reason}")]
    Corrupt { order_id: String, reason: String },
}

impl StoreError {
    pub(crate) fn from_transition(order_id: &str, err: TransitionError) -> Self {
        match err {
            TransitionError::Conflict { expected, .. } => StoreError::Conflict {
                order_id: order_id.to_string(),
                expected,
            },
            TransitionError::NotAllowed { from, to } => StoreError::InvalidTransition {
                order_id: order_id.to_string(),
                from,
                to,
            },
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let code = match err {
            StoreError::NotFound(_) => ErrorCode::OrderNotFound,
            StoreError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            StoreError::Conflict { .. } => ErrorCode::OrderStatusConflict,
            StoreError::InvalidTransition { .. } => ErrorCode::InvalidStatusTransition,
            StoreError::Unavailable(_) | StoreError::Corrupt { .. } => ErrorCode::DatabaseError,
        };
        AppError::with_message(code, err.to_string())
    }
}

/// Order persistence
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get(&self, order_id: &str) -> Result<Option<Order>, StoreError>;

    /// Create the record; fails with `AlreadyExists` if the id is taken
    async fn put(&self, order: &Order) -> Result<(), StoreError>;

    /// Atomically apply one status update to an existing order
    async fn update_status(&self, order_id: &str, update: &StatusUpdate)
    -> Result<(), StoreError>;
}
