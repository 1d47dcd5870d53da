//! Order status machine and audit log entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::error::{AppError, ErrorCode};

// ============================================================================
// Order Status
// ============================================================================

/// Order status
///
/// Declaration order is the lifecycle order, so `Ord` compares progress.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Persisted by the creator, not yet routed
    #[default]
    Pending,
    /// Fulfillment task published, waiting for a worker
    QueuedForProcessing,
    Processing,
    Packaging,
    Shipping,
    /// Terminal
    Completed,
}

impl OrderStatus {
    /// Stages a worker drives an order through, in order
    pub const FULFILLMENT_STAGES: [OrderStatus; 4] = [
        OrderStatus::Processing,
        OrderStatus::Packaging,
        OrderStatus::Shipping,
        OrderStatus::Completed,
    ];

    /// Wire name (`queued_for_processing`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::QueuedForProcessing => "queued_for_processing",
            OrderStatus::Processing => "processing",
            OrderStatus::Packaging => "packaging",
            OrderStatus::Shipping => "shipping",
            OrderStatus::Completed => "completed",
        }
    }

    /// Parse a wire name
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(OrderStatus::Pending),
            "queued_for_processing" => Some(OrderStatus::QueuedForProcessing),
            "processing" => Some(OrderStatus::Processing),
            "packaging" => Some(OrderStatus::Packaging),
            "shipping" => Some(OrderStatus::Shipping),
            "completed" => Some(OrderStatus::Completed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed)
    }

    /// Immediate successor on the fulfillment route
    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::QueuedForProcessing),
            OrderStatus::QueuedForProcessing => Some(OrderStatus::Processing),
            OrderStatus::Processing => Some(OrderStatus::Packaging),
            OrderStatus::Packaging => Some(OrderStatus::Shipping),
            OrderStatus::Shipping => Some(OrderStatus::Completed),
            OrderStatus::Completed => None,
        }
    }

    /// Forward-only, no skipping. `Pending -> Completed` is the direct
    /// route for orders that need no fulfillment.
    pub fn can_advance_to(&self, to: OrderStatus) -> bool {
        self.next() == Some(to) || (*self == OrderStatus::Pending && to == OrderStatus::Completed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Log Entries
// ============================================================================

/// Status recorded in a log entry
///
/// Mirrors [`OrderStatus`] except that the creation entry reads `received`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Received,
    QueuedForProcessing,
    Processing,
    Packaging,
    Shipping,
    Completed,
}

impl From<OrderStatus> for LogStatus {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Pending => LogStatus::Received,
            OrderStatus::QueuedForProcessing => LogStatus::QueuedForProcessing,
            OrderStatus::Processing => LogStatus::Processing,
            OrderStatus::Packaging => LogStatus::Packaging,
            OrderStatus::Shipping => LogStatus::Shipping,
            OrderStatus::Completed => LogStatus::Completed,
        }
    }
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Received => "received",
            LogStatus::QueuedForProcessing => "queued_for_processing",
            LogStatus::Processing => "processing",
            LogStatus::Packaging => "packaging",
            LogStatus::Shipping => "shipping",
            LogStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "received" => Some(LogStatus::Received),
            "queued_for_processing" => Some(LogStatus::QueuedForProcessing),
            "processing" => Some(LogStatus::Processing),
            "packaging" => Some(LogStatus::Packaging),
            "shipping" => Some(LogStatus::Shipping),
            "completed" => Some(LogStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable line of the order's audit log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub status: LogStatus,
    pub message: String,
}

// ============================================================================
// Status Updates
// ============================================================================

/// A single atomic store mutation: set status, set `updatedAt`, append one
/// log entry.
///
/// With `expected` set the update is conditional: it only applies while the
/// persisted status equals `expected` and the transition is allowed.
/// Without it the update is applied unconditionally.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub expected: Option<OrderStatus>,
}

impl StatusUpdate {
    pub fn new(status: OrderStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            timestamp: crate::util::now(),
            expected: None,
        }
    }

    /// Make the update conditional on the current persisted status
    pub fn expecting(mut self, current: OrderStatus) -> Self {
        self.expected = Some(current);
        self
    }

    pub fn log_entry(&self) -> LogEntry {
        LogEntry {
            timestamp: self.timestamp,
            status: self.status.into(),
            message: self.message.clone(),
        }
    }
}

/// Rejected status update
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("order status is {actual}, expected {expected}")]
    Conflict {
        expected: OrderStatus,
        actual: OrderStatus,
    },
    #[error("cannot move order from {from} to {to}")]
    NotAllowed { from: OrderStatus, to: OrderStatus },
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        let code = match err {
            TransitionError::Conflict { .. } => ErrorCode::OrderStatusConflict,
            TransitionError::NotAllowed { .. } => ErrorCode::InvalidStatusTransition,
        };
        AppError::with_message(code, err.to_string())
    }
}
