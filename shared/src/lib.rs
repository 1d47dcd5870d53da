//! Shared types for the order pipeline
//!
//! Types used by every pipeline component: the order aggregate and its
//! status machine, queue payload schemas, error codes, and small time/id
//! utilities.

pub mod error;
pub mod order;
pub mod util;

// Re-exports
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{AppError, AppResult, ErrorCode};
pub use order::{
    CreationMessage, FulfillmentTask, LogEntry, LogStatus, Order, OrderStatus, StatusUpdate,
};
