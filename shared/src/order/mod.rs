//! Order domain: status machine, aggregate and queue payloads

mod aggregate;
pub mod message;
mod types;

pub use aggregate::{Order, RECEIVED_MESSAGE};
pub use message::{CreationMessage, FulfillmentTask, MessageError};
pub use types::{LogEntry, LogStatus, OrderStatus, StatusUpdate, TransitionError};
