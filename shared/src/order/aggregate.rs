//! Order aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::message::{CreationMessage, FulfillmentTask};
use super::types::{LogEntry, LogStatus, OrderStatus, StatusUpdate, TransitionError};
use crate::util::monotonic_after;

/// Creation log message
pub const RECEIVED_MESSAGE: &str = "Order received from payment webhook";

/// The authoritative order record with its full audit log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Assigned once at creation
    pub order_id: String,
    pub event_id: String,
    pub session_id: String,
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub amount_total: i64,
    pub currency: String,
    pub payment_status: String,
    pub order_status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Append-only, strictly increasing timestamps
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

impl Order {
    /// Materialize a `pending` order with its `received` log entry
    pub fn from_creation(order_id: String, message: &CreationMessage, now: DateTime<Utc>) -> Self {
        Self {
            order_id,
            event_id: message.event_id.clone(),
            session_id: message.session_id.clone(),
            customer_id: message.customer_id.clone(),
            customer_email: message.customer_email.clone(),
            customer_name: message.customer_name.clone(),
            amount_total: message.amount_total,
            currency: message.currency.clone(),
            payment_status: message.payment_status.clone(),
            order_status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            metadata: message.metadata.clone(),
            logs: vec![LogEntry {
                timestamp: now,
                status: LogStatus::Received,
                message: RECEIVED_MESSAGE.to_string(),
            }],
        }
    }

    /// Apply a status update in place.
    ///
    /// Conditional updates check the expected status and the transition
    /// table. Unconditional updates only append. Either way exactly one log
    /// entry is appended, with its timestamp bumped past the previous entry
    /// when the clock did not move.
    pub fn apply(&mut self, update: &StatusUpdate) -> Result<&LogEntry, TransitionError> {
        if let Some(expected) = update.expected {
            if self.order_status != expected {
                return Err(TransitionError::Conflict {
                    expected,
                    actual: self.order_status,
                });
            }
            if !self.order_status.can_advance_to(update.status) {
                return Err(TransitionError::NotAllowed {
                    from: self.order_status,
                    to: update.status,
                });
            }
        }

        let timestamp = monotonic_after(self.logs.last().map(|l| l.timestamp), update.timestamp);
        self.order_status = update.status;
        self.updated_at = timestamp;
        self.logs.push(LogEntry {
            timestamp,
            status: update.status.into(),
            message: update.message.clone(),
        });
        Ok(&self.logs[self.logs.len() - 1])
    }

    /// Task published to the fulfillment queue for this order
    pub fn fulfillment_task(&self) -> FulfillmentTask {
        FulfillmentTask {
            order_id: self.order_id.clone(),
            session_id: self.session_id.clone(),
            customer_email: self.customer_email.clone(),
            customer_name: self.customer_name.clone(),
            amount_total: self.amount_total,
            currency: self.currency.clone(),
            created_at: self.created_at,
        }
    }

    pub fn log_statuses(&self) -> Vec<LogStatus> {
        self.logs.iter().map(|l| l.status).collect()
    }

    /// True when every log timestamp is strictly after its predecessor
    pub fn logs_are_chronological(&self) -> bool {
        self.logs.windows(2).all(|w| w[0].timestamp < w[1].timestamp)
    }
}
