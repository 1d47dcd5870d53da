//! Queue payload schemas
//!
//! Both payloads travel as camelCase JSON bodies with string message
//! attributes alongside. Parsing validates at the boundary so downstream code
//! never sees a half-formed record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::error::{AppError, ErrorCode};

/// Attribute carrying the creation event type
pub const ATTR_EVENT_TYPE: &str = "eventType";
/// Attribute carrying the upstream payment event id
pub const ATTR_EVENT_ID: &str = "eventId";
/// Attribute carrying the order id on fulfillment tasks
pub const ATTR_ORDER_ID: &str = "orderId";
/// Attribute carrying the fulfillment task type
pub const ATTR_TASK_TYPE: &str = "taskType";

pub const EVENT_TYPE_ORDER_CREATED: &str = "order.created";
pub const TASK_TYPE_PACKAGING_AND_SHIPPING: &str = "packaging_and_shipping";

/// Malformed queue payload
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("invalid message body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected event type: {0}")]
    UnexpectedEventType(String),

    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),

    #[error("amount must not be negative: {0}")]
    NegativeAmount(i64),
}

impl From<MessageError> for AppError {
    fn from(err: MessageError) -> Self {
        let code = match err {
            MessageError::Json(_) => ErrorCode::InvalidFormat,
            MessageError::EmptyField(_) => ErrorCode::RequiredField,
            MessageError::NegativeAmount(_) => ErrorCode::ValueOutOfRange,
            MessageError::UnexpectedEventType(_) => ErrorCode::ValidationFailed,
        };
        AppError::with_message(code, err.to_string())
    }
}

/// CreationQueue payload, one per completed checkout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreationMessage {
    pub event_id: String,
    pub event_type: String,
    pub session_id: String,
    /// Absent on guest checkouts
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    /// Minor currency units
    pub amount_total: i64,
    pub currency: String,
    pub payment_status: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CreationMessage {
    /// Parse and validate a queue body
    pub fn parse(body: &str) -> Result<Self, MessageError> {
        let message: CreationMessage = serde_json::from_str(body)?;
        message.validate()?;
        Ok(message)
    }

    pub fn validate(&self) -> Result<(), MessageError> {
        if self.event_type != EVENT_TYPE_ORDER_CREATED {
            return Err(MessageError::UnexpectedEventType(self.event_type.clone()));
        }
        if self.event_id.is_empty() {
            return Err(MessageError::EmptyField("eventId"));
        }
        if self.session_id.is_empty() {
            return Err(MessageError::EmptyField("sessionId"));
        }
        if self.currency.is_empty() {
            return Err(MessageError::EmptyField("currency"));
        }
        if self.amount_total < 0 {
            return Err(MessageError::NegativeAmount(self.amount_total));
        }
        Ok(())
    }

    /// Message attributes sent alongside the body
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        vec![
            (ATTR_EVENT_TYPE, EVENT_TYPE_ORDER_CREATED.to_string()),
            (ATTR_EVENT_ID, self.event_id.clone()),
        ]
    }
}

/// FulfillmentQueue payload, derived from a persisted order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentTask {
    pub order_id: String,
    pub session_id: String,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub amount_total: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl FulfillmentTask {
    pub fn parse(body: &str) -> Result<Self, MessageError> {
        let task: FulfillmentTask = serde_json::from_str(body)?;
        if task.order_id.is_empty() {
            return Err(MessageError::EmptyField("orderId"));
        }
        Ok(task)
    }

    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        vec![
            (ATTR_ORDER_ID, self.order_id.clone()),
            (ATTR_TASK_TYPE, TASK_TYPE_PACKAGING_AND_SHIPPING.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creation_json() -> serde_json::Value {
        serde_json::json!({
            "eventId": "evt_1",
            "eventType": "order.created",
            "sessionId": "cs_test_1",
            "customerId": null,
            "customerEmail": "jane@example.com",
            "customerName": "Jane",
            "amountTotal": 1999,
            "currency": "eur",
            "paymentStatus": "paid",
            "timestamp": "2026-01-05T10:00:00Z",
            "metadata": {"requiresShipping": "true"}
        })
    }

    #[test]
    fn test_parse_creation_message() {
        let message = CreationMessage::parse(&creation_json().to_string()).unwrap();
        assert_eq!(message.session_id, "cs_test_1");
        assert_eq!(message.customer_id, None);
        assert_eq!(message.amount_total, 1999);
        assert_eq!(message.metadata.get("requiresShipping").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_missing_metadata_defaults_to_empty() {
        let mut json = creation_json();
        json.as_object_mut().unwrap().remove("metadata");
        let message = CreationMessage::parse(&json.to_string()).unwrap();
        assert!(message.metadata.is_empty());
    }

    #[test]
    fn test_rejects_wrong_event_type() {
        let mut json = creation_json();
        json["eventType"] = "order.updated".into();
        let err = CreationMessage::parse(&json.to_string()).unwrap_err();
        assert!(matches!(err, MessageError::UnexpectedEventType(t) if t == "order.updated"));
    }

    #[test]
    fn test_rejects_negative_amount_and_empty_currency() {
        let mut json = creation_json();
        json["amountTotal"] = (-1).into();
        assert!(matches!(
            CreationMessage::parse(&json.to_string()),
            Err(MessageError::NegativeAmount(-1))
        ));

        let mut json = creation_json();
        json["currency"] = "".into();
        assert!(matches!(
            CreationMessage::parse(&json.to_string()),
            Err(MessageError::EmptyField("currency"))
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        let err = CreationMessage::parse("not json").unwrap_err();
        assert!(matches!(err, MessageError::Json(_)));
        let app: AppError = err.into();
        assert_eq!(app.code, ErrorCode::InvalidFormat);
    }

    #[test]
    fn test_attributes() {
        let message = CreationMessage::parse(&creation_json().to_string()).unwrap();
        assert_eq!(
            message.attributes(),
            vec![
                ("eventType", "order.created".to_string()),
                ("eventId", "evt_1".to_string())
            ]
        );
    }

    #[test]
    fn test_fulfillment_task_requires_order_id() {
        let body = serde_json::json!({
            "orderId": "",
            "sessionId": "cs_1",
            "customerEmail": null,
            "customerName": null,
            "amountTotal": 10,
            "currency": "usd",
            "createdAt": "2026-01-05T10:00:00Z"
        });
        assert!(matches!(
            FulfillmentTask::parse(&body.to_string()),
            Err(MessageError::EmptyField("orderId"))
        ));
        assert!(FulfillmentTask::parse("{\"orderId\":\"ord_1\"}").is_err());
    }
}
