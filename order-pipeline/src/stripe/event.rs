//! Typed Stripe event payloads
//!
//! Only the fields the pipeline reads are modelled; everything else in the
//! event is ignored.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use shared::error::{AppError, ErrorCode};
use shared::order::CreationMessage;
use shared::order::message::EVENT_TYPE_ORDER_CREATED;
use thiserror::Error;

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const PAYMENT_INTENT_FAILED: &str = "payment_intent.payment_failed";

#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("malformed event envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("malformed {event_type} object: {source}")]
    Object {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<EventParseError> for AppError {
    fn from(err: EventParseError) -> Self {
        AppError::with_message(ErrorCode::PaymentEventMalformed, err.to_string())
    }
}

/// Event envelope: `{id, type, created, data: {object}}`
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: Option<i64>,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: Value,
}

/// Event classified by type, with its object parsed
#[derive(Debug, Clone)]
pub enum EventKind {
    CheckoutCompleted(CheckoutSession),
    PaymentSucceeded(PaymentIntent),
    PaymentFailed(PaymentIntent),
    Unhandled,
}

impl WebhookEvent {
    pub fn parse(body: &[u8]) -> Result<Self, EventParseError> {
        serde_json::from_slice(body).map_err(EventParseError::Envelope)
    }

    pub fn kind(&self) -> Result<EventKind, EventParseError> {
        Ok(match self.event_type.as_str() {
            CHECKOUT_SESSION_COMPLETED => EventKind::CheckoutCompleted(self.object()?),
            PAYMENT_INTENT_SUCCEEDED => EventKind::PaymentSucceeded(self.object()?),
            PAYMENT_INTENT_FAILED => EventKind::PaymentFailed(self.object()?),
            _ => EventKind::Unhandled,
        })
    }

    fn object<T: serde::de::DeserializeOwned>(&self) -> Result<T, EventParseError> {
        T::deserialize(&self.data.object).map_err(|source| EventParseError::Object {
            event_type: self.event_type.clone(),
            source,
        })
    }

    /// `data.object.id`, for audit records
    pub fn object_id(&self) -> Option<&str> {
        self.data.object.get("id").and_then(Value::as_str)
    }

    /// `amount_total` for sessions, `amount` for intents
    pub fn amount(&self) -> Option<i64> {
        let object = &self.data.object;
        object
            .get("amount_total")
            .and_then(Value::as_i64)
            .or_else(|| object.get("amount").and_then(Value::as_i64))
    }

    pub fn currency(&self) -> Option<&str> {
        self.data.object.get("currency").and_then(Value::as_str)
    }
}

/// `checkout.session` object
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CheckoutSession {
    pub id: String,
    /// Customer id, absent for guest checkouts
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    pub amount_total: i64,
    pub currency: String,
    pub payment_status: String,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl CheckoutSession {
    /// CreationQueue message, one field per session field
    pub fn to_creation_message(&self, event_id: &str, timestamp: DateTime<Utc>) -> CreationMessage {
        let details = self.customer_details.as_ref();
        CreationMessage {
            event_id: event_id.to_string(),
            event_type: EVENT_TYPE_ORDER_CREATED.to_string(),
            session_id: self.id.clone(),
            customer_id: self.customer.clone(),
            customer_email: details.and_then(|d| d.email.clone()),
            customer_name: details.and_then(|d| d.name.clone()),
            amount_total: self.amount_total,
            currency: self.currency.clone(),
            payment_status: self.payment_status.clone(),
            timestamp,
            metadata: self.metadata.clone().unwrap_or_default(),
        }
    }
}

/// `payment_intent` object
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PaymentIntent {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub last_payment_error: Option<PaymentError>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PaymentError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn checkout_event(object: Value) -> Vec<u8> {
        json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "created": 1_767_600_000,
            "data": {"object": object}
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_checkout_session_maps_to_creation_message() {
        let body = checkout_event(json!({
            "id": "cs_test_1",
            "object": "checkout.session",
            "customer": "cus_9",
            "customer_details": {"email": "jane@example.com", "name": "Jane Roe"},
            "amount_total": 1999,
            "currency": "eur",
            "payment_status": "paid",
            "metadata": {"requiresShipping": "true"}
        }));
        let event = WebhookEvent::parse(&body).unwrap();
        let EventKind::CheckoutCompleted(session) = event.kind().unwrap() else {
            panic!("expected checkout");
        };

        let now = Utc::now();
        let message = session.to_creation_message(&event.id, now);
        assert_eq!(message.event_id, "evt_1");
        assert_eq!(message.event_type, "order.created");
        assert_eq!(message.session_id, "cs_test_1");
        assert_eq!(message.customer_id.as_deref(), Some("cus_9"));
        assert_eq!(message.customer_email.as_deref(), Some("jane@example.com"));
        assert_eq!(message.customer_name.as_deref(), Some("Jane Roe"));
        assert_eq!(message.amount_total, 1999);
        assert_eq!(message.currency, "eur");
        assert_eq!(message.payment_status, "paid");
        assert_eq!(message.timestamp, now);
        assert_eq!(message.metadata.get("requiresShipping").map(String::as_str), Some("true"));

        assert_eq!(event.object_id(), Some("cs_test_1"));
        assert_eq!(event.amount(), Some(1999));
        assert_eq!(event.currency(), Some("eur"));
    }

    #[test]
    fn test_guest_checkout_with_null_fields() {
        let body = checkout_event(json!({
            "id": "cs_guest",
            "customer": null,
            "customer_details": null,
            "amount_total": 0,
            "currency": "usd",
            "payment_status": "no_payment_required",
            "metadata": null
        }));
        let event = WebhookEvent::parse(&body).unwrap();
        let EventKind::CheckoutCompleted(session) = event.kind().unwrap() else {
            panic!("expected checkout");
        };
        let message = session.to_creation_message(&event.id, Utc::now());
        assert_eq!(message.customer_id, None);
        assert_eq!(message.customer_email, None);
        assert!(message.metadata.is_empty());
    }

    #[test]
    fn test_session_missing_required_field() {
        let body = checkout_event(json!({"id": "cs_1", "currency": "eur", "payment_status": "paid"}));
        let event = WebhookEvent::parse(&body).unwrap();
        let err = event.kind().unwrap_err();
        assert!(matches!(err, EventParseError::Object { ref event_type, .. } if event_type == CHECKOUT_SESSION_COMPLETED));
        assert!(err.to_string().contains("amount_total"));
    }

    #[test]
    fn test_payment_intents() {
        let body = json!({
            "id": "evt_2",
            "type": "payment_intent.payment_failed",
            "data": {"object": {
                "id": "pi_1",
                "amount": 500,
                "currency": "usd",
                "status": "requires_payment_method",
                "last_payment_error": {"code": "card_declined", "message": "Your card was declined."}
            }}
        });
        let event = WebhookEvent::parse(body.to_string().as_bytes()).unwrap();
        let EventKind::PaymentFailed(intent) = event.kind().unwrap() else {
            panic!("expected failure");
        };
        assert_eq!(intent.id, "pi_1");
        assert_eq!(
            intent.last_payment_error.and_then(|e| e.message).as_deref(),
            Some("Your card was declined.")
        );
        assert_eq!(event.amount(), Some(500));
    }

    #[test]
    fn test_unhandled_and_malformed() {
        let body = json!({"id": "evt_3", "type": "customer.created", "data": {"object": {}}});
        let event = WebhookEvent::parse(body.to_string().as_bytes()).unwrap();
        assert!(matches!(event.kind().unwrap(), EventKind::Unhandled));

        assert!(matches!(
            WebhookEvent::parse(b"{\"id\":\"evt_4\"}"),
            Err(EventParseError::Envelope(_))
        ));
    }
}
