//! Unified error codes for the order pipeline
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors (webhook signatures)
//! - 4xxx: Order errors
//! - 5xxx: Payment event errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid format
    InvalidFormat = 6,
    /// Required field missing
    RequiredField = 7,
    /// Value out of range
    ValueOutOfRange = 8,

    // ==================== 1xxx: Auth ====================
    /// Webhook signature header is absent
    SignatureMissing = 1101,
    /// Webhook signature does not match the payload
    SignatureInvalid = 1102,
    /// Webhook signature timestamp is outside the tolerance window
    SignatureExpired = 1103,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order status changed concurrently
    OrderStatusConflict = 4008,
    /// Status transition is not allowed
    InvalidStatusTransition = 4009,

    // ==================== 5xxx: Payment events ====================
    /// Payment event payload is malformed
    PaymentEventMalformed = 5101,

    // ==================== 9xxx: System ====================
    /// Database error
    DatabaseError = 9002,
    /// Configuration error
    ConfigError = 9005,
    /// Message queue error
    QueueError = 9501,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::RequiredField => "Required field is missing",
            ErrorCode::ValueOutOfRange => "Value is out of range",

            // Auth
            ErrorCode::SignatureMissing => "No signature",
            ErrorCode::SignatureInvalid => "Invalid signature",
            ErrorCode::SignatureExpired => "Signature timestamp outside tolerance",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderStatusConflict => "Order status was changed concurrently",
            ErrorCode::InvalidStatusTransition => "Order status transition is not allowed",

            // Payment
            ErrorCode::PaymentEventMalformed => "Payment event payload is malformed",

            // System
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::QueueError => "Message queue error",
        }
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:04}", self.code())
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            6 => Ok(ErrorCode::InvalidFormat),
            7 => Ok(ErrorCode::RequiredField),
            8 => Ok(ErrorCode::ValueOutOfRange),

            1101 => Ok(ErrorCode::SignatureMissing),
            1102 => Ok(ErrorCode::SignatureInvalid),
            1103 => Ok(ErrorCode::SignatureExpired),

            4001 => Ok(ErrorCode::OrderNotFound),
            4008 => Ok(ErrorCode::OrderStatusConflict),
            4009 => Ok(ErrorCode::InvalidStatusTransition),

            5101 => Ok(ErrorCode::PaymentEventMalformed),

            9002 => Ok(ErrorCode::DatabaseError),
            9005 => Ok(ErrorCode::ConfigError),
            9501 => Ok(ErrorCode::QueueError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

/// Error returned when a u16 does not map to a known [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::ValidationFailed.code(), 2);
        assert_eq!(ErrorCode::SignatureMissing.code(), 1101);
        assert_eq!(ErrorCode::OrderNotFound.code(), 4001);
        assert_eq!(ErrorCode::PaymentEventMalformed.code(), 5101);
        assert_eq!(ErrorCode::QueueError.code(), 9501);
    }

    #[test]
    fn test_try_from_valid() {
        assert_eq!(ErrorCode::try_from(3), Ok(ErrorCode::NotFound));
        assert_eq!(ErrorCode::try_from(1102), Ok(ErrorCode::SignatureInvalid));
        assert_eq!(
            ErrorCode::try_from(4009),
            Ok(ErrorCode::InvalidStatusTransition)
        );
    }

    #[test]
    fn test_try_from_invalid() {
        assert_eq!(ErrorCode::try_from(0), Err(InvalidErrorCode(0)));
        assert_eq!(ErrorCode::try_from(65000), Err(InvalidErrorCode(65000)));
        assert_eq!(
            InvalidErrorCode(42).to_string(),
            "invalid error code: 42"
        );
    }

    #[test]
    fn test_serialize() {
        let json = serde_json::to_string(&ErrorCode::OrderNotFound).unwrap();
        assert_eq!(json, "4001");
    }

    #[test]
    fn test_deserialize() {
        let code: ErrorCode = serde_json::from_str("1101").unwrap();
        assert_eq!(code, ErrorCode::SignatureMissing);
        assert!(serde_json::from_str::<ErrorCode>("12345").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(ErrorCode::NotFound.to_string(), "E0003");
        assert_eq!(ErrorCode::OrderNotFound.to_string(), "E4001");
    }

    #[test]
    fn test_message() {
        assert_eq!(ErrorCode::SignatureMissing.message(), "No signature");
        assert_eq!(ErrorCode::SignatureInvalid.message(), "Invalid signature");
    }
}
