//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // 404 Not Found
            Self::NotFound | Self::OrderNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::AlreadyExists | Self::OrderStatusConflict => StatusCode::CONFLICT,

            // 422 Unprocessable Entity
            Self::InvalidStatusTransition => StatusCode::UNPROCESSABLE_ENTITY,

            // 500 Internal Server Error
            Self::DatabaseError | Self::ConfigError | Self::QueueError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }

            // 400 Bad Request (validation, malformed payloads, signatures)
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_errors_are_bad_request() {
        assert_eq!(
            ErrorCode::SignatureMissing.http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCode::SignatureInvalid.http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCode::SignatureExpired.http_status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_system_errors_are_internal() {
        assert_eq!(
            ErrorCode::QueueError.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorCode::DatabaseError.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_order_errors() {
        assert_eq!(ErrorCode::OrderNotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::OrderStatusConflict.http_status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ErrorCode::InvalidStatusTransition.http_status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
