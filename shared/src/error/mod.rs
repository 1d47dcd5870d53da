//! Unified error system for the order pipeline
//!
//! - [`ErrorCode`]: Standardized error codes for all error types
//! - [`AppError`]: Rich error type with codes, messages, and details
//! - [`ErrorBody`]: JSON body returned to HTTP callers
//!
//! # Error Code Ranges
//!
//! - 0xxx: General errors
//! - 1xxx: Webhook signature errors
//! - 4xxx: Order errors
//! - 5xxx: Payment event errors
//! - 9xxx: System errors
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode};
//!
//! let err = AppError::new(ErrorCode::SignatureMissing);
//! assert_eq!(err.http_status(), http::StatusCode::BAD_REQUEST);
//!
//! let err = AppError::with_message(ErrorCode::ValidationFailed, "currency must not be empty")
//!     .with_detail("field", "currency");
//! assert_eq!(err.body().code, 2);
//! ```

mod codes;
mod http;
mod types;

pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{AppError, AppResult, ErrorBody};
