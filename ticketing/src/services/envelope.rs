//! `{success, data}` / `{success, error}` result envelopes.

use crate::error::{Result, TicketingError};
use serde::{Deserialize, Serialize};

/// Message shown instead of internal error details.
const INTERNAL_MESSAGE: &str = "Something went wrong. Please try again later.";

/// Error half of an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine-readable code, see [`TicketingError::code`]
    pub code: String,
    /// Human-readable message
    pub message: String,
}

/// Outcome of a service call in the shape callers consume.
///
/// ```
/// use ticketing::services::ServiceResponse;
/// use ticketing::TicketingError;
///
/// let ok: ServiceResponse<u32> = Ok(3).into();
/// assert_eq!(serde_json::to_string(&ok).unwrap(), r#"{"success":true,"data":3}"#);
///
/// let err: ServiceResponse<u32> = Err(TicketingError::Validation("bad".into())).into();
/// assert!(!err.success);
/// assert_eq!(err.error.unwrap().code, "VALIDATION_ERROR");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceResponse<T> {
    /// Whether the call succeeded
    pub success: bool,
    /// Payload on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> ServiceResponse<T> {
    /// A successful envelope.
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// A failed envelope. Errors that are not the caller's fault are logged
    /// and their details replaced by a generic message.
    pub fn err(error: &TicketingError) -> Self {
        let message = if error.is_user_error() {
            error.to_string()
        } else {
            tracing::error!(code = error.code(), error = %error, "Service call failed");
            INTERNAL_MESSAGE.to_string()
        };
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code: error.code().to_string(),
                message,
            }),
        }
    }
}

impl<T> From<Result<T>> for ServiceResponse<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(error) => Self::err(&error),
        }
    }
}
