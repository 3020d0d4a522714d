//! Error type shared by repositories and services.

use crate::types::TicketTypeId;
use kassa_payments::PaymentError;
use thiserror::Error;

/// Result type alias for ticketing operations.
pub type Result<T> = std::result::Result<T, TicketingError>;

/// Everything that can go wrong in the ticketing domain.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TicketingError {
    /// Row does not exist, or exists outside the caller's tenant.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of row, e.g. `"event"`
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// The caller is a member but their role does not allow this.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Input failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The write collides with existing state (duplicate slug, last admin, ...).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Not enough tickets left.
    #[error("Ticket type {ticket_type_id} sold out: requested {requested}, available {available}")]
    SoldOut {
        /// Ticket type that ran out
        ticket_type_id: TicketTypeId,
        /// Quantity asked for
        requested: u32,
        /// Quantity still available
        available: u32,
    },

    /// A lifecycle command is not allowed from the current status.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// The payment provider failed.
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// Unexpected failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TicketingError {
    /// Shorthand for [`TicketingError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code for result envelopes.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::SoldOut { .. } => "SOLD_OUT",
            Self::InvalidTransition(_) => "INVALID_TRANSITION",
            Self::Payment(_) => "PAYMENT_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns `true` if the caller caused the error (4xx-style), `false`
    /// for failures on our side or at the payment provider.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        match self {
            Self::Payment(e) => e.is_user_error(),
            Self::Internal(_) => false,
            _ => true,
        }
    }
}
