//! Error types for Mollie Connect operations.

use kassa_core::OrganizationId;
use thiserror::Error;

/// Result type alias for payment operations.
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Failure modes of the Mollie integration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaymentError {
    // ═══════════════════════════════════════════════════════════
    // Connection Errors
    // ═══════════════════════════════════════════════════════════

    /// The organization never connected a Mollie account (or disconnected it).
    #[error("Organization {organization_id} has no Mollie connection")]
    NotConnected {
        /// Organization without a connection
        organization_id: OrganizationId,
    },

    /// The stored refresh token was rejected; the organization must reconnect.
    #[error("Mollie connection for organization {organization_id} must be reauthorized")]
    NeedsReauthorization {
        /// Organization whose grant was revoked
        organization_id: OrganizationId,
    },

    // ═══════════════════════════════════════════════════════════
    // OAuth Errors
    // ═══════════════════════════════════════════════════════════

    /// OAuth state parameter is unknown or was already used (CSRF protection).
    #[error("Invalid OAuth state parameter")]
    InvalidState,

    /// OAuth state parameter is older than its time-to-live.
    #[error("OAuth state parameter has expired")]
    StateExpired,

    /// The provider refused a token grant.
    #[error("OAuth grant rejected: {reason}")]
    OAuth {
        /// Provider supplied reason
        reason: String,
    },

    /// The provider answered `invalid_grant` to a refresh.
    #[error("Refresh token rejected (invalid_grant)")]
    InvalidGrant,

    // ═══════════════════════════════════════════════════════════
    // API Errors
    // ═══════════════════════════════════════════════════════════

    /// The Mollie API returned an error status.
    #[error("Mollie API error ({status}): {message}")]
    Api {
        /// HTTP status returned by Mollie
        status: u16,
        /// Error detail returned by Mollie
        message: String,
    },

    /// An amount could not be represented or parsed.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// Token encryption or decryption failed.
    #[error("Token encryption error: {0}")]
    Encryption(String),

    /// Configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The connection store failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PaymentError {
    /// Returns `true` if the organizer can fix this by acting (reconnecting, retrying the flow).
    ///
    /// # Examples
    ///
    /// ```
    /// # use kassa_payments::PaymentError;
    /// assert!(PaymentError::InvalidState.is_user_error());
    /// assert!(!PaymentError::Storage("down".into()).is_user_error());
    /// ```
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::NotConnected { .. }
                | Self::NeedsReauthorization { .. }
                | Self::InvalidState
                | Self::StateExpired
                | Self::OAuth { .. }
        )
    }

    /// Returns `true` if the failure is worth retrying later.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            Self::Storage(_) => true,
            _ => false,
        }
    }
}
