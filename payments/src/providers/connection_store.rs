//! Connection storage trait.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kassa_core::{OrganizationId, UserId};
use serde::{Deserialize, Serialize};

/// Health of a stored connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    /// Tokens are usable
    Active,
    /// The refresh token was rejected; the organizer must connect again
    NeedsReauthorization,
}

/// An organization's Mollie connection with plaintext tokens.
///
/// Plaintext only exists in memory; stores must encrypt the tokens at rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MollieConnection {
    /// Owning organization
    pub organization_id: OrganizationId,
    /// Current access token
    pub access_token: String,
    /// Current refresh token
    pub refresh_token: String,
    /// When `access_token` stops working
    pub expires_at: DateTime<Utc>,
    /// Granted scopes
    pub scope: String,
    /// Connection health
    pub status: ConnectionStatus,
    /// Admin who connected the account
    pub connected_by: UserId,
    /// When the account was connected
    pub connected_at: DateTime<Utc>,
    /// Last token rotation
    pub updated_at: DateTime<Utc>,
}

impl MollieConnection {
    /// Whether the access token expires within `margin` of `now`.
    #[must_use]
    pub fn expires_within(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        self.expires_at <= now + margin
    }
}

/// Persistent storage for connections, one per organization.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Insert or replace the organization's connection.
    ///
    /// # Errors
    ///
    /// Returns error if encryption or storage fails.
    async fn save(&self, connection: &MollieConnection) -> Result<()>;

    /// Load the organization's connection.
    ///
    /// # Errors
    ///
    /// Returns error if decryption or storage fails.
    async fn get(&self, organization_id: OrganizationId) -> Result<Option<MollieConnection>>;

    /// Remove the organization's connection. Removing nothing is not an error.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn delete(&self, organization_id: OrganizationId) -> Result<()>;
}
