//! Connect state storage trait.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kassa_core::{OrganizationId, UserId};

/// A pending connect attempt, keyed by its CSRF state parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectState {
    /// Random state parameter sent to Mollie
    pub state: String,
    /// Organization being connected
    pub organization_id: OrganizationId,
    /// Admin who started the flow
    pub user_id: UserId,
    /// When the flow started
    pub created_at: DateTime<Utc>,
}

/// Storage for pending connect attempts.
#[async_trait]
pub trait ConnectStateStore: Send + Sync {
    /// Remember a pending attempt.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn put(&self, state: ConnectState) -> Result<()>;

    /// Remove and return the attempt for `state`. A state can be taken once.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn take(&self, state: &str) -> Result<Option<ConnectState>>;
}
