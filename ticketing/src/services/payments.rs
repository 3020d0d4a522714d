//! Organization-facing side of Mollie Connect.

use super::authorization::{Authorizer, Permission};
use crate::error::{Result, TicketingError};
use crate::types::{OrganizationId, UserId};
use kassa_payments::{ClientLinkRequest, ConnectStart, ConnectionOverview, MollieConnectService};
use std::sync::Arc;

/// Connect, inspect and disconnect an organization's Mollie account.
///
/// Everything except [`payments_enabled`](Self::payments_enabled) is for
/// organization admins.
#[derive(Clone)]
pub struct PaymentConnections {
    mollie: Arc<MollieConnectService>,
    authorizer: Authorizer,
}

impl PaymentConnections {
    /// Creates a new `PaymentConnections`
    #[must_use]
    pub fn new(mollie: Arc<MollieConnectService>, authorizer: Authorizer) -> Self {
        Self { mollie, authorizer }
    }

    /// Authorization URL for connecting an existing Mollie account.
    ///
    /// # Errors
    ///
    /// `NotFound`/`Forbidden` unless the caller is an ADMIN.
    pub async fn start_connect(&self, user_id: UserId, organization_id: OrganizationId) -> Result<ConnectStart> {
        self.authorizer
            .require(user_id, organization_id, Permission::ManageOrganization)
            .await?;
        Ok(self.mollie.start(organization_id, user_id).await?)
    }

    /// Sign-up URL for organizers without a Mollie account.
    ///
    /// # Errors
    ///
    /// `NotFound`/`Forbidden` unless the caller is an ADMIN, `Payment` if
    /// Mollie rejects the client link.
    pub async fn start_signup(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
        request: &ClientLinkRequest,
    ) -> Result<ConnectStart> {
        self.authorizer
            .require(user_id, organization_id, Permission::ManageOrganization)
            .await?;
        Ok(self
            .mollie
            .start_with_client_link(organization_id, user_id, request)
            .await?)
    }

    /// Finish the OAuth callback.
    ///
    /// The state must have been issued to this user, who must still be an
    /// ADMIN of the organization. Both are checked before the code is
    /// exchanged, so a rejected callback leaves any existing connection
    /// untouched. The state is consumed either way.
    ///
    /// # Errors
    ///
    /// `Payment` for unknown, used or expired states and failed code
    /// exchanges, `Forbidden` if the caller may not connect.
    pub async fn complete_connect(&self, user_id: UserId, code: &str, state: &str) -> Result<ConnectionOverview> {
        let pending = self.mollie.claim_state(state).await?;
        let allowed = pending.user_id == user_id
            && self
                .authorizer
                .require(user_id, pending.organization_id, Permission::ManageOrganization)
                .await
                .is_ok();
        if !allowed {
            tracing::warn!(
                organization_id = %pending.organization_id,
                user_id = %user_id,
                "Mollie callback by a user who did not start it; ignoring"
            );
            return Err(TicketingError::Forbidden(
                "Only the admin who started the connection can complete it".to_string(),
            ));
        }
        Ok(self.mollie.connect(&pending, code).await?)
    }

    /// The connection, if any.
    ///
    /// # Errors
    ///
    /// `NotFound`/`Forbidden` unless the caller is an ADMIN.
    pub async fn connection_status(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> Result<Option<ConnectionOverview>> {
        self.authorizer
            .require(user_id, organization_id, Permission::ManageOrganization)
            .await?;
        Ok(self.mollie.status(organization_id).await?)
    }

    /// Remove the connection. Paid events can no longer be published.
    ///
    /// # Errors
    ///
    /// `NotFound`/`Forbidden` unless the caller is an ADMIN.
    pub async fn disconnect(&self, user_id: UserId, organization_id: OrganizationId) -> Result<()> {
        self.authorizer
            .require(user_id, organization_id, Permission::ManageOrganization)
            .await?;
        self.mollie.disconnect(organization_id).await?;
        Ok(())
    }

    /// Whether the organization can take payments right now.
    ///
    /// # Errors
    ///
    /// `Payment` for transient provider failures; a missing or broken
    /// connection is `Ok(false)`.
    pub async fn payments_enabled(&self, organization_id: OrganizationId) -> Result<bool> {
        Ok(self.mollie.can_receive_payments(organization_id).await?)
    }
}
