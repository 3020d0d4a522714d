//! Role checks.
//!
//! | Permission           | ADMIN | MEMBER | SCANNER |
//! |----------------------|:-----:|:------:|:-------:|
//! | `ManageOrganization` |   ✓   |        |         |
//! | `ManageEvents`       |   ✓   |   ✓    |         |
//! | `ScanTickets`        |   ✓   |   ✓    |    ✓    |
//! | `ViewEvents`         |   ✓   |   ✓    |    ✓    |
//!
//! Non-members get `NotFound`, never `Forbidden`, so they cannot probe which
//! organizations exist.

use crate::error::{Result, TicketingError};
use crate::repository::{OrganizationRepository, UserRepository};
use crate::types::{Membership, OrganizationId, Role, User, UserId};
use std::sync::Arc;

/// Something a member may be allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Members, plan, payment connection, invoices
    ManageOrganization,
    /// Events, ticket types and orders
    ManageEvents,
    /// Check tickets in at the door
    ScanTickets,
    /// Read the event list
    ViewEvents,
}

impl Permission {
    /// Whether `role` grants this permission.
    #[must_use]
    pub const fn allows(self, role: Role) -> bool {
        match self {
            Self::ManageOrganization => matches!(role, Role::Admin),
            Self::ManageEvents => matches!(role, Role::Admin | Role::Member),
            Self::ScanTickets | Self::ViewEvents => true,
        }
    }
}

/// Resolves memberships and enforces [`Permission`]s.
#[derive(Clone)]
pub struct Authorizer {
    users: Arc<dyn UserRepository>,
    organizations: Arc<dyn OrganizationRepository>,
}

impl Authorizer {
    /// Creates a new `Authorizer`
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>, organizations: Arc<dyn OrganizationRepository>) -> Self {
        Self { users, organizations }
    }

    /// Return the user's membership if it grants `permission`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the user is not a member, `Forbidden` if the role is
    /// insufficient.
    pub async fn require(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
        permission: Permission,
    ) -> Result<Membership> {
        let membership = self
            .organizations
            .get_membership(organization_id, user_id)
            .await?
            .ok_or_else(|| TicketingError::not_found("organization", organization_id))?;

        if !permission.allows(membership.role) {
            tracing::warn!(
                user_id = %user_id,
                organization_id = %organization_id,
                role = ?membership.role,
                permission = ?permission,
                "Permission denied"
            );
            return Err(TicketingError::Forbidden(format!(
                "{:?} role cannot do this",
                membership.role
            )));
        }
        Ok(membership)
    }

    /// Return the user if they are a platform administrator.
    ///
    /// # Errors
    ///
    /// `Forbidden` for everyone else, `NotFound` for unknown users.
    pub async fn require_platform_admin(&self, user_id: UserId) -> Result<User> {
        let user = self
            .users
            .get_user(user_id)
            .await?
            .ok_or_else(|| TicketingError::not_found("user", user_id))?;
        if !user.is_platform_admin {
            tracing::warn!(user_id = %user_id, "Platform admin required");
            return Err(TicketingError::Forbidden(
                "Only platform administrators can do this".to_string(),
            ));
        }
        Ok(user)
    }
}
