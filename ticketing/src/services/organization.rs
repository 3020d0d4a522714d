//! Organizations and memberships.

use super::authorization::{Authorizer, Permission};
use super::{normalize_email, required_text, slug_candidate, slugify};
use crate::error::{Result, TicketingError};
use crate::repository::{OrganizationRepository, UserRepository};
use crate::types::{Membership, Organization, OrganizationId, Plan, Role, UserId};
use chrono::{DateTime, Utc};
use kassa_core::environment::Clock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Attempts at finding a free slug before giving up.
const MAX_SLUG_ATTEMPTS: u32 = 50;

/// An organization as seen by one of its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationView {
    /// The organization
    #[serde(flatten)]
    pub organization: Organization,
    /// The viewer's role
    pub role: Role,
}

/// One member of an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberView {
    /// Member
    pub user_id: UserId,
    /// Member's e-mail
    pub email: String,
    /// Member's name
    pub name: String,
    /// Role
    pub role: Role,
    /// When they joined
    pub joined_at: DateTime<Utc>,
}

/// Organization management.
#[derive(Clone)]
pub struct OrganizationService {
    users: Arc<dyn UserRepository>,
    organizations: Arc<dyn OrganizationRepository>,
    authorizer: Authorizer,
    clock: Arc<dyn Clock>,
}

impl OrganizationService {
    /// Creates a new `OrganizationService`
    #[must_use]
    pub fn new(
        users: Arc<dyn UserRepository>,
        organizations: Arc<dyn OrganizationRepository>,
        authorizer: Authorizer,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            organizations,
            authorizer,
            clock,
        }
    }

    /// Create an organization on the FREE plan with `user_id` as its ADMIN.
    ///
    /// # Errors
    ///
    /// `Validation` for a bad name, `NotFound` for an unknown user.
    pub async fn create(&self, user_id: UserId, name: &str) -> Result<Organization> {
        let name = required_text("Organization name", name, 100)?;
        if self.users.get_user(user_id).await?.is_none() {
            return Err(TicketingError::not_found("user", user_id));
        }
        let base = slugify(&name, "organization");
        let now = self.clock.now();

        for attempt in 1..=MAX_SLUG_ATTEMPTS {
            let slug = slug_candidate(&base, attempt);
            if self.organizations.organization_slug_exists(&slug).await? {
                continue;
            }
            let organization = Organization {
                id: OrganizationId::new(),
                name: name.clone(),
                slug,
                plan: Plan::Free,
                created_at: now,
            };
            let creator = Membership {
                organization_id: organization.id,
                user_id,
                role: Role::Admin,
                created_at: now,
            };
            match self.organizations.insert_organization(&organization, &creator).await {
                Ok(()) => {
                    tracing::info!(
                        organization_id = %organization.id,
                        slug = %organization.slug,
                        created_by = %user_id,
                        "Organization created"
                    );
                    return Ok(organization);
                }
                // Lost a race for the slug; try the next one.
                Err(TicketingError::Conflict(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Err(TicketingError::Conflict(format!(
            "Could not find a free slug for {name}"
        )))
    }

    /// Load an organization the user belongs to.
    ///
    /// # Errors
    ///
    /// `NotFound` if it does not exist or the user is not a member.
    pub async fn get(&self, user_id: UserId, organization_id: OrganizationId) -> Result<OrganizationView> {
        let membership = self
            .authorizer
            .require(user_id, organization_id, Permission::ViewEvents)
            .await?;
        let organization = self
            .organizations
            .get_organization_for_user(organization_id, user_id)
            .await?
            .ok_or_else(|| TicketingError::not_found("organization", organization_id))?;
        Ok(OrganizationView {
            organization,
            role: membership.role,
        })
    }

    /// Organizations the user belongs to.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<OrganizationView>> {
        Ok(self
            .organizations
            .list_organizations_for_user(user_id)
            .await?
            .into_iter()
            .map(|(organization, role)| OrganizationView { organization, role })
            .collect())
    }

    /// Members with their account details. ADMIN only.
    ///
    /// # Errors
    ///
    /// `NotFound`/`Forbidden` per [`Authorizer::require`].
    pub async fn list_members(&self, user_id: UserId, organization_id: OrganizationId) -> Result<Vec<MemberView>> {
        self.authorizer
            .require(user_id, organization_id, Permission::ManageOrganization)
            .await?;
        let memberships = self.organizations.list_memberships(organization_id).await?;
        let mut members = Vec::with_capacity(memberships.len());
        for membership in memberships {
            if let Some(user) = self.users.get_user(membership.user_id).await? {
                members.push(MemberView {
                    user_id: user.id,
                    email: user.email,
                    name: user.name,
                    role: membership.role,
                    joined_at: membership.created_at,
                });
            }
        }
        Ok(members)
    }

    /// Add a registered user to the organization. ADMIN only.
    ///
    /// # Errors
    ///
    /// `NotFound` if no user has the e-mail, `Conflict` if they are
    /// already a member.
    pub async fn add_member(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
        email: &str,
        role: Role,
    ) -> Result<Membership> {
        self.authorizer
            .require(user_id, organization_id, Permission::ManageOrganization)
            .await?;
        let email = normalize_email(email)?;
        let invitee = self
            .users
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| TicketingError::not_found("user", &email))?;
        if self
            .organizations
            .get_membership(organization_id, invitee.id)
            .await?
            .is_some()
        {
            return Err(TicketingError::Conflict(format!(
                "{email} is already a member"
            )));
        }

        let membership = Membership {
            organization_id,
            user_id: invitee.id,
            role,
            created_at: self.clock.now(),
        };
        self.organizations.insert_membership(&membership).await?;
        tracing::info!(
            organization_id = %organization_id,
            member_id = %invitee.id,
            role = ?role,
            added_by = %user_id,
            "Member added"
        );
        Ok(membership)
    }

    /// Change a member's role. ADMIN only; the last ADMIN keeps their role.
    ///
    /// # Errors
    ///
    /// `NotFound` for non-members, `Conflict` when demoting the last ADMIN.
    pub async fn change_role(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
        member_id: UserId,
        role: Role,
    ) -> Result<Membership> {
        self.authorizer
            .require(user_id, organization_id, Permission::ManageOrganization)
            .await?;
        let membership = self
            .organizations
            .set_membership_role(organization_id, member_id, role)
            .await?;
        tracing::info!(
            organization_id = %organization_id,
            member_id = %member_id,
            role = ?role,
            changed_by = %user_id,
            "Member role changed"
        );
        Ok(membership)
    }

    /// Remove a member. ADMIN only; the last ADMIN cannot be removed.
    ///
    /// # Errors
    ///
    /// `NotFound` for non-members, `Conflict` for the last ADMIN.
    pub async fn remove_member(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
        member_id: UserId,
    ) -> Result<()> {
        self.authorizer
            .require(user_id, organization_id, Permission::ManageOrganization)
            .await?;
        self.organizations
            .remove_membership(organization_id, member_id)
            .await?;
        tracing::info!(
            organization_id = %organization_id,
            member_id = %member_id,
            removed_by = %user_id,
            "Member removed"
        );
        Ok(())
    }

    /// Switch the subscription plan. ADMIN only. Takes effect for orders
    /// placed from now on.
    ///
    /// # Errors
    ///
    /// `NotFound`/`Forbidden` per [`Authorizer::require`].
    pub async fn change_plan(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
        plan: Plan,
    ) -> Result<Organization> {
        self.authorizer
            .require(user_id, organization_id, Permission::ManageOrganization)
            .await?;
        let mut organization = self
            .organizations
            .get_organization(organization_id)
            .await?
            .ok_or_else(|| TicketingError::not_found("organization", organization_id))?;
        let previous = organization.plan;
        organization.plan = plan;
        self.organizations.update_organization(&organization).await?;
        tracing::info!(
            organization_id = %organization_id,
            from = previous.label(),
            to = plan.label(),
            "Plan changed"
        );
        Ok(organization)
    }
}
