//! Tenant-scoped data access.
//!
//! Every trait is object safe and held as `Arc<dyn _>`. Lookups ending in
//! `_for_user` only return a row when the user is a member of the owning
//! organization; otherwise they return `None`, exactly as for a missing row.
//!
//! [`InMemoryStore`] implements all of them. A database-backed store has to
//! keep the same guarantees, most importantly the single-statement
//! check-and-increment of [`TicketTypeRepository::increment_sold_count`].

pub mod memory;

pub use memory::InMemoryStore;

use crate::error::Result;
use crate::types::{
    Event, EventId, EventStatus, Invoice, Membership, Order, OrderId, Organization,
    OrganizationId, Role, Ticket, TicketId, TicketType, TicketTypeId, User, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Users.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Store a new user.
    ///
    /// # Errors
    ///
    /// [`Conflict`](crate::TicketingError::Conflict) if the e-mail is taken.
    async fn insert_user(&self, user: &User) -> Result<()>;

    /// Load a user by id.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn get_user(&self, id: UserId) -> Result<Option<User>>;

    /// Load a user by e-mail, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
}

/// Organizations and their memberships.
#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    /// Store a new organization together with its first membership.
    ///
    /// # Errors
    ///
    /// [`Conflict`](crate::TicketingError::Conflict) if the slug is taken.
    async fn insert_organization(&self, organization: &Organization, creator: &Membership) -> Result<()>;

    /// Load an organization without tenant scoping. Platform use only.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn get_organization(&self, id: OrganizationId) -> Result<Option<Organization>>;

    /// Load an organization the user belongs to.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn get_organization_for_user(
        &self,
        id: OrganizationId,
        user_id: UserId,
    ) -> Result<Option<Organization>>;

    /// Organizations the user belongs to, with the user's role, by name.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn list_organizations_for_user(&self, user_id: UserId) -> Result<Vec<(Organization, Role)>>;

    /// Every organization. Platform use only.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn list_organizations(&self) -> Result<Vec<Organization>>;

    /// Whether an organization already uses `slug`.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn organization_slug_exists(&self, slug: &str) -> Result<bool>;

    /// Replace an organization's name or plan.
    ///
    /// # Errors
    ///
    /// [`NotFound`](crate::TicketingError::NotFound) if it does not exist.
    async fn update_organization(&self, organization: &Organization) -> Result<()>;

    /// The user's membership in the organization.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn get_membership(&self, organization_id: OrganizationId, user_id: UserId) -> Result<Option<Membership>>;

    /// All memberships of the organization, oldest first.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn list_memberships(&self, organization_id: OrganizationId) -> Result<Vec<Membership>>;

    /// Store a new membership.
    ///
    /// # Errors
    ///
    /// [`Conflict`](crate::TicketingError::Conflict) if the user is already
    /// a member.
    async fn insert_membership(&self, membership: &Membership) -> Result<()>;

    /// Change a member's role and return the stored membership.
    ///
    /// The last-ADMIN check and the write happen in one critical section,
    /// so concurrent demotions can never leave the organization without
    /// an ADMIN.
    ///
    /// # Errors
    ///
    /// [`NotFound`](crate::TicketingError::NotFound) for non-members,
    /// [`Conflict`](crate::TicketingError::Conflict) when demoting the last ADMIN.
    async fn set_membership_role(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        role: Role,
    ) -> Result<Membership>;

    /// Remove a membership, with the same last-ADMIN guarantee as
    /// [`set_membership_role`](Self::set_membership_role).
    ///
    /// # Errors
    ///
    /// [`NotFound`](crate::TicketingError::NotFound) for non-members,
    /// [`Conflict`](crate::TicketingError::Conflict) for the last ADMIN.
    async fn remove_membership(&self, organization_id: OrganizationId, user_id: UserId) -> Result<()>;
}

/// Events.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Insert or replace an event.
    ///
    /// # Errors
    ///
    /// [`Conflict`](crate::TicketingError::Conflict) if another event uses the slug.
    async fn save_event(&self, event: &Event) -> Result<()>;

    /// Remove an event and its ticket types.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn delete_event(&self, id: EventId) -> Result<()>;

    /// Load an event without tenant scoping.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn get_event(&self, id: EventId) -> Result<Option<Event>>;

    /// Load an event whose organization the user belongs to.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn get_event_for_user(&self, id: EventId, user_id: UserId) -> Result<Option<Event>>;

    /// Load an event by its public slug.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn get_event_by_slug(&self, slug: &str) -> Result<Option<Event>>;

    /// The organization's events, soonest first.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn list_events_for_organization(&self, organization_id: OrganizationId) -> Result<Vec<Event>>;

    /// Events in `status` across all organizations, soonest first.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn list_events_by_status(&self, status: EventStatus) -> Result<Vec<Event>>;

    /// Whether any event uses `slug`.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn event_slug_exists(&self, slug: &str) -> Result<bool>;
}

/// Ticket types and their capacity counters.
#[async_trait]
pub trait TicketTypeRepository: Send + Sync {
    /// Store a new ticket type.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn insert_ticket_type(&self, ticket_type: &TicketType) -> Result<()>;

    /// Replace a ticket type's editable fields, keeping the stored
    /// `sold_count`. Returns the stored row.
    ///
    /// # Errors
    ///
    /// [`NotFound`](crate::TicketingError::NotFound) if missing,
    /// [`Conflict`](crate::TicketingError::Conflict) if the new capacity is
    /// below the tickets already sold.
    async fn update_ticket_type(&self, ticket_type: &TicketType) -> Result<TicketType>;

    /// Remove a ticket type that has sold nothing.
    ///
    /// # Errors
    ///
    /// [`NotFound`](crate::TicketingError::NotFound) if missing,
    /// [`Conflict`](crate::TicketingError::Conflict) if tickets were sold.
    async fn delete_ticket_type(&self, id: TicketTypeId) -> Result<()>;

    /// Load a ticket type.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn get_ticket_type(&self, id: TicketTypeId) -> Result<Option<TicketType>>;

    /// The event's ticket types by `sort_order`, then creation.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn list_ticket_types_for_event(&self, event_id: EventId) -> Result<Vec<TicketType>>;

    /// Reserve `quantity` tickets.
    ///
    /// Checks `sold_count + quantity <= capacity` and increments in one
    /// critical section, so concurrent callers can never oversell.
    /// Returns the updated row.
    ///
    /// # Errors
    ///
    /// [`SoldOut`](crate::TicketingError::SoldOut) if not enough are left,
    /// [`NotFound`](crate::TicketingError::NotFound) if missing.
    async fn increment_sold_count(&self, id: TicketTypeId, quantity: u32) -> Result<TicketType>;

    /// Give back `quantity` reserved tickets. Never goes below zero.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn decrement_sold_count(&self, id: TicketTypeId, quantity: u32) -> Result<()>;
}

/// Orders.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert or replace an order.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn save_order(&self, order: &Order) -> Result<()>;

    /// Load an order without tenant scoping.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Load an order whose organization the user belongs to.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn get_order_for_user(&self, id: OrderId, user_id: UserId) -> Result<Option<Order>>;

    /// Load the order a provider payment belongs to.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn find_order_by_payment_id(&self, payment_id: &str) -> Result<Option<Order>>;

    /// The event's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn list_orders_for_event(&self, event_id: EventId) -> Result<Vec<Order>>;

    /// PENDING orders with `expires_at <= now`.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn list_expired_pending_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>>;

    /// Number of orders of any status for the event.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn count_orders_for_event(&self, event_id: EventId) -> Result<usize>;

    /// PAID orders of the organization with `from <= paid_at < to`.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn list_paid_orders_for_organization_between(
        &self,
        organization_id: OrganizationId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Order>>;

    /// Tickets in PAID orders of the organization with `from <= paid_at < to`.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn count_tickets_sold_between(
        &self,
        organization_id: OrganizationId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u32>;
}

/// Issued tickets.
#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// Store newly issued tickets.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn insert_tickets(&self, tickets: &[Ticket]) -> Result<()>;

    /// Load a ticket.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn get_ticket(&self, id: TicketId) -> Result<Option<Ticket>>;

    /// The order's tickets, in issue order.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn list_tickets_for_order(&self, order_id: OrderId) -> Result<Vec<Ticket>>;

    /// Flip a VALID ticket to USED. Returns `false` if it was not VALID,
    /// so of two concurrent scans exactly one wins.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn mark_used(&self, id: TicketId, scanned_by: UserId, at: DateTime<Utc>) -> Result<bool>;

    /// Cancel every VALID ticket of the order. Returns how many changed.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn cancel_tickets_for_order(&self, order_id: OrderId) -> Result<usize>;
}

/// Monthly platform invoices.
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Number and store an invoice. The next free sequence of the period
    /// is allocated and the row inserted in one critical section, so
    /// concurrent callers never share a number. Returns the stored row.
    ///
    /// # Errors
    ///
    /// [`Conflict`](crate::TicketingError::Conflict) if the organization
    /// already has an invoice for the period.
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<Invoice>;

    /// The organization's invoice for a period.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn find_invoice_for_period(
        &self,
        organization_id: OrganizationId,
        year: i32,
        month: u32,
    ) -> Result<Option<Invoice>>;

    /// The organization's invoices, newest period first.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    async fn list_invoices_for_organization(&self, organization_id: OrganizationId) -> Result<Vec<Invoice>>;
}

/// All repositories, as the services consume them.
#[derive(Clone)]
pub struct Repositories {
    /// Users
    pub users: Arc<dyn UserRepository>,
    /// Organizations and memberships
    pub organizations: Arc<dyn OrganizationRepository>,
    /// Events
    pub events: Arc<dyn EventRepository>,
    /// Ticket types
    pub ticket_types: Arc<dyn TicketTypeRepository>,
    /// Orders
    pub orders: Arc<dyn OrderRepository>,
    /// Tickets
    pub tickets: Arc<dyn TicketRepository>,
    /// Invoices
    pub invoices: Arc<dyn InvoiceRepository>,
}

impl Repositories {
    /// Every repository backed by one shared [`InMemoryStore`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_store(&Arc::new(InMemoryStore::new()))
    }

    /// Every repository backed by `store`.
    #[must_use]
    pub fn from_store(store: &Arc<InMemoryStore>) -> Self {
        Self {
            users: store.clone(),
            organizations: store.clone(),
            events: store.clone(),
            ticket_types: store.clone(),
            orders: store.clone(),
            tickets: store.clone(),
            invoices: store.clone(),
        }
    }
}
