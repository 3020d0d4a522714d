//! In-memory implementation of every repository.
//!
//! All tables sit behind one `tokio::sync::RwLock`. Writers hold the write
//! guard for the whole read-check-write, which is what makes
//! `increment_sold_count` and `mark_used` atomic.

use super::{
    EventRepository, InvoiceRepository, OrderRepository, OrganizationRepository, TicketRepository,
    TicketTypeRepository, UserRepository,
};
use crate::error::{Result, TicketingError};
use crate::types::{
    Event, EventId, EventStatus, Invoice, InvoiceId, Membership, Order, OrderId, OrderStatus,
    Organization, OrganizationId, Role, Ticket, TicketId, TicketStatus, TicketType, TicketTypeId,
    User, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    organizations: HashMap<OrganizationId, Organization>,
    memberships: HashMap<(OrganizationId, UserId), Membership>,
    events: HashMap<EventId, Event>,
    ticket_types: HashMap<TicketTypeId, TicketType>,
    orders: HashMap<OrderId, Order>,
    tickets: HashMap<TicketId, Ticket>,
    invoices: HashMap<InvoiceId, Invoice>,
}

impl Tables {
    fn is_member(&self, organization_id: OrganizationId, user_id: UserId) -> bool {
        self.memberships.contains_key(&(organization_id, user_id))
    }

    fn admin_count(&self, organization_id: OrganizationId) -> usize {
        self.memberships
            .values()
            .filter(|m| m.organization_id == organization_id && m.role == Role::Admin)
            .count()
    }

    fn paid_between(
        &self,
        organization_id: OrganizationId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Iterator<Item = &Order> {
        self.orders.values().filter(move |o| {
            o.organization_id == organization_id
                && o.status == OrderStatus::Paid
                && o.paid_at.is_some_and(|at| from <= at && at < to)
        })
    }
}

/// Process-local store for tests, the demo and development.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(TicketingError::Conflict(format!(
                "A user with e-mail {} already exists",
                user.email
            )));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}

#[async_trait]
impl OrganizationRepository for InMemoryStore {
    async fn insert_organization(&self, organization: &Organization, creator: &Membership) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.organizations.values().any(|o| o.slug == organization.slug) {
            return Err(TicketingError::Conflict(format!(
                "Organization slug {} is taken",
                organization.slug
            )));
        }
        tables.organizations.insert(organization.id, organization.clone());
        tables
            .memberships
            .insert((creator.organization_id, creator.user_id), creator.clone());
        Ok(())
    }

    async fn get_organization(&self, id: OrganizationId) -> Result<Option<Organization>> {
        Ok(self.tables.read().await.organizations.get(&id).cloned())
    }

    async fn get_organization_for_user(
        &self,
        id: OrganizationId,
        user_id: UserId,
    ) -> Result<Option<Organization>> {
        let tables = self.tables.read().await;
        if !tables.is_member(id, user_id) {
            return Ok(None);
        }
        Ok(tables.organizations.get(&id).cloned())
    }

    async fn list_organizations_for_user(&self, user_id: UserId) -> Result<Vec<(Organization, Role)>> {
        let tables = self.tables.read().await;
        let mut organizations: Vec<_> = tables
            .memberships
            .values()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| {
                tables
                    .organizations
                    .get(&m.organization_id)
                    .map(|o| (o.clone(), m.role))
            })
            .collect();
        organizations.sort_by(|a, b| a.0.name.cmp(&b.0.name));
        Ok(organizations)
    }

    async fn list_organizations(&self) -> Result<Vec<Organization>> {
        let tables = self.tables.read().await;
        let mut organizations: Vec<_> = tables.organizations.values().cloned().collect();
        organizations.sort_by_key(|o| o.created_at);
        Ok(organizations)
    }

    async fn organization_slug_exists(&self, slug: &str) -> Result<bool> {
        Ok(self
            .tables
            .read()
            .await
            .organizations
            .values()
            .any(|o| o.slug == slug))
    }

    async fn update_organization(&self, organization: &Organization) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.organizations.get_mut(&organization.id) {
            Some(row) => {
                row.name.clone_from(&organization.name);
                row.plan = organization.plan;
                Ok(())
            }
            None => Err(TicketingError::not_found("organization", organization.id)),
        }
    }

    async fn get_membership(&self, organization_id: OrganizationId, user_id: UserId) -> Result<Option<Membership>> {
        Ok(self
            .tables
            .read()
            .await
            .memberships
            .get(&(organization_id, user_id))
            .cloned())
    }

    async fn list_memberships(&self, organization_id: OrganizationId) -> Result<Vec<Membership>> {
        let tables = self.tables.read().await;
        let mut memberships: Vec<_> = tables
            .memberships
            .values()
            .filter(|m| m.organization_id == organization_id)
            .cloned()
            .collect();
        memberships.sort_by_key(|m| m.created_at);
        Ok(memberships)
    }

    async fn insert_membership(&self, membership: &Membership) -> Result<()> {
        let mut tables = self.tables.write().await;
        let key = (membership.organization_id, membership.user_id);
        if tables.memberships.contains_key(&key) {
            return Err(TicketingError::Conflict("User is already a member".to_string()));
        }
        tables.memberships.insert(key, membership.clone());
        Ok(())
    }

    async fn set_membership_role(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        role: Role,
    ) -> Result<Membership> {
        let mut tables = self.tables.write().await;
        let current = tables
            .memberships
            .get(&(organization_id, user_id))
            .map(|m| m.role)
            .ok_or_else(|| TicketingError::not_found("member", user_id))?;
        if current == Role::Admin && role != Role::Admin && tables.admin_count(organization_id) <= 1 {
            return Err(TicketingError::Conflict(
                "An organization needs at least one admin".to_string(),
            ));
        }
        let membership = tables
            .memberships
            .get_mut(&(organization_id, user_id))
            .ok_or_else(|| TicketingError::not_found("member", user_id))?;
        membership.role = role;
        Ok(membership.clone())
    }

    async fn remove_membership(&self, organization_id: OrganizationId, user_id: UserId) -> Result<()> {
        let mut tables = self.tables.write().await;
        let current = tables
            .memberships
            .get(&(organization_id, user_id))
            .map(|m| m.role)
            .ok_or_else(|| TicketingError::not_found("member", user_id))?;
        if current == Role::Admin && tables.admin_count(organization_id) <= 1 {
            return Err(TicketingError::Conflict("Cannot remove the last admin".to_string()));
        }
        tables.memberships.remove(&(organization_id, user_id));
        Ok(())
    }
}

#[async_trait]
impl EventRepository for InMemoryStore {
    async fn save_event(&self, event: &Event) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables
            .events
            .values()
            .any(|e| e.slug == event.slug && e.id != event.id)
        {
            return Err(TicketingError::Conflict(format!(
                "Event slug {} is taken",
                event.slug
            )));
        }
        tables.events.insert(event.id, event.clone());
        Ok(())
    }

    async fn delete_event(&self, id: EventId) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.events.remove(&id);
        tables.ticket_types.retain(|_, t| t.event_id != id);
        Ok(())
    }

    async fn get_event(&self, id: EventId) -> Result<Option<Event>> {
        Ok(self.tables.read().await.events.get(&id).cloned())
    }

    async fn get_event_for_user(&self, id: EventId, user_id: UserId) -> Result<Option<Event>> {
        let tables = self.tables.read().await;
        Ok(tables
            .events
            .get(&id)
            .filter(|e| tables.is_member(e.organization_id, user_id))
            .cloned())
    }

    async fn get_event_by_slug(&self, slug: &str) -> Result<Option<Event>> {
        Ok(self
            .tables
            .read()
            .await
            .events
            .values()
            .find(|e| e.slug == slug)
            .cloned())
    }

    async fn list_events_for_organization(&self, organization_id: OrganizationId) -> Result<Vec<Event>> {
        let tables = self.tables.read().await;
        let mut events: Vec<_> = tables
            .events
            .values()
            .filter(|e| e.organization_id == organization_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.starts_at);
        Ok(events)
    }

    async fn list_events_by_status(&self, status: EventStatus) -> Result<Vec<Event>> {
        let tables = self.tables.read().await;
        let mut events: Vec<_> = tables
            .events
            .values()
            .filter(|e| e.status == status)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.starts_at);
        Ok(events)
    }

    async fn event_slug_exists(&self, slug: &str) -> Result<bool> {
        Ok(self.tables.read().await.events.values().any(|e| e.slug == slug))
    }
}

#[async_trait]
impl TicketTypeRepository for InMemoryStore {
    async fn insert_ticket_type(&self, ticket_type: &TicketType) -> Result<()> {
        self.tables
            .write()
            .await
            .ticket_types
            .insert(ticket_type.id, ticket_type.clone());
        Ok(())
    }

    async fn update_ticket_type(&self, ticket_type: &TicketType) -> Result<TicketType> {
        let mut tables = self.tables.write().await;
        let row = tables
            .ticket_types
            .get_mut(&ticket_type.id)
            .ok_or_else(|| TicketingError::not_found("ticket type", ticket_type.id))?;
        if ticket_type.capacity < row.sold_count {
            return Err(TicketingError::Conflict(format!(
                "Capacity {} is below the {} tickets already sold",
                ticket_type.capacity, row.sold_count
            )));
        }
        let sold_count = row.sold_count;
        *row = TicketType {
            sold_count,
            ..ticket_type.clone()
        };
        Ok(row.clone())
    }

    async fn delete_ticket_type(&self, id: TicketTypeId) -> Result<()> {
        let mut tables = self.tables.write().await;
        let row = tables
            .ticket_types
            .get(&id)
            .ok_or_else(|| TicketingError::not_found("ticket type", id))?;
        if row.sold_count > 0 {
            return Err(TicketingError::Conflict(format!(
                "{} tickets of this type were sold",
                row.sold_count
            )));
        }
        tables.ticket_types.remove(&id);
        Ok(())
    }

    async fn get_ticket_type(&self, id: TicketTypeId) -> Result<Option<TicketType>> {
        Ok(self.tables.read().await.ticket_types.get(&id).cloned())
    }

    async fn list_ticket_types_for_event(&self, event_id: EventId) -> Result<Vec<TicketType>> {
        let tables = self.tables.read().await;
        let mut types: Vec<_> = tables
            .ticket_types
            .values()
            .filter(|t| t.event_id == event_id)
            .cloned()
            .collect();
        types.sort_by_key(|t| (t.sort_order, t.created_at));
        Ok(types)
    }

    async fn increment_sold_count(&self, id: TicketTypeId, quantity: u32) -> Result<TicketType> {
        let mut tables = self.tables.write().await;
        let row = tables
            .ticket_types
            .get_mut(&id)
            .ok_or_else(|| TicketingError::not_found("ticket type", id))?;
        let available = row.available();
        if quantity > available {
            return Err(TicketingError::SoldOut {
                ticket_type_id: id,
                requested: quantity,
                available,
            });
        }
        row.sold_count += quantity;
        Ok(row.clone())
    }

    async fn decrement_sold_count(&self, id: TicketTypeId, quantity: u32) -> Result<()> {
        if let Some(row) = self.tables.write().await.ticket_types.get_mut(&id) {
            row.sold_count = row.sold_count.saturating_sub(quantity);
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn save_order(&self, order: &Order) -> Result<()> {
        self.tables.write().await.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn get_order_for_user(&self, id: OrderId, user_id: UserId) -> Result<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .get(&id)
            .filter(|o| tables.is_member(o.organization_id, user_id))
            .cloned())
    }

    async fn find_order_by_payment_id(&self, payment_id: &str) -> Result<Option<Order>> {
        Ok(self
            .tables
            .read()
            .await
            .orders
            .values()
            .find(|o| o.payment_id.as_deref() == Some(payment_id))
            .cloned())
    }

    async fn list_orders_for_event(&self, event_id: EventId) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<_> = tables
            .orders
            .values()
            .filter(|o| o.event_id == event_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn list_expired_pending_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<_> = tables
            .orders
            .values()
            .filter(|o| o.status == OrderStatus::Pending && o.expires_at <= now)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.expires_at);
        Ok(orders)
    }

    async fn count_orders_for_event(&self, event_id: EventId) -> Result<usize> {
        Ok(self
            .tables
            .read()
            .await
            .orders
            .values()
            .filter(|o| o.event_id == event_id)
            .count())
    }

    async fn list_paid_orders_for_organization_between(
        &self,
        organization_id: OrganizationId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<_> = tables.paid_between(organization_id, from, to).cloned().collect();
        orders.sort_by_key(|o| o.paid_at);
        Ok(orders)
    }

    async fn count_tickets_sold_between(
        &self,
        organization_id: OrganizationId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u32> {
        let tables = self.tables.read().await;
        Ok(tables
            .paid_between(organization_id, from, to)
            .map(Order::ticket_count)
            .fold(0, u32::saturating_add))
    }
}

#[async_trait]
impl TicketRepository for InMemoryStore {
    async fn insert_tickets(&self, tickets: &[Ticket]) -> Result<()> {
        let mut tables = self.tables.write().await;
        for ticket in tickets {
            tables.tickets.insert(ticket.id, ticket.clone());
        }
        Ok(())
    }

    async fn get_ticket(&self, id: TicketId) -> Result<Option<Ticket>> {
        Ok(self.tables.read().await.tickets.get(&id).cloned())
    }

    async fn list_tickets_for_order(&self, order_id: OrderId) -> Result<Vec<Ticket>> {
        let tables = self.tables.read().await;
        let mut tickets: Vec<_> = tables
            .tickets
            .values()
            .filter(|t| t.order_id == order_id)
            .cloned()
            .collect();
        tickets.sort_by_key(|t| (t.created_at, t.id.to_string()));
        Ok(tickets)
    }

    async fn mark_used(&self, id: TicketId, scanned_by: UserId, at: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.tickets.get_mut(&id) {
            Some(ticket) if ticket.status == TicketStatus::Valid => {
                ticket.status = TicketStatus::Used;
                ticket.used_at = Some(at);
                ticket.scanned_by = Some(scanned_by);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn cancel_tickets_for_order(&self, order_id: OrderId) -> Result<usize> {
        let mut tables = self.tables.write().await;
        let mut cancelled = 0;
        for ticket in tables
            .tickets
            .values_mut()
            .filter(|t| t.order_id == order_id && t.status == TicketStatus::Valid)
        {
            ticket.status = TicketStatus::Cancelled;
            cancelled += 1;
        }
        Ok(cancelled)
    }
}

#[async_trait]
impl InvoiceRepository for InMemoryStore {
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<Invoice> {
        let mut tables = self.tables.write().await;
        if tables.invoices.values().any(|i| {
            i.organization_id == invoice.organization_id
                && i.year == invoice.year
                && i.month == invoice.month
        }) {
            return Err(TicketingError::Conflict(format!(
                "Invoice for {}-{:02} already exists",
                invoice.year, invoice.month
            )));
        }
        let issued = tables
            .invoices
            .values()
            .filter(|i| i.year == invoice.year && i.month == invoice.month)
            .count();
        let sequence = u32::try_from(issued)
            .ok()
            .and_then(|n| n.checked_add(1))
            .ok_or_else(|| TicketingError::Internal("invoice sequence overflow".to_string()))?;
        let stored = Invoice {
            number: Invoice::number_for(invoice.year, invoice.month, sequence),
            ..invoice.clone()
        };
        tables.invoices.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_invoice_for_period(
        &self,
        organization_id: OrganizationId,
        year: i32,
        month: u32,
    ) -> Result<Option<Invoice>> {
        Ok(self
            .tables
            .read()
            .await
            .invoices
            .values()
            .find(|i| i.organization_id == organization_id && i.year == year && i.month == month)
            .cloned())
    }

    async fn list_invoices_for_organization(&self, organization_id: OrganizationId) -> Result<Vec<Invoice>> {
        let tables = self.tables.read().await;
        let mut invoices: Vec<_> = tables
            .invoices
            .values()
            .filter(|i| i.organization_id == organization_id)
            .cloned()
            .collect();
        invoices.sort_by(|a, b| (b.year, b.month).cmp(&(a.year, a.month)));
        Ok(invoices)
    }
}
