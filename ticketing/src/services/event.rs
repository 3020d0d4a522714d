//! Event management, public listings and sales figures.

use super::authorization::{Authorizer, Permission};
use super::order::OrderService;
use super::payments::PaymentConnections;
use super::ticket_type::{PublicTicketType, TicketTypeService};
use super::{authorized_event, slug_candidate, slugify};
use crate::aggregates::{
    EventAction, EventChanges, EventEffect, EventEnvironment, EventReducer, EventState,
};
use crate::error::{Result, TicketingError};
use crate::repository::{EventRepository, OrderRepository, OrganizationRepository, TicketTypeRepository};
use crate::types::{
    Event, EventId, EventStatus, FeeOverride, Money, OrderStatus, OrganizationId, TicketTypeId,
    UserId,
};
use chrono::{DateTime, Utc};
use kassa_core::SmallVec;
use kassa_core::environment::Clock;
use kassa_core::reducer::Reducer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

const MAX_SLUG_ATTEMPTS: u32 = 50;

/// Details for a new event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    /// Title
    pub title: String,
    /// Description
    pub description: Option<String>,
    /// Venue
    pub venue: Option<String>,
    /// Start
    pub starts_at: DateTime<Utc>,
    /// End
    pub ends_at: DateTime<Utc>,
}

/// A LIVE event as buyers see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicEvent {
    /// Identifier
    pub id: EventId,
    /// Title
    pub title: String,
    /// URL slug
    pub slug: String,
    /// Description
    pub description: Option<String>,
    /// Venue
    pub venue: Option<String>,
    /// Start
    pub starts_at: DateTime<Utc>,
    /// End
    pub ends_at: DateTime<Utc>,
    /// Organizer name
    pub organizer: String,
    /// What is for sale
    pub ticket_types: Vec<PublicTicketType>,
}

/// Sales of one ticket type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketTypeSales {
    /// Ticket type
    pub ticket_type_id: TicketTypeId,
    /// Name
    pub name: String,
    /// Capacity
    pub capacity: u32,
    /// Tickets in PAID orders
    pub sold: u32,
    /// Tickets held by PENDING orders
    pub reserved: u32,
    /// Tickets still available
    pub available: u32,
    /// Ticket revenue from PAID orders, VAT included
    pub revenue: Money,
}

/// Sales of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesSummary {
    /// Event
    pub event_id: EventId,
    /// PAID orders
    pub paid_orders: usize,
    /// PENDING orders
    pub pending_orders: usize,
    /// Tickets in PAID orders
    pub tickets_sold: u32,
    /// Ticket revenue from PAID orders, VAT included
    pub revenue: Money,
    /// Per ticket type, in listing order
    pub ticket_types: Vec<TicketTypeSales>,
}

/// Event management.
#[derive(Clone)]
pub struct EventService {
    events: Arc<dyn EventRepository>,
    organizations: Arc<dyn OrganizationRepository>,
    ticket_types: Arc<dyn TicketTypeRepository>,
    orders: Arc<dyn OrderRepository>,
    order_service: OrderService,
    ticket_type_service: TicketTypeService,
    payments: PaymentConnections,
    authorizer: Authorizer,
    clock: Arc<dyn Clock>,
    reducer: EventReducer,
    env: EventEnvironment,
}

impl EventService {
    /// Creates a new `EventService`
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        events: Arc<dyn EventRepository>,
        organizations: Arc<dyn OrganizationRepository>,
        ticket_types: Arc<dyn TicketTypeRepository>,
        orders: Arc<dyn OrderRepository>,
        order_service: OrderService,
        ticket_type_service: TicketTypeService,
        payments: PaymentConnections,
        authorizer: Authorizer,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            events,
            organizations,
            ticket_types,
            orders,
            order_service,
            ticket_type_service,
            payments,
            authorizer,
            env: EventEnvironment::new(clock.clone()),
            clock,
            reducer: EventReducer::new(),
        }
    }

    // ═══════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════

    /// Create a DRAFT event. The slug comes from the title, suffixed with
    /// `-2`, `-3`, ... while taken.
    ///
    /// # Errors
    ///
    /// `Validation` for a bad title or schedule, `NotFound`/`Forbidden` per
    /// the caller's role.
    pub async fn create(&self, user_id: UserId, organization_id: OrganizationId, new: NewEvent) -> Result<Event> {
        self.authorizer
            .require(user_id, organization_id, Permission::ManageEvents)
            .await?;
        let base = slugify(&new.title, "event");
        let id = EventId::new();

        for attempt in 1..=MAX_SLUG_ATTEMPTS {
            let slug = slug_candidate(&base, attempt);
            if self.events.event_slug_exists(&slug).await? {
                continue;
            }
            let action = EventAction::Create {
                id,
                organization_id,
                title: new.title.clone(),
                slug,
                description: optional_text(new.description.clone()),
                venue: optional_text(new.venue.clone()),
                starts_at: new.starts_at,
                ends_at: new.ends_at,
                created_by: user_id,
            };
            match self.apply(EventState::new(), action, TicketingError::Validation).await {
                Ok(event) => {
                    tracing::info!(
                        event_id = %event.id,
                        organization_id = %organization_id,
                        slug = %event.slug,
                        "Event created"
                    );
                    return Ok(event);
                }
                // Slug taken in between; try the next one.
                Err(TicketingError::Conflict(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Err(TicketingError::Conflict(format!(
            "Could not find a free slug for {}",
            new.title
        )))
    }

    /// Change details of a DRAFT or LIVE event.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` for ended or cancelled events, `Validation` for
    /// bad changes.
    pub async fn update(&self, user_id: UserId, event_id: EventId, changes: EventChanges) -> Result<Event> {
        let event = self.managed_event(user_id, event_id).await?;
        if !matches!(event.status, EventStatus::Draft | EventStatus::Live) {
            return Err(TicketingError::InvalidTransition(format!(
                "Cannot update a {:?} event",
                event.status
            )));
        }
        let changes = EventChanges {
            description: changes.description.map(optional_text),
            venue: changes.venue.map(optional_text),
            ..changes
        };
        let event = self
            .apply(
                EventState::with_event(event),
                EventAction::Update { changes },
                TicketingError::Validation,
            )
            .await?;
        tracing::info!(event_id = %event_id, updated_by = %user_id, "Event updated");
        Ok(event)
    }

    /// Put a DRAFT event on sale.
    ///
    /// Needs at least one ticket type, and a Mollie account that can take
    /// payments if any ticket type has a price.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` when a precondition is not met.
    pub async fn publish(&self, user_id: UserId, event_id: EventId) -> Result<Event> {
        let event = self.managed_event(user_id, event_id).await?;
        let ticket_types = self.ticket_types.list_ticket_types_for_event(event_id).await?;
        let has_paid_ticket_types = ticket_types.iter().any(|t| !t.is_free());
        let payments_enabled = if has_paid_ticket_types {
            self.payments.payments_enabled(event.organization_id).await?
        } else {
            false
        };
        let event = self
            .apply(
                EventState::with_event(event),
                EventAction::Publish {
                    ticket_type_count: ticket_types.len(),
                    has_paid_ticket_types,
                    payments_enabled,
                },
                TicketingError::InvalidTransition,
            )
            .await?;
        tracing::info!(event_id = %event_id, published_by = %user_id, "Event published");
        Ok(event)
    }

    /// Close a LIVE event.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless the event is LIVE.
    pub async fn end(&self, user_id: UserId, event_id: EventId) -> Result<Event> {
        let event = self.managed_event(user_id, event_id).await?;
        let event = self
            .apply(EventState::with_event(event), EventAction::End, TicketingError::InvalidTransition)
            .await?;
        tracing::info!(event_id = %event_id, "Event ended");
        Ok(event)
    }

    /// Call off a DRAFT or LIVE event, cancelling and refunding its orders.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` for ended or cancelled events.
    pub async fn cancel(&self, user_id: UserId, event_id: EventId) -> Result<Event> {
        let event = self.managed_event(user_id, event_id).await?;
        let event = self
            .apply(EventState::with_event(event), EventAction::Cancel, TicketingError::InvalidTransition)
            .await?;
        tracing::info!(event_id = %event_id, cancelled_by = %user_id, "Event cancelled");
        Ok(event)
    }

    /// Remove a DRAFT event that never had orders.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless DRAFT, `Conflict` if orders exist.
    pub async fn delete(&self, user_id: UserId, event_id: EventId) -> Result<()> {
        let event = self.managed_event(user_id, event_id).await?;
        if event.status != EventStatus::Draft {
            return Err(TicketingError::InvalidTransition(
                "Only draft events can be deleted; cancel it instead".to_string(),
            ));
        }
        if self.orders.count_orders_for_event(event_id).await? > 0 {
            return Err(TicketingError::Conflict(
                "Event has orders and cannot be deleted".to_string(),
            ));
        }
        self.events.delete_event(event_id).await?;
        tracing::info!(event_id = %event_id, deleted_by = %user_id, "Event deleted");
        Ok(())
    }

    /// Set or clear the fee override. Platform admins only.
    ///
    /// Passing `None` for both fields clears the override.
    ///
    /// # Errors
    ///
    /// `Forbidden` for anyone but platform admins, `Validation` for a
    /// platform fee above 100%.
    pub async fn set_fee_override(
        &self,
        admin_id: UserId,
        event_id: EventId,
        platform_fee_bp: Option<u32>,
        overage_fee_per_ticket: Option<Money>,
    ) -> Result<Event> {
        self.authorizer.require_platform_admin(admin_id).await?;
        let event = self
            .events
            .get_event(event_id)
            .await?
            .ok_or_else(|| TicketingError::not_found("event", event_id))?;
        let fee_override = (platform_fee_bp.is_some() || overage_fee_per_ticket.is_some()).then(|| {
            FeeOverride {
                platform_fee_bp,
                overage_fee_per_ticket,
                set_by: admin_id,
                set_at: self.clock.now(),
            }
        });
        let event = self
            .apply(
                EventState::with_event(event),
                EventAction::SetFeeOverride { fee_override },
                TicketingError::Validation,
            )
            .await?;
        tracing::info!(
            event_id = %event_id,
            admin_id = %admin_id,
            platform_fee_bp = ?platform_fee_bp,
            overage_fee_cents = ?overage_fee_per_ticket.as_ref().map(Money::cents),
            "Fee override changed"
        );
        Ok(event)
    }

    /// End every LIVE event whose end time is at or before `now`. Returns
    /// how many were ended.
    ///
    /// # Errors
    ///
    /// Returns error if the listing fails; individual failures are logged.
    pub async fn end_past_events(&self, now: DateTime<Utc>) -> Result<usize> {
        let past: Vec<Event> = self
            .events
            .list_events_by_status(EventStatus::Live)
            .await?
            .into_iter()
            .filter(|e| e.ends_at <= now)
            .collect();
        let mut ended = 0;
        for event in past {
            let event_id = event.id;
            match self
                .apply(EventState::with_event(event), EventAction::End, TicketingError::InvalidTransition)
                .await
            {
                Ok(_) => ended += 1,
                Err(e) => tracing::warn!(event_id = %event_id, error = %e, "Could not end event"),
            }
        }
        if ended > 0 {
            tracing::info!(ended, "Past events ended");
        }
        Ok(ended)
    }

    // ═══════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════

    /// Load an event, for any member.
    ///
    /// # Errors
    ///
    /// `NotFound` for non-members.
    pub async fn get(&self, user_id: UserId, event_id: EventId) -> Result<Event> {
        authorized_event(
            self.events.as_ref(),
            &self.authorizer,
            user_id,
            event_id,
            Permission::ViewEvents,
        )
        .await
    }

    /// The organization's events by start time, for any member.
    ///
    /// # Errors
    ///
    /// `NotFound` for non-members.
    pub async fn list(&self, user_id: UserId, organization_id: OrganizationId) -> Result<Vec<Event>> {
        self.authorizer
            .require(user_id, organization_id, Permission::ViewEvents)
            .await?;
        self.events.list_events_for_organization(organization_id).await
    }

    /// A LIVE event by slug, with its ticket types.
    ///
    /// # Errors
    ///
    /// `NotFound` unless a LIVE event has the slug.
    pub async fn get_public_event(&self, slug: &str) -> Result<PublicEvent> {
        let event = self
            .events
            .get_event_by_slug(slug)
            .await?
            .filter(|e| e.status == EventStatus::Live)
            .ok_or_else(|| TicketingError::not_found("event", slug))?;
        self.public_view(event).await
    }

    /// Every LIVE event that has not ended yet, soonest first.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub async fn list_public_events(&self) -> Result<Vec<PublicEvent>> {
        let now = self.clock.now();
        let live = self.events.list_events_by_status(EventStatus::Live).await?;
        let mut listed = Vec::with_capacity(live.len());
        for event in live.into_iter().filter(|e| e.ends_at > now) {
            listed.push(self.public_view(event).await?);
        }
        Ok(listed)
    }

    async fn public_view(&self, event: Event) -> Result<PublicEvent> {
        let organizer = self
            .organizations
            .get_organization(event.organization_id)
            .await?
            .map(|o| o.name)
            .unwrap_or_default();
        let ticket_types = self.ticket_type_service.public_availability(event.id).await?;
        Ok(PublicEvent {
            id: event.id,
            title: event.title,
            slug: event.slug,
            description: event.description,
            venue: event.venue,
            starts_at: event.starts_at,
            ends_at: event.ends_at,
            organizer,
            ticket_types,
        })
    }

    /// Sold, reserved and revenue per ticket type.
    ///
    /// # Errors
    ///
    /// `NotFound`/`Forbidden` per the caller's role.
    pub async fn sales_summary(&self, user_id: UserId, event_id: EventId) -> Result<SalesSummary> {
        self.managed_event(user_id, event_id).await?;
        let ticket_types = self.ticket_types.list_ticket_types_for_event(event_id).await?;
        let orders = self.orders.list_orders_for_event(event_id).await?;

        let mut per_type: HashMap<TicketTypeId, (u32, u32, Money)> = HashMap::new();
        let mut paid_orders = 0;
        let mut pending_orders = 0;
        for order in &orders {
            match order.status {
                OrderStatus::Paid => paid_orders += 1,
                OrderStatus::Pending => pending_orders += 1,
                OrderStatus::Cancelled | OrderStatus::Failed => continue,
            }
            for item in &order.items {
                let entry = per_type.entry(item.ticket_type_id).or_insert((0, 0, Money::ZERO));
                if order.status == OrderStatus::Paid {
                    entry.0 = entry.0.saturating_add(item.quantity);
                    entry.2 = item
                        .line_total()
                        .and_then(|line| entry.2.checked_add(line))
                        .ok_or_else(overflow)?;
                } else {
                    entry.1 = entry.1.saturating_add(item.quantity);
                }
            }
        }

        let mut summary = SalesSummary {
            event_id,
            paid_orders,
            pending_orders,
            tickets_sold: 0,
            revenue: Money::ZERO,
            ticket_types: Vec::with_capacity(ticket_types.len()),
        };
        for ticket_type in ticket_types {
            let (sold, reserved, revenue) = per_type
                .get(&ticket_type.id)
                .copied()
                .unwrap_or((0, 0, Money::ZERO));
            summary.tickets_sold = summary.tickets_sold.saturating_add(sold);
            summary.revenue = summary.revenue.checked_add(revenue).ok_or_else(overflow)?;
            summary.ticket_types.push(TicketTypeSales {
                ticket_type_id: ticket_type.id,
                available: ticket_type.available(),
                name: ticket_type.name,
                capacity: ticket_type.capacity,
                sold,
                reserved,
                revenue,
            });
        }
        Ok(summary)
    }

    // ═══════════════════════════════════════════════════════════
    // Helpers
    // ═══════════════════════════════════════════════════════════

    async fn managed_event(&self, user_id: UserId, event_id: EventId) -> Result<Event> {
        authorized_event(
            self.events.as_ref(),
            &self.authorizer,
            user_id,
            event_id,
            Permission::ManageEvents,
        )
        .await
    }

    /// Run a command; a rejection becomes `rejected(reason)`.
    async fn apply(
        &self,
        mut state: EventState,
        action: EventAction,
        rejected: fn(String) -> TicketingError,
    ) -> Result<Event> {
        let effects = self.reducer.reduce(&mut state, action, &self.env);
        if let Some(error) = state.last_error {
            return Err(rejected(error));
        }
        let event = state
            .event
            .ok_or_else(|| TicketingError::Internal("event reducer produced no event".to_string()))?;
        self.execute(&event, effects).await?;
        Ok(event)
    }

    async fn execute(&self, event: &Event, effects: SmallVec<[EventEffect; 4]>) -> Result<()> {
        for effect in effects {
            match effect {
                EventEffect::Persist => self.events.save_event(event).await?,
                EventEffect::CancelOpenOrders { event_id } => {
                    self.order_service.cancel_open_orders_for_event(event_id).await?;
                }
            }
        }
        Ok(())
    }
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn overflow() -> TicketingError {
    TicketingError::Internal("revenue overflow".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_optional_text_is_dropped() {
        assert_eq!(optional_text(Some("  Paradiso ".into())).as_deref(), Some("Paradiso"));
        assert_eq!(optional_text(Some("   ".into())), None);
        assert_eq!(optional_text(None), None);
    }
}
