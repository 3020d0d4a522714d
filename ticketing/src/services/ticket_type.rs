//! Ticket type management and public availability.

use super::authorization::{Authorizer, Permission};
use super::{authorized_event, required_text};
use crate::error::{Result, TicketingError};
use crate::pricing::VatRate;
use crate::repository::{EventRepository, TicketTypeRepository};
use crate::types::{Event, EventId, EventStatus, Money, TicketType, TicketTypeId, UserId};
use chrono::{DateTime, Utc};
use kassa_core::environment::Clock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Highest ticket price accepted (€10,000.00).
pub const MAX_TICKET_PRICE: Money = Money::from_cents(1_000_000);

/// Editable fields of a ticket type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketTypeInput {
    /// Display name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Price per ticket, VAT included
    pub price: Money,
    /// VAT rate contained in the price
    #[serde(default)]
    pub vat_rate: VatRate,
    /// Tickets available in total
    pub capacity: u32,
    /// Cap per order; defaults to 10, or the capacity if smaller
    pub max_per_order: Option<u32>,
    /// Sales open at; `None` opens at publication
    pub sales_start: Option<DateTime<Utc>>,
    /// Sales close at; `None` closes when the event ends
    pub sales_end: Option<DateTime<Utc>>,
    /// Position in listings
    #[serde(default)]
    pub sort_order: i32,
}

/// A ticket type as buyers see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicTicketType {
    /// Identifier
    pub id: TicketTypeId,
    /// Display name
    pub name: String,
    /// Description
    pub description: Option<String>,
    /// Price per ticket, VAT included
    pub price: Money,
    /// VAT rate in the price
    pub vat_rate: VatRate,
    /// Tickets left
    pub available: u32,
    /// Nothing left
    pub sold_out: bool,
    /// Inside the sales window right now
    pub on_sale: bool,
    /// Cap per order
    pub max_per_order: u32,
}

impl From<&TicketType> for PublicTicketType {
    fn from(t: &TicketType) -> Self {
        Self {
            id: t.id,
            name: t.name.clone(),
            description: t.description.clone(),
            price: t.price,
            vat_rate: t.vat_rate,
            available: t.available(),
            sold_out: t.is_sold_out(),
            on_sale: false,
            max_per_order: t.max_per_order,
        }
    }
}

fn validate(input: &TicketTypeInput) -> Result<(String, u32)> {
    let name = required_text("Ticket type name", &input.name, 100)?;
    if input.capacity == 0 {
        return Err(TicketingError::Validation(
            "Capacity must be at least 1".to_string(),
        ));
    }
    if input.price > MAX_TICKET_PRICE {
        return Err(TicketingError::Validation(format!(
            "Price cannot exceed {MAX_TICKET_PRICE}"
        )));
    }
    let max_per_order = input
        .max_per_order
        .unwrap_or_else(|| TicketType::DEFAULT_MAX_PER_ORDER.min(input.capacity));
    if max_per_order == 0 || max_per_order > input.capacity {
        return Err(TicketingError::Validation(format!(
            "Max per order must be between 1 and the capacity ({})",
            input.capacity
        )));
    }
    if let (Some(start), Some(end)) = (input.sales_start, input.sales_end) {
        if start >= end {
            return Err(TicketingError::Validation(
                "Sales must end after they start".to_string(),
            ));
        }
    }
    Ok((name, max_per_order))
}

fn ensure_editable(event: &Event) -> Result<()> {
    if matches!(event.status, EventStatus::Ended | EventStatus::Cancelled) {
        return Err(TicketingError::InvalidTransition(format!(
            "Ticket types of a {:?} event cannot change",
            event.status
        )));
    }
    Ok(())
}

/// Ticket type management.
#[derive(Clone)]
pub struct TicketTypeService {
    events: Arc<dyn EventRepository>,
    ticket_types: Arc<dyn TicketTypeRepository>,
    authorizer: Authorizer,
    clock: Arc<dyn Clock>,
}

impl TicketTypeService {
    /// Creates a new `TicketTypeService`
    #[must_use]
    pub fn new(
        events: Arc<dyn EventRepository>,
        ticket_types: Arc<dyn TicketTypeRepository>,
        authorizer: Authorizer,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            events,
            ticket_types,
            authorizer,
            clock,
        }
    }

    async fn authorized_type(&self, user_id: UserId, id: TicketTypeId) -> Result<(Event, TicketType)> {
        let ticket_type = self
            .ticket_types
            .get_ticket_type(id)
            .await?
            .ok_or_else(|| TicketingError::not_found("ticket type", id))?;
        let event = authorized_event(
            self.events.as_ref(),
            &self.authorizer,
            user_id,
            ticket_type.event_id,
            Permission::ManageEvents,
        )
        .await
        .map_err(|e| match e {
            TicketingError::NotFound { .. } => TicketingError::not_found("ticket type", id),
            other => other,
        })?;
        Ok((event, ticket_type))
    }

    /// Add a ticket type to a DRAFT or LIVE event.
    ///
    /// # Errors
    ///
    /// `Validation` for bad input, `InvalidTransition` for ended or
    /// cancelled events, `NotFound`/`Forbidden` per the caller's role.
    pub async fn create(&self, user_id: UserId, event_id: EventId, input: TicketTypeInput) -> Result<TicketType> {
        let event = authorized_event(
            self.events.as_ref(),
            &self.authorizer,
            user_id,
            event_id,
            Permission::ManageEvents,
        )
        .await?;
        ensure_editable(&event)?;
        let (name, max_per_order) = validate(&input)?;

        let ticket_type = TicketType {
            id: TicketTypeId::new(),
            event_id,
            organization_id: event.organization_id,
            name,
            description: input.description,
            price: input.price,
            vat_rate: input.vat_rate,
            capacity: input.capacity,
            sold_count: 0,
            max_per_order,
            sales_start: input.sales_start,
            sales_end: input.sales_end,
            sort_order: input.sort_order,
            created_at: self.clock.now(),
        };
        self.ticket_types.insert_ticket_type(&ticket_type).await?;
        tracing::info!(
            event_id = %event_id,
            ticket_type_id = %ticket_type.id,
            price_cents = ticket_type.price.cents(),
            capacity = ticket_type.capacity,
            "Ticket type created"
        );
        Ok(ticket_type)
    }

    /// Replace a ticket type's editable fields. Orders already placed keep
    /// the price they were placed at.
    ///
    /// # Errors
    ///
    /// As [`TicketTypeService::create`], plus `Conflict` if the capacity
    /// would drop below the tickets already sold.
    pub async fn update(&self, user_id: UserId, id: TicketTypeId, input: TicketTypeInput) -> Result<TicketType> {
        let (event, existing) = self.authorized_type(user_id, id).await?;
        ensure_editable(&event)?;
        let (name, max_per_order) = validate(&input)?;

        let updated = self
            .ticket_types
            .update_ticket_type(&TicketType {
                name,
                description: input.description,
                price: input.price,
                vat_rate: input.vat_rate,
                capacity: input.capacity,
                max_per_order,
                sales_start: input.sales_start,
                sales_end: input.sales_end,
                sort_order: input.sort_order,
                ..existing
            })
            .await?;
        tracing::info!(ticket_type_id = %id, capacity = updated.capacity, "Ticket type updated");
        Ok(updated)
    }

    /// Remove a ticket type nobody bought.
    ///
    /// # Errors
    ///
    /// `Conflict` if tickets were sold.
    pub async fn delete(&self, user_id: UserId, id: TicketTypeId) -> Result<()> {
        let (event, _) = self.authorized_type(user_id, id).await?;
        ensure_editable(&event)?;
        self.ticket_types.delete_ticket_type(id).await?;
        tracing::info!(ticket_type_id = %id, event_id = %event.id, "Ticket type deleted");
        Ok(())
    }

    /// The event's ticket types, for any member.
    ///
    /// # Errors
    ///
    /// `NotFound` for non-members.
    pub async fn list(&self, user_id: UserId, event_id: EventId) -> Result<Vec<TicketType>> {
        authorized_event(
            self.events.as_ref(),
            &self.authorizer,
            user_id,
            event_id,
            Permission::ViewEvents,
        )
        .await?;
        self.ticket_types.list_ticket_types_for_event(event_id).await
    }

    /// What buyers see for a LIVE event.
    ///
    /// # Errors
    ///
    /// `NotFound` unless the event is LIVE.
    pub async fn public_availability(&self, event_id: EventId) -> Result<Vec<PublicTicketType>> {
        let event = self
            .events
            .get_event(event_id)
            .await?
            .filter(|e| e.status == EventStatus::Live)
            .ok_or_else(|| TicketingError::not_found("event", event_id))?;
        let now = self.clock.now();
        Ok(self
            .ticket_types
            .list_ticket_types_for_event(event.id)
            .await?
            .iter()
            .map(|t| PublicTicketType {
                on_sale: t.on_sale_at(now) && now < event.ends_at,
                ..PublicTicketType::from(t)
            })
            .collect())
    }
}
