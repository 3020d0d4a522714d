//! Ticket issuing and door scanning.

use super::authorization::{Authorizer, Permission};
use super::authorized_event;
use crate::error::{Result, TicketingError};
use crate::repository::{EventRepository, OrderRepository, TicketRepository, TicketTypeRepository};
use crate::signing::{QrSigner, generate_ticket_secret};
use crate::types::{
    EventId, EventStatus, Order, OrderId, OrderStatus, Ticket, TicketId, TicketStatus, UserId,
};
use chrono::{DateTime, Utc};
use constant_time_eq::constant_time_eq;
use kassa_core::environment::Clock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A ticket together with the payload for its QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedTicket {
    /// The ticket
    pub ticket: Ticket,
    /// Signed QR payload
    pub qr_payload: String,
}

/// What the door scanner shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanOutcome {
    /// Admitted; the ticket is now USED
    Valid {
        /// Ticket
        ticket_id: TicketId,
        /// Ticket type name
        ticket_type: String,
    },
    /// Scanned before
    AlreadyUsed {
        /// Ticket
        ticket_id: TicketId,
        /// First scan
        used_at: Option<DateTime<Utc>>,
    },
    /// Genuine ticket for another event
    WrongEvent {
        /// Ticket
        ticket_id: TicketId,
    },
    /// The order was cancelled
    Cancelled {
        /// Ticket
        ticket_id: TicketId,
    },
    /// Forged, mangled or unknown
    Invalid,
}

/// Ticket issuing, QR payloads and scanning.
#[derive(Clone)]
pub struct TicketService {
    events: Arc<dyn EventRepository>,
    ticket_types: Arc<dyn TicketTypeRepository>,
    orders: Arc<dyn OrderRepository>,
    tickets: Arc<dyn TicketRepository>,
    authorizer: Authorizer,
    signer: QrSigner,
    clock: Arc<dyn Clock>,
}

impl TicketService {
    /// Creates a new `TicketService`
    #[must_use]
    pub fn new(
        events: Arc<dyn EventRepository>,
        ticket_types: Arc<dyn TicketTypeRepository>,
        orders: Arc<dyn OrderRepository>,
        tickets: Arc<dyn TicketRepository>,
        authorizer: Authorizer,
        signer: QrSigner,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            events,
            ticket_types,
            orders,
            tickets,
            authorizer,
            signer,
            clock,
        }
    }

    /// Signed QR payload for a ticket.
    #[must_use]
    pub fn qr_payload(&self, ticket: &Ticket) -> String {
        self.signer.sign(ticket.id, &ticket.secret)
    }

    fn with_payloads(&self, tickets: Vec<Ticket>) -> Vec<IssuedTicket> {
        tickets
            .into_iter()
            .map(|ticket| IssuedTicket {
                qr_payload: self.qr_payload(&ticket),
                ticket,
            })
            .collect()
    }

    /// Create one ticket per unit of a paid order. Calling it again for the
    /// same order returns the tickets issued the first time.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless the order is PAID.
    pub async fn issue_for_order(&self, order: &Order) -> Result<Vec<IssuedTicket>> {
        if order.status != OrderStatus::Paid {
            return Err(TicketingError::InvalidTransition(format!(
                "Tickets are only issued for paid orders (order {} is {:?})",
                order.id, order.status
            )));
        }
        let existing = self.tickets.list_tickets_for_order(order.id).await?;
        if !existing.is_empty() {
            return Ok(self.with_payloads(existing));
        }

        let now = self.clock.now();
        let tickets: Vec<Ticket> = order
            .items
            .iter()
            .flat_map(|item| (0..item.quantity).map(move |_| item.ticket_type_id))
            .map(|ticket_type_id| Ticket {
                id: TicketId::new(),
                order_id: order.id,
                event_id: order.event_id,
                ticket_type_id,
                organization_id: order.organization_id,
                secret: generate_ticket_secret(),
                status: TicketStatus::Valid,
                used_at: None,
                scanned_by: None,
                created_at: now,
            })
            .collect();
        self.tickets.insert_tickets(&tickets).await?;
        tracing::info!(order_id = %order.id, count = tickets.len(), "Tickets issued");
        Ok(self.with_payloads(tickets))
    }

    /// Cancel the order's valid tickets. Returns how many changed.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub async fn void_for_order(&self, order_id: OrderId) -> Result<usize> {
        let voided = self.tickets.cancel_tickets_for_order(order_id).await?;
        tracing::info!(order_id = %order_id, voided, "Tickets voided");
        Ok(voided)
    }

    /// Tickets of an order without authorization, for the buyer's receipt.
    pub(crate) async fn issued_tickets(&self, order_id: OrderId) -> Result<Vec<IssuedTicket>> {
        Ok(self.with_payloads(self.tickets.list_tickets_for_order(order_id).await?))
    }

    /// Tickets of an order, for members.
    ///
    /// # Errors
    ///
    /// `NotFound` for non-members, `Forbidden` for scanners.
    pub async fn list_for_order(&self, user_id: UserId, order_id: OrderId) -> Result<Vec<IssuedTicket>> {
        let order = self
            .orders
            .get_order_for_user(order_id, user_id)
            .await?
            .ok_or_else(|| TicketingError::not_found("order", order_id))?;
        self.authorizer
            .require(user_id, order.organization_id, Permission::ManageEvents)
            .await?;
        self.issued_tickets(order_id).await
    }

    /// Check a scanned QR payload in at `event_id`'s door.
    ///
    /// A valid ticket is flipped to USED atomically, so scanning the same
    /// code at two doors at once admits it only once.
    ///
    /// # Errors
    ///
    /// `NotFound`/`Forbidden` per the scanner's membership,
    /// `InvalidTransition` if the event is not LIVE. Bad tickets are not
    /// errors; they are reported in the [`ScanOutcome`].
    pub async fn scan(&self, user_id: UserId, event_id: EventId, payload: &str) -> Result<ScanOutcome> {
        let event = authorized_event(
            self.events.as_ref(),
            &self.authorizer,
            user_id,
            event_id,
            Permission::ScanTickets,
        )
        .await?;
        if event.status != EventStatus::Live {
            return Err(TicketingError::InvalidTransition(format!(
                "Cannot scan tickets for a {:?} event",
                event.status
            )));
        }

        let outcome = self.check(user_id, event_id, payload).await?;
        match &outcome {
            ScanOutcome::Valid { ticket_id, .. } => {
                tracing::info!(event_id = %event_id, ticket_id = %ticket_id, scanned_by = %user_id, "Ticket admitted");
            }
            other => {
                tracing::warn!(event_id = %event_id, scanned_by = %user_id, outcome = ?other, "Ticket rejected");
            }
        }
        Ok(outcome)
    }

    async fn check(&self, user_id: UserId, event_id: EventId, payload: &str) -> Result<ScanOutcome> {
        let Some(verified) = self.signer.verify(payload) else {
            return Ok(ScanOutcome::Invalid);
        };
        let Some(ticket) = self.tickets.get_ticket(verified.ticket_id).await? else {
            return Ok(ScanOutcome::Invalid);
        };
        if !constant_time_eq(ticket.secret.as_bytes(), verified.secret.as_bytes()) {
            return Ok(ScanOutcome::Invalid);
        }
        if ticket.event_id != event_id {
            return Ok(ScanOutcome::WrongEvent { ticket_id: ticket.id });
        }
        match ticket.status {
            TicketStatus::Cancelled => return Ok(ScanOutcome::Cancelled { ticket_id: ticket.id }),
            TicketStatus::Used => {
                return Ok(ScanOutcome::AlreadyUsed {
                    ticket_id: ticket.id,
                    used_at: ticket.used_at,
                });
            }
            TicketStatus::Valid => {}
        }

        if !self.tickets.mark_used(ticket.id, user_id, self.clock.now()).await? {
            // Lost the race against another scanner or a cancellation.
            let current = self.tickets.get_ticket(ticket.id).await?;
            return Ok(match current {
                Some(t) if t.status == TicketStatus::Cancelled => ScanOutcome::Cancelled { ticket_id: t.id },
                Some(t) => ScanOutcome::AlreadyUsed {
                    ticket_id: t.id,
                    used_at: t.used_at,
                },
                None => ScanOutcome::Invalid,
            });
        }

        let ticket_type = self
            .ticket_types
            .get_ticket_type(ticket.ticket_type_id)
            .await?
            .map(|t| t.name)
            .unwrap_or_default();
        Ok(ScanOutcome::Valid {
            ticket_id: ticket.id,
            ticket_type,
        })
    }
}
