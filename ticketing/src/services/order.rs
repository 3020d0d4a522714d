//! Checkout, payment webhooks and order lifecycle.
//!
//! ```text
//! create_order ──reserve──▶ PENDING ──webhook: paid──▶ PAID ──▶ tickets
//!                              │
//!                              ├──webhook: failed──▶ FAILED     (capacity released)
//!                              ├──webhook: canceled/expired,
//!                              │  cancel, expiry sweep ──▶ CANCELLED (capacity released)
//! ```

use super::authorization::{Authorizer, Permission};
use super::fee::FeeService;
use super::ticket::{IssuedTicket, TicketService};
use super::{authorized_event, normalize_email, required_text};
use crate::aggregates::{OrderAction, OrderEffect, OrderEnvironment, OrderReducer, OrderState};
use crate::error::{Result, TicketingError};
use crate::pricing::QuoteLine;
use crate::repository::{EventRepository, OrderRepository, OrganizationRepository, TicketTypeRepository};
use crate::types::{
    Buyer, Event, EventId, EventStatus, Money, Order, OrderId, OrderItem, OrderStatus, TicketType,
    TicketTypeId, UserId,
};
use chrono::{DateTime, Duration, Utc};
use kassa_core::SmallVec;
use kassa_core::environment::Clock;
use kassa_core::reducer::Reducer;
use kassa_payments::{
    ApplicationFee, CreatePaymentRequest, MollieAmount, MollieConnectService, PaymentStatus,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// One line of a checkout request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutItem {
    /// Ticket type to buy
    pub ticket_type_id: TicketTypeId,
    /// How many
    pub quantity: u32,
}

/// A buyer's checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Event to buy for
    pub event_id: EventId,
    /// Buyer's name
    pub buyer_name: String,
    /// Buyer's e-mail
    pub buyer_email: String,
    /// Lines; repeated ticket types are merged
    pub items: Vec<CheckoutItem>,
}

/// Outcome of a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutResult {
    /// The order
    pub order: Order,
    /// Where to send the buyer to pay; `None` for free orders
    pub checkout_url: Option<String>,
    /// Tickets, for free orders that are paid right away
    pub tickets: Vec<IssuedTicket>,
}

/// What the buyer sees after checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReceipt {
    /// Order
    pub order_id: OrderId,
    /// Status
    pub status: OrderStatus,
    /// Event title
    pub event_title: String,
    /// Event start
    pub starts_at: DateTime<Utc>,
    /// Lines
    pub items: Vec<OrderItem>,
    /// Tickets, VAT included
    pub ticket_total: Money,
    /// Service fee, VAT included
    pub service_fee: Money,
    /// Amount paid or due
    pub total: Money,
    /// Payment page while the order is pending
    pub checkout_url: Option<String>,
    /// Tickets once paid
    pub tickets: Vec<IssuedTicket>,
}

/// Order handling.
#[derive(Clone)]
pub struct OrderService {
    events: Arc<dyn EventRepository>,
    organizations: Arc<dyn OrganizationRepository>,
    ticket_types: Arc<dyn TicketTypeRepository>,
    orders: Arc<dyn OrderRepository>,
    fees: FeeService,
    tickets: TicketService,
    payments: Arc<MollieConnectService>,
    authorizer: Authorizer,
    clock: Arc<dyn Clock>,
    reducer: OrderReducer,
    env: OrderEnvironment,
    order_ttl: Duration,
    public_base_url: String,
    // Serializes status transitions so concurrent webhooks, cancels and
    // sweeps never act on a stale copy of the same order.
    transitions: Arc<Mutex<()>>,
}

impl OrderService {
    /// Creates a new `OrderService`
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        events: Arc<dyn EventRepository>,
        organizations: Arc<dyn OrganizationRepository>,
        ticket_types: Arc<dyn TicketTypeRepository>,
        orders: Arc<dyn OrderRepository>,
        fees: FeeService,
        tickets: TicketService,
        payments: Arc<MollieConnectService>,
        authorizer: Authorizer,
        clock: Arc<dyn Clock>,
        order_ttl: Duration,
        public_base_url: String,
    ) -> Self {
        Self {
            events,
            organizations,
            ticket_types,
            orders,
            fees,
            tickets,
            payments,
            authorizer,
            env: OrderEnvironment::new(clock.clone()),
            clock,
            reducer: OrderReducer::new(),
            order_ttl,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            transitions: Arc::new(Mutex::new(())),
        }
    }

    // ═══════════════════════════════════════════════════════════
    // Checkout
    // ═══════════════════════════════════════════════════════════

    /// Place an order for a LIVE event.
    ///
    /// Capacity is reserved per line; if a later line is sold out the
    /// earlier reservations are released again. Free orders are paid
    /// immediately. Paid orders get a Mollie payment on the organization's
    /// account, with the platform's share as application fee.
    ///
    /// # Errors
    ///
    /// - `Validation` for bad buyer details, quantities or closed sales windows
    /// - `NotFound` for unknown events or ticket types
    /// - `InvalidTransition` if the event is not on sale
    /// - `SoldOut` if a ticket type has too few tickets left
    /// - `Payment` if the payment cannot be created (the order is then FAILED)
    pub async fn create_order(&self, request: CheckoutRequest) -> Result<CheckoutResult> {
        let buyer = Buyer {
            name: required_text("Buyer name", &request.buyer_name, 100)?,
            email: normalize_email(&request.buyer_email)?,
        };
        let lines = merge_items(&request.items)?;
        let now = self.clock.now();

        let event = self
            .events
            .get_event(request.event_id)
            .await?
            .ok_or_else(|| TicketingError::not_found("event", request.event_id))?;
        if event.status != EventStatus::Live || event.ends_at <= now {
            return Err(TicketingError::InvalidTransition(format!(
                "Event {} is not on sale",
                event.id
            )));
        }

        let mut items = Vec::with_capacity(lines.len());
        for &(ticket_type_id, quantity) in &lines {
            let ticket_type = self.sellable_type(&event, ticket_type_id, quantity, now).await?;
            items.push(OrderItem {
                ticket_type_id,
                name: ticket_type.name,
                quantity,
                unit_price: ticket_type.price,
                vat_rate: ticket_type.vat_rate,
            });
        }

        let organization = self
            .organizations
            .get_organization(event.organization_id)
            .await?
            .ok_or_else(|| TicketingError::not_found("organization", event.organization_id))?;
        let quote_lines: Vec<QuoteLine> = items
            .iter()
            .map(|i| QuoteLine {
                unit_price: i.unit_price,
                quantity: i.quantity,
                vat_rate: i.vat_rate,
            })
            .collect();
        let priced = self.fees.quote(&organization, &event, &quote_lines, now).await?;

        self.reserve(&lines).await?;

        let order = Order {
            id: OrderId::new(),
            organization_id: event.organization_id,
            event_id: event.id,
            buyer,
            items,
            ticket_total: priced.ticket_total,
            service_fee: priced.service_fee.total,
            total: priced.total,
            platform_fee: priced.charges.platform_fee,
            overage_tickets: priced.charges.overage_tickets,
            overage_fee: priced.charges.overage_fee,
            status: OrderStatus::Pending,
            payment_id: None,
            checkout_url: None,
            created_at: now,
            expires_at: now + self.order_ttl,
            paid_at: None,
            closed_at: None,
            refunded_at: None,
        };
        let order = match self.apply(OrderState::new(), OrderAction::Place { order }).await {
            Ok(order) => order,
            Err(e) => {
                self.release(&lines).await;
                return Err(e);
            }
        };
        if !self.on_sale(event.id).await? {
            // The event was cancelled or ended while the order was placed.
            self.withdraw(order.id).await?;
            return Err(TicketingError::InvalidTransition(format!(
                "Event {} is not on sale",
                event.id
            )));
        }
        tracing::info!(
            order_id = %order.id,
            event_id = %order.event_id,
            tickets = order.ticket_count(),
            total_cents = order.total.cents(),
            "Order placed"
        );

        if order.is_free() {
            let order = self
                .apply(OrderState::with_order(order), OrderAction::MarkPaid { payment_id: None })
                .await?;
            let tickets = self.tickets.issued_tickets(order.id).await?;
            return Ok(CheckoutResult {
                order,
                checkout_url: None,
                tickets,
            });
        }

        let payment_request = CreatePaymentRequest {
            amount: MollieAmount::eur(order.total),
            description: format!("{} ({} tickets)", event.title, order.ticket_count()),
            redirect_url: format!("{}/orders/{}", self.public_base_url, order.id),
            webhook_url: Some(format!("{}/api/webhooks/mollie", self.public_base_url)),
            metadata: serde_json::json!({ "order_id": order.id }),
            application_fee: (!priced.application_fee.is_zero()).then(|| ApplicationFee {
                amount: MollieAmount::eur(priced.application_fee),
                description: format!("Kassa fees for order {}", order.id),
            }),
            testmode: self.payments.config().testmode,
        };

        match self
            .payments
            .create_payment(order.organization_id, &payment_request)
            .await
        {
            Ok(payment) => {
                let mut order = order;
                order.payment_id = Some(payment.id);
                order.checkout_url.clone_from(&payment.checkout_url);
                self.orders.save_order(&order).await?;
                Ok(CheckoutResult {
                    checkout_url: payment.checkout_url,
                    order,
                    tickets: Vec::new(),
                })
            }
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "Payment creation failed; failing order");
                self.apply(OrderState::with_order(order), OrderAction::MarkFailed)
                    .await?;
                Err(e.into())
            }
        }
    }

    async fn sellable_type(
        &self,
        event: &Event,
        ticket_type_id: TicketTypeId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<TicketType> {
        let ticket_type = self
            .ticket_types
            .get_ticket_type(ticket_type_id)
            .await?
            .filter(|t| t.event_id == event.id)
            .ok_or_else(|| TicketingError::not_found("ticket type", ticket_type_id))?;
        if !ticket_type.on_sale_at(now) {
            return Err(TicketingError::Validation(format!(
                "{} is not on sale right now",
                ticket_type.name
            )));
        }
        if quantity > ticket_type.max_per_order {
            return Err(TicketingError::Validation(format!(
                "At most {} {} tickets per order",
                ticket_type.max_per_order, ticket_type.name
            )));
        }
        Ok(ticket_type)
    }

    async fn reserve(&self, lines: &[(TicketTypeId, u32)]) -> Result<()> {
        for (done, &(ticket_type_id, quantity)) in lines.iter().enumerate() {
            if let Err(e) = self
                .ticket_types
                .increment_sold_count(ticket_type_id, quantity)
                .await
            {
                self.release(&lines[..done]).await;
                tracing::warn!(ticket_type_id = %ticket_type_id, quantity, error = %e, "Reservation failed");
                return Err(e);
            }
        }
        Ok(())
    }

    async fn release(&self, lines: &[(TicketTypeId, u32)]) {
        for &(ticket_type_id, quantity) in lines {
            if let Err(e) = self
                .ticket_types
                .decrement_sold_count(ticket_type_id, quantity)
                .await
            {
                tracing::error!(
                    ticket_type_id = %ticket_type_id,
                    quantity,
                    error = %e,
                    "Failed to release capacity"
                );
            }
        }
    }

    // ═══════════════════════════════════════════════════════════
    // Payment webhook
    // ═══════════════════════════════════════════════════════════

    /// Bring an order in line with its Mollie payment.
    ///
    /// Safe to call any number of times for the same payment. A payment that
    /// succeeds after its order was cancelled or failed is refunded.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown payments, `Payment` if Mollie cannot be
    /// reached, `Conflict` if the paid amount differs from the order total.
    pub async fn handle_payment_webhook(&self, payment_id: &str) -> Result<Order> {
        let _guard = self.transitions.lock().await;
        let order = self
            .orders
            .find_order_by_payment_id(payment_id)
            .await?
            .ok_or_else(|| TicketingError::not_found("payment", payment_id))?;
        let payment = self
            .payments
            .get_payment(order.organization_id, payment_id)
            .await?;
        tracing::debug!(
            order_id = %order.id,
            payment_id = %payment_id,
            payment_status = ?payment.status,
            order_status = ?order.status,
            "Payment webhook"
        );

        match (payment.status, order.status) {
            (PaymentStatus::Paid, OrderStatus::Pending) => {
                let paid = payment.amount.to_money()?;
                if paid != order.total {
                    tracing::error!(
                        order_id = %order.id,
                        paid_cents = paid.cents(),
                        total_cents = order.total.cents(),
                        "Paid amount does not match order total"
                    );
                    return Err(TicketingError::Conflict(format!(
                        "Payment {payment_id} is for {paid}, order total is {}",
                        order.total
                    )));
                }
                if self.event_cancelled(order.event_id).await? {
                    tracing::warn!(
                        order_id = %order.id,
                        payment_id = %payment_id,
                        "Payment completed for an order of a cancelled event; refunding"
                    );
                    let mut order = self
                        .apply(OrderState::with_order(order), OrderAction::Cancel)
                        .await?;
                    let amount = order.total;
                    self.refund(&mut order, payment_id, amount).await?;
                    return Ok(order);
                }
                let order = self
                    .apply(
                        OrderState::with_order(order),
                        OrderAction::MarkPaid {
                            payment_id: Some(payment.id),
                        },
                    )
                    .await?;
                tracing::info!(order_id = %order.id, "Order paid");
                Ok(order)
            }
            (PaymentStatus::Paid, OrderStatus::Paid) => {
                // Retries finish ticket issuing that failed after the order was marked paid.
                self.tickets.issue_for_order(&order).await?;
                Ok(order)
            }
            (PaymentStatus::Paid, OrderStatus::Cancelled | OrderStatus::Failed) => {
                if order.refunded_at.is_some() {
                    return Ok(order);
                }
                tracing::warn!(
                    order_id = %order.id,
                    payment_id = %payment_id,
                    "Payment completed for a closed order; refunding"
                );
                let mut order = order;
                let amount = order.total;
                self.refund(&mut order, payment_id, amount).await?;
                Ok(order)
            }
            (PaymentStatus::Failed, OrderStatus::Pending) => {
                self.apply(OrderState::with_order(order), OrderAction::MarkFailed)
                    .await
            }
            (PaymentStatus::Canceled | PaymentStatus::Expired, OrderStatus::Pending) => {
                self.apply(OrderState::with_order(order), OrderAction::Cancel)
                    .await
            }
            _ => Ok(order),
        }
    }

    // ═══════════════════════════════════════════════════════════
    // Cancellation and expiry
    // ═══════════════════════════════════════════════════════════

    /// Cancel an order, refunding it if it was paid. ADMIN only.
    ///
    /// Cancelling an already cancelled order whose refund failed retries
    /// the refund.
    ///
    /// # Errors
    ///
    /// `NotFound`/`Forbidden` per the caller's role, `InvalidTransition`
    /// for orders that cannot be cancelled, `Payment` if the refund fails.
    pub async fn cancel_order(&self, user_id: UserId, order_id: OrderId) -> Result<Order> {
        let _guard = self.transitions.lock().await;
        let order = self
            .orders
            .get_order_for_user(order_id, user_id)
            .await?
            .ok_or_else(|| TicketingError::not_found("order", order_id))?;
        self.authorizer
            .require(user_id, order.organization_id, Permission::ManageOrganization)
            .await?;

        if order.status == OrderStatus::Cancelled && order.paid_at.is_some() && order.refunded_at.is_none() {
            if let Some(payment_id) = order.payment_id.clone() {
                let mut order = order;
                let amount = order.total;
                self.refund(&mut order, &payment_id, amount).await?;
                return Ok(order);
            }
        }

        let order = self
            .apply(OrderState::with_order(order), OrderAction::Cancel)
            .await?;
        tracing::info!(order_id = %order_id, cancelled_by = %user_id, "Order cancelled");
        Ok(order)
    }

    /// Cancel PENDING orders whose reservation lapsed before `now`. Returns
    /// how many were cancelled.
    ///
    /// # Errors
    ///
    /// Returns error if the order listing fails; individual failures are
    /// logged and skipped.
    pub async fn expire_stale_orders(&self, now: DateTime<Utc>) -> Result<usize> {
        let _guard = self.transitions.lock().await;
        let stale = self.orders.list_expired_pending_orders(now).await?;
        let env = OrderEnvironment::new(Arc::new(SweepClock(now)));
        let mut expired = 0;
        for order in stale {
            let order_id = order.id;
            match self
                .apply_in(&env, OrderState::with_order(order), OrderAction::Expire)
                .await
            {
                Ok(_) => expired += 1,
                Err(e) => tracing::warn!(order_id = %order_id, error = %e, "Could not expire order"),
            }
        }
        if expired > 0 {
            tracing::info!(expired, "Stale orders expired");
        }
        Ok(expired)
    }

    /// Cancel every PENDING and PAID order of an event, refunding the paid
    /// ones. Returns how many were cancelled.
    ///
    /// # Errors
    ///
    /// Returns error if the order listing fails; individual failures are
    /// logged and skipped.
    pub async fn cancel_open_orders_for_event(&self, event_id: EventId) -> Result<usize> {
        let _guard = self.transitions.lock().await;
        let open: Vec<Order> = self
            .orders
            .list_orders_for_event(event_id)
            .await?
            .into_iter()
            .filter(|o| matches!(o.status, OrderStatus::Pending | OrderStatus::Paid))
            .collect();
        let mut cancelled = 0;
        for order in open {
            let order_id = order.id;
            match self.apply(OrderState::with_order(order), OrderAction::Cancel).await {
                Ok(_) => cancelled += 1,
                Err(e) => tracing::error!(
                    order_id = %order_id,
                    event_id = %event_id,
                    error = %e,
                    "Could not cancel order of cancelled event"
                ),
            }
        }
        tracing::info!(event_id = %event_id, cancelled, "Open orders cancelled");
        Ok(cancelled)
    }

    // ═══════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════

    /// Load an order, for members.
    ///
    /// # Errors
    ///
    /// `NotFound` for non-members, `Forbidden` for scanners.
    pub async fn get(&self, user_id: UserId, order_id: OrderId) -> Result<Order> {
        let order = self
            .orders
            .get_order_for_user(order_id, user_id)
            .await?
            .ok_or_else(|| TicketingError::not_found("order", order_id))?;
        self.authorizer
            .require(user_id, order.organization_id, Permission::ManageEvents)
            .await?;
        Ok(order)
    }

    /// The event's orders, newest first.
    ///
    /// # Errors
    ///
    /// `NotFound` for non-members, `Forbidden` for scanners.
    pub async fn list_for_event(&self, user_id: UserId, event_id: EventId) -> Result<Vec<Order>> {
        authorized_event(
            self.events.as_ref(),
            &self.authorizer,
            user_id,
            event_id,
            Permission::ManageEvents,
        )
        .await?;
        self.orders.list_orders_for_event(event_id).await
    }

    /// The buyer's view of an order, reachable by its unguessable id.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown orders.
    pub async fn receipt(&self, order_id: OrderId) -> Result<OrderReceipt> {
        let order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| TicketingError::not_found("order", order_id))?;
        let event = self
            .events
            .get_event(order.event_id)
            .await?
            .ok_or_else(|| TicketingError::not_found("event", order.event_id))?;
        let tickets = if order.status == OrderStatus::Paid {
            self.tickets.issued_tickets(order.id).await?
        } else {
            Vec::new()
        };
        Ok(OrderReceipt {
            order_id: order.id,
            status: order.status,
            event_title: event.title,
            starts_at: event.starts_at,
            items: order.items,
            ticket_total: order.ticket_total,
            service_fee: order.service_fee,
            total: order.total,
            checkout_url: order.checkout_url,
            tickets,
        })
    }

    async fn on_sale(&self, event_id: EventId) -> Result<bool> {
        let now = self.clock.now();
        Ok(self
            .events
            .get_event(event_id)
            .await?
            .is_some_and(|e| e.status == EventStatus::Live && e.ends_at > now))
    }

    async fn event_cancelled(&self, event_id: EventId) -> Result<bool> {
        Ok(self
            .events
            .get_event(event_id)
            .await?
            .is_none_or(|e| e.status == EventStatus::Cancelled))
    }

    /// Cancel an order that is still PENDING, releasing its tickets.
    async fn withdraw(&self, order_id: OrderId) -> Result<()> {
        let _guard = self.transitions.lock().await;
        if let Some(order) = self.orders.get_order(order_id).await? {
            if order.status == OrderStatus::Pending {
                self.apply(OrderState::with_order(order), OrderAction::Cancel)
                    .await?;
            }
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════
    // Reducer plumbing
    // ═══════════════════════════════════════════════════════════

    async fn apply(&self, state: OrderState, action: OrderAction) -> Result<Order> {
        self.apply_in(&self.env, state, action).await
    }

    async fn apply_in(
        &self,
        env: &OrderEnvironment,
        mut state: OrderState,
        action: OrderAction,
    ) -> Result<Order> {
        let effects = self.reducer.reduce(&mut state, action, env);
        if let Some(error) = state.last_error {
            return Err(TicketingError::InvalidTransition(error));
        }
        let order = state
            .order
            .ok_or_else(|| TicketingError::Internal("order reducer produced no order".to_string()))?;
        self.execute(order, effects).await
    }

    async fn execute(&self, mut order: Order, effects: SmallVec<[OrderEffect; 4]>) -> Result<Order> {
        for effect in effects {
            match effect {
                OrderEffect::Persist => self.orders.save_order(&order).await?,
                OrderEffect::IssueTickets { .. } => {
                    self.tickets.issue_for_order(&order).await?;
                }
                OrderEffect::ReleaseCapacity { items } => self.release(&items).await,
                OrderEffect::VoidTickets { order_id } => {
                    self.tickets.void_for_order(order_id).await?;
                }
                OrderEffect::RefundPayment { payment_id, amount } => {
                    self.refund(&mut order, &payment_id, amount).await?;
                }
            }
        }
        Ok(order)
    }

    async fn refund(&self, order: &mut Order, payment_id: &str, amount: Money) -> Result<()> {
        match self
            .payments
            .create_refund(order.organization_id, payment_id, &MollieAmount::eur(amount))
            .await
        {
            Ok(_) => {
                order.refunded_at = Some(self.clock.now());
                self.orders.save_order(order).await?;
                tracing::info!(order_id = %order.id, amount_cents = amount.cents(), "Order refunded");
                Ok(())
            }
            Err(e) => {
                tracing::error!(order_id = %order.id, payment_id = %payment_id, error = %e, "Refund failed");
                Err(e.into())
            }
        }
    }
}

/// A clock stopped at the instant a sweep runs for.
struct SweepClock(DateTime<Utc>);

impl Clock for SweepClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Merge repeated ticket types, keeping first-seen order.
fn merge_items(items: &[CheckoutItem]) -> Result<Vec<(TicketTypeId, u32)>> {
    if items.is_empty() {
        return Err(TicketingError::Validation(
            "Select at least one ticket".to_string(),
        ));
    }
    let mut lines: Vec<(TicketTypeId, u32)> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity == 0 {
            return Err(TicketingError::Validation(
                "Quantities must be at least 1".to_string(),
            ));
        }
        if let Some(line) = lines.iter_mut().find(|(id, _)| *id == item.ticket_type_id) {
            line.1 = line
                .1
                .checked_add(item.quantity)
                .ok_or_else(|| TicketingError::Validation("Quantity too large".to_string()))?;
        } else {
            lines.push((item.ticket_type_id, item.quantity));
        }
    }
    Ok(lines)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_lines_are_merged_in_order() {
        let a = TicketTypeId::new();
        let b = TicketTypeId::new();
        let merged = merge_items(&[
            CheckoutItem { ticket_type_id: a, quantity: 1 },
            CheckoutItem { ticket_type_id: b, quantity: 2 },
            CheckoutItem { ticket_type_id: a, quantity: 3 },
        ])
        .unwrap();
        assert_eq!(merged, vec![(a, 4), (b, 2)]);
    }

    #[test]
    fn empty_and_zero_lines_are_rejected() {
        assert!(matches!(merge_items(&[]), Err(TicketingError::Validation(_))));
        let zero = CheckoutItem {
            ticket_type_id: TicketTypeId::new(),
            quantity: 0,
        };
        assert!(matches!(merge_items(&[zero]), Err(TicketingError::Validation(_))));
    }
}
