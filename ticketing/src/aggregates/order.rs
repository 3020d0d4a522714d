//! Order aggregate.
//!
//! PENDING orders hold reserved capacity until they are paid, fail, get
//! cancelled or expire. Capacity and tickets are never touched here; the
//! reducer only says which of them the service has to release, void or
//! issue.

use crate::types::{Money, Order, OrderId, OrderStatus, TicketTypeId};
use kassa_core::{SmallVec, environment::Clock, reducer::Reducer, smallvec};
use std::sync::Arc;

// ============================================================================
// Actions
// ============================================================================

/// Commands for the order aggregate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderAction {
    /// Record a new order whose capacity is already reserved
    Place {
        /// The priced order
        order: Order,
    },
    /// Payment succeeded
    MarkPaid {
        /// Provider payment id, if any
        payment_id: Option<String>,
    },
    /// Payment failed
    MarkFailed,
    /// Cancel by the buyer, the organizer or the payment provider
    Cancel,
    /// Drop an unpaid order after its reservation lapsed
    Expire,
}

/// Side effects requested by the order reducer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderEffect {
    /// Write the order
    Persist,
    /// Create one ticket per unit bought
    IssueTickets {
        /// Paid order
        order_id: OrderId,
    },
    /// Give reserved capacity back to the ticket types
    ReleaseCapacity {
        /// `(ticket type, quantity)` pairs
        items: Vec<(TicketTypeId, u32)>,
    },
    /// Cancel the order's tickets
    VoidTickets {
        /// Cancelled order
        order_id: OrderId,
    },
    /// Refund a captured payment
    RefundPayment {
        /// Provider payment id
        payment_id: String,
        /// Amount to refund
        amount: Money,
    },
}

// ============================================================================
// State
// ============================================================================

/// State of one order aggregate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderState {
    /// The order, once placed
    pub order: Option<Order>,
    /// Why the last command was rejected
    pub last_error: Option<String>,
}

impl OrderState {
    /// Empty state, before `Place`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            order: None,
            last_error: None,
        }
    }

    /// State holding an existing order.
    #[must_use]
    pub const fn with_order(order: Order) -> Self {
        Self {
            order: Some(order),
            last_error: None,
        }
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the order aggregate
#[derive(Clone)]
pub struct OrderEnvironment {
    /// Clock for transition timestamps and expiry
    pub clock: Arc<dyn Clock>,
}

impl OrderEnvironment {
    /// Creates a new `OrderEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the order aggregate
#[derive(Clone, Debug, Default)]
pub struct OrderReducer;

impl OrderReducer {
    /// Creates a new `OrderReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn validate_place(state: &OrderState, order: &Order) -> Result<(), String> {
        if state.order.is_some() {
            return Err("Order already exists".to_string());
        }
        if order.status != OrderStatus::Pending {
            return Err(format!(
                "New orders must be Pending (got {:?})",
                order.status
            ));
        }
        if order.items.is_empty() || order.items.iter().any(|i| i.quantity == 0) {
            return Err("Order must contain at least one ticket".to_string());
        }
        Ok(())
    }

    fn release(order: &Order) -> OrderEffect {
        OrderEffect::ReleaseCapacity {
            items: order
                .items
                .iter()
                .map(|i| (i.ticket_type_id, i.quantity))
                .collect(),
        }
    }

    fn fail(state: &mut OrderState, error: String) -> SmallVec<[OrderEffect; 4]> {
        state.last_error = Some(error);
        SmallVec::new()
    }
}

impl Reducer for OrderReducer {
    type State = OrderState;
    type Action = OrderAction;
    type Environment = OrderEnvironment;
    type Effect = OrderEffect;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Self::Effect; 4]> {
        let now = env.clock.now();

        if let OrderAction::Place { order } = action {
            if let Err(error) = Self::validate_place(state, &order) {
                return Self::fail(state, error);
            }
            state.order = Some(order);
            state.last_error = None;
            return smallvec![OrderEffect::Persist];
        }

        let Some(order) = state.order.as_mut() else {
            return Self::fail(state, "Order does not exist".to_string());
        };

        let result: Result<SmallVec<[OrderEffect; 4]>, String> = match (action, order.status) {
            (OrderAction::Place { .. }, _) => Err("Order already exists".to_string()),

            (OrderAction::MarkPaid { .. }, OrderStatus::Paid) => Ok(SmallVec::new()),
            (OrderAction::MarkPaid { payment_id }, OrderStatus::Pending) => {
                order.status = OrderStatus::Paid;
                order.paid_at = Some(now);
                order.checkout_url = None;
                if payment_id.is_some() {
                    order.payment_id = payment_id;
                }
                Ok(smallvec![
                    OrderEffect::Persist,
                    OrderEffect::IssueTickets { order_id: order.id }
                ])
            }

            (OrderAction::MarkFailed, OrderStatus::Pending) => {
                order.status = OrderStatus::Failed;
                order.closed_at = Some(now);
                order.checkout_url = None;
                Ok(smallvec![OrderEffect::Persist, Self::release(order)])
            }

            (OrderAction::Cancel, OrderStatus::Pending) => {
                order.status = OrderStatus::Cancelled;
                order.closed_at = Some(now);
                order.checkout_url = None;
                Ok(smallvec![OrderEffect::Persist, Self::release(order)])
            }
            (OrderAction::Cancel, OrderStatus::Paid) => {
                order.status = OrderStatus::Cancelled;
                order.closed_at = Some(now);
                let mut effects: SmallVec<[OrderEffect; 4]> = smallvec![
                    OrderEffect::Persist,
                    OrderEffect::VoidTickets { order_id: order.id },
                    Self::release(order)
                ];
                if let Some(payment_id) = order.payment_id.clone() {
                    if !order.total.is_zero() {
                        effects.push(OrderEffect::RefundPayment {
                            payment_id,
                            amount: order.total,
                        });
                    }
                }
                Ok(effects)
            }

            (OrderAction::Expire, OrderStatus::Pending) => {
                if order.expires_at <= now {
                    order.status = OrderStatus::Cancelled;
                    order.closed_at = Some(now);
                    order.checkout_url = None;
                    Ok(smallvec![OrderEffect::Persist, Self::release(order)])
                } else {
                    Err(format!("Order reserved until {}", order.expires_at))
                }
            }

            (action, status) => Err(format!(
                "Cannot apply {} to order with status {status:?}",
                action_name(&action)
            )),
        };

        match result {
            Ok(effects) => {
                state.last_error = None;
                effects
            }
            Err(error) => Self::fail(state, error),
        }
    }
}

const fn action_name(action: &OrderAction) -> &'static str {
    match action {
        OrderAction::Place { .. } => "Place",
        OrderAction::MarkPaid { .. } => "MarkPaid",
        OrderAction::MarkFailed => "MarkFailed",
        OrderAction::Cancel => "Cancel",
        OrderAction::Expire => "Expire",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pricing::VatRate;
    use crate::types::{Buyer, EventId, OrderItem, OrganizationId};
    use chrono::Duration;
    use kassa_testing::{ReducerTest, reducer_test::assertions, test_clock, test_epoch};

    fn env() -> OrderEnvironment {
        OrderEnvironment::new(Arc::new(test_clock()))
    }

    fn order(status: OrderStatus, total_cents: u64) -> Order {
        let tt = TicketTypeId::new();
        Order {
            id: OrderId::new(),
            organization_id: OrganizationId::new(),
            event_id: EventId::new(),
            buyer: Buyer {
                name: "Sanne de Vries".into(),
                email: "sanne@example.nl".into(),
            },
            items: vec![OrderItem {
                ticket_type_id: tt,
                name: "Regular".into(),
                quantity: 2,
                unit_price: Money::from_cents(total_cents / 2),
                vat_rate: VatRate::Reduced9,
            }],
            ticket_total: Money::from_cents(total_cents),
            service_fee: Money::ZERO,
            total: Money::from_cents(total_cents),
            platform_fee: Money::ZERO,
            overage_tickets: 0,
            overage_fee: Money::ZERO,
            status,
            payment_id: (total_cents > 0).then(|| "tr_test".to_string()),
            checkout_url: None,
            created_at: test_epoch() - Duration::minutes(5),
            expires_at: test_epoch() + Duration::minutes(10),
            paid_at: None,
            closed_at: None,
            refunded_at: None,
        }
    }

    fn release_of(order: &Order) -> OrderEffect {
        OrderEffect::ReleaseCapacity {
            items: vec![(order.items[0].ticket_type_id, 2)],
        }
    }

    #[test]
    fn place_records_pending_order() {
        ReducerTest::new(OrderReducer::new())
            .with_env(env())
            .given_state(OrderState::new())
            .when_action(OrderAction::Place {
                order: order(OrderStatus::Pending, 5000),
            })
            .then_state(|state| {
                assert_eq!(state.order.as_ref().unwrap().status, OrderStatus::Pending);
            })
            .then_effects(|effects| {
                assert_eq!(effects, [OrderEffect::Persist]);
            })
            .run();
    }

    #[test]
    fn place_rejects_empty_orders() {
        let mut empty = order(OrderStatus::Pending, 0);
        empty.items.clear();
        ReducerTest::new(OrderReducer::new())
            .with_env(env())
            .given_state(OrderState::new())
            .when_action(OrderAction::Place { order: empty })
            .then_state(|state| {
                assert!(state.order.is_none());
                assert!(state.last_error.is_some());
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn mark_paid_issues_tickets() {
        let order = order(OrderStatus::Pending, 5000);
        let order_id = order.id;
        ReducerTest::new(OrderReducer::new())
            .with_env(env())
            .given_state(OrderState::with_order(order))
            .when_action(OrderAction::MarkPaid { payment_id: None })
            .then_state(|state| {
                let order = state.order.as_ref().unwrap();
                assert_eq!(order.status, OrderStatus::Paid);
                assert_eq!(order.paid_at, Some(test_epoch()));
                assert_eq!(order.payment_id.as_deref(), Some("tr_test"));
            })
            .then_effects(move |effects| {
                assertions::assert_has_effect(effects, &OrderEffect::IssueTickets { order_id });
            })
            .run();
    }

    #[test]
    fn mark_paid_twice_is_a_no_op() {
        ReducerTest::new(OrderReducer::new())
            .with_env(env())
            .given_state(OrderState::with_order(order(OrderStatus::Paid, 5000)))
            .when_action(OrderAction::MarkPaid { payment_id: None })
            .then_state(|state| {
                assert_eq!(state.order.as_ref().unwrap().status, OrderStatus::Paid);
                assert!(state.last_error.is_none());
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn failed_payment_releases_capacity() {
        let order = order(OrderStatus::Pending, 5000);
        let release = release_of(&order);
        ReducerTest::new(OrderReducer::new())
            .with_env(env())
            .given_state(OrderState::with_order(order))
            .when_action(OrderAction::MarkFailed)
            .then_state(|state| {
                let order = state.order.as_ref().unwrap();
                assert_eq!(order.status, OrderStatus::Failed);
                assert_eq!(order.closed_at, Some(test_epoch()));
            })
            .then_effects(move |effects| {
                assertions::assert_has_effect(effects, &release);
            })
            .run();
    }

    #[test]
    fn cancelling_paid_order_refunds_and_voids() {
        let order = order(OrderStatus::Paid, 5000);
        let order_id = order.id;
        let release = release_of(&order);
        ReducerTest::new(OrderReducer::new())
            .with_env(env())
            .given_state(OrderState::with_order(order))
            .when_action(OrderAction::Cancel)
            .then_state(|state| {
                assert_eq!(state.order.as_ref().unwrap().status, OrderStatus::Cancelled);
            })
            .then_effects(move |effects| {
                assertions::assert_has_effect(effects, &OrderEffect::VoidTickets { order_id });
                assertions::assert_has_effect(effects, &release);
                assertions::assert_has_effect(
                    effects,
                    &OrderEffect::RefundPayment {
                        payment_id: "tr_test".into(),
                        amount: Money::from_cents(5000),
                    },
                );
            })
            .run();
    }

    #[test]
    fn cancelling_free_paid_order_has_no_refund() {
        ReducerTest::new(OrderReducer::new())
            .with_env(env())
            .given_state(OrderState::with_order(order(OrderStatus::Paid, 0)))
            .when_action(OrderAction::Cancel)
            .then_effects(|effects| {
                assert_eq!(effects.len(), 3);
                assert!(
                    !effects
                        .iter()
                        .any(|e| matches!(e, OrderEffect::RefundPayment { .. }))
                );
            })
            .run();
    }

    #[test]
    fn expire_waits_for_the_deadline() {
        ReducerTest::new(OrderReducer::new())
            .with_env(env())
            .given_state(OrderState::with_order(order(OrderStatus::Pending, 5000)))
            .when_action(OrderAction::Expire)
            .then_state(|state| {
                assert_eq!(state.order.as_ref().unwrap().status, OrderStatus::Pending);
                assert!(state.last_error.as_ref().unwrap().contains("reserved until"));
            })
            .then_effects(assertions::assert_no_effects)
            .run();

        let mut lapsed = order(OrderStatus::Pending, 5000);
        lapsed.expires_at = test_epoch();
        ReducerTest::new(OrderReducer::new())
            .with_env(env())
            .given_state(OrderState::with_order(lapsed))
            .when_action(OrderAction::Expire)
            .then_state(|state| {
                assert_eq!(state.order.as_ref().unwrap().status, OrderStatus::Cancelled);
            })
            .then_effects(|effects| assert_eq!(effects.len(), 2))
            .run();
    }

    #[test]
    fn terminal_orders_reject_everything() {
        for status in [OrderStatus::Cancelled, OrderStatus::Failed] {
            for action in [
                OrderAction::MarkPaid { payment_id: None },
                OrderAction::MarkFailed,
                OrderAction::Cancel,
                OrderAction::Expire,
            ] {
                ReducerTest::new(OrderReducer::new())
                    .with_env(env())
                    .given_state(OrderState::with_order(order(status, 5000)))
                    .when_action(action)
                    .then_state(move |state| {
                        assert_eq!(state.order.as_ref().unwrap().status, status);
                        assert!(state.last_error.as_ref().unwrap().contains("Cannot apply"));
                    })
                    .then_effects(assertions::assert_no_effects)
                    .run();
            }
        }
    }
}
