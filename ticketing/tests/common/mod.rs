//! Fixtures shared by the ticketing integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use chrono::Duration;
use kassa_payments::PaymentStatus;
use kassa_payments::mocks::MockMollieClient;
use kassa_testing::{MutableClock, init_test_tracing, test_epoch};
use std::sync::Arc;
use ticketing::pricing::VatRate;
use ticketing::repository::{InMemoryStore, Repositories};
use ticketing::services::{CheckoutItem, CheckoutRequest, CheckoutResult, NewEvent, TicketTypeInput};
use ticketing::types::{
    Event, EventId, Money, Order, Organization, Role, TicketType, TicketTypeId, User, UserId,
};
use ticketing::{Config, TicketingApp};

/// App over in-memory storage, a mock Mollie and a clock starting at
/// 2025-01-01 00:00 UTC.
pub struct Harness {
    pub app: TicketingApp,
    pub mollie: MockMollieClient,
    pub clock: MutableClock,
    /// The storage behind `app`, for arranging states the services never produce.
    pub store: Arc<InMemoryStore>,
}

/// An organization with its ADMIN.
pub struct Organizer {
    pub admin: User,
    pub organization: Organization,
}

pub fn harness() -> Harness {
    harness_with(|repositories| repositories)
}

/// As [`harness`], with some repositories swapped out.
pub fn harness_with(customize: impl FnOnce(Repositories) -> Repositories) -> Harness {
    init_test_tracing();
    let mollie = MockMollieClient::new();
    let clock = MutableClock::new(test_epoch());
    let store = Arc::new(InMemoryStore::new());
    let app = TicketingApp::with_repositories(
        Config::development(),
        customize(Repositories::from_store(&store)),
        Arc::new(mollie.clone()),
        Arc::new(mollie.clone()),
        Arc::new(clock.clone()),
    )
    .unwrap();
    Harness {
        app,
        mollie,
        clock,
        store,
    }
}

fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@kassa.test", UserId::new())
}

impl Harness {
    pub async fn user(&self, name: &str) -> User {
        self.app.users.register(&unique_email("user"), name).await.unwrap()
    }

    pub async fn platform_admin(&self) -> User {
        self.app
            .users
            .register_platform_admin(&unique_email("ops"), "Platform Ops")
            .await
            .unwrap()
    }

    pub async fn organizer(&self, name: &str) -> Organizer {
        let admin = self.user("Organizer").await;
        let organization = self.app.organizations.create(admin.id, name).await.unwrap();
        Organizer { admin, organization }
    }

    pub async fn member(&self, org: &Organizer, role: Role) -> User {
        let user = self.user("Staff").await;
        self.app
            .organizations
            .add_member(org.admin.id, org.organization.id, &user.email, role)
            .await
            .unwrap();
        user
    }

    pub async fn connect_mollie(&self, org: &Organizer) {
        let start = self
            .app
            .payments
            .start_connect(org.admin.id, org.organization.id)
            .await
            .unwrap();
        self.app
            .payments
            .complete_connect(org.admin.id, "auth_code", &start.state)
            .await
            .unwrap();
    }

    /// A draft event ten days out, four hours long.
    pub async fn draft_event(&self, org: &Organizer, title: &str) -> Event {
        let starts_at = test_epoch() + Duration::days(10);
        self.app
            .events
            .create(
                org.admin.id,
                org.organization.id,
                NewEvent {
                    title: title.to_string(),
                    description: None,
                    venue: Some("Melkweg".to_string()),
                    starts_at,
                    ends_at: starts_at + Duration::hours(4),
                },
            )
            .await
            .unwrap()
    }

    pub async fn ticket_type(
        &self,
        org: &Organizer,
        event_id: EventId,
        name: &str,
        price_cents: u64,
        capacity: u32,
    ) -> TicketType {
        self.app
            .ticket_types
            .create(
                org.admin.id,
                event_id,
                TicketTypeInput {
                    name: name.to_string(),
                    description: None,
                    price: Money::from_cents(price_cents),
                    vat_rate: VatRate::Reduced9,
                    capacity,
                    max_per_order: None,
                    sales_start: None,
                    sales_end: None,
                    sort_order: 0,
                },
            )
            .await
            .unwrap()
    }

    /// A LIVE event with one ticket type; Mollie is connected for paid ones.
    pub async fn live_event(&self, org: &Organizer, price_cents: u64, capacity: u32) -> (Event, TicketType) {
        let event = self.draft_event(org, "Live Night").await;
        let ticket_type = self.ticket_type(org, event.id, "Regular", price_cents, capacity).await;
        if price_cents > 0 {
            self.connect_mollie(org).await;
        }
        let event = self.app.events.publish(org.admin.id, event.id).await.unwrap();
        (event, ticket_type)
    }

    pub async fn checkout(
        &self,
        event_id: EventId,
        items: &[(TicketTypeId, u32)],
    ) -> ticketing::Result<CheckoutResult> {
        self.app
            .orders
            .create_order(CheckoutRequest {
                event_id,
                buyer_name: "Lotte Jansen".to_string(),
                buyer_email: "lotte@example.nl".to_string(),
                items: items
                    .iter()
                    .map(|&(ticket_type_id, quantity)| CheckoutItem {
                        ticket_type_id,
                        quantity,
                    })
                    .collect(),
            })
            .await
    }

    /// Let Mollie report the order's payment as `status` and deliver the webhook.
    pub async fn settle(&self, order: &Order, status: PaymentStatus) -> ticketing::Result<Order> {
        let payment_id = order.payment_id.clone().unwrap();
        self.mollie.set_payment_status(&payment_id, status).unwrap();
        self.app.orders.handle_payment_webhook(&payment_id).await
    }

    pub async fn sold_count(&self, org: &Organizer, event_id: EventId, ticket_type_id: TicketTypeId) -> u32 {
        self.app
            .ticket_types
            .list(org.admin.id, event_id)
            .await
            .unwrap()
            .into_iter()
            .find(|t| t.id == ticket_type_id)
            .unwrap()
            .sold_count
    }
}
