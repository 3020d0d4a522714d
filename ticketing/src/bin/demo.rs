//! Kassa demo
//!
//! Runs one organizer's month end to end against in-memory storage and a
//! mock Mollie:
//! - organization, event and ticket types
//! - Mollie connect and publication
//! - checkout, payment webhook and receipt
//! - door scanning (twice, to show the second scan is refused)
//! - month-end invoice
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin demo
//! RUST_LOG=warn cargo run --bin demo   # envelopes only
//! ```

use chrono::{DateTime, Datelike, Duration, Utc};
use kassa_core::environment::Clock;
use kassa_payments::PaymentStatus;
use kassa_payments::mocks::MockMollieClient;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use ticketing::aggregates::EventChanges;
use ticketing::pricing::VatRate;
use ticketing::services::{CheckoutItem, CheckoutRequest, NewEvent, ServiceResponse, TicketTypeInput};
use ticketing::types::{Money, Plan, Role};
use ticketing::{Config, TicketingApp};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Wall clock that can be moved forward, so the demo can reach the door
/// and the end of the month without waiting.
#[derive(Debug, Default)]
struct DemoClock {
    offset_secs: AtomicI64,
}

impl DemoClock {
    fn jump_to(&self, to: DateTime<Utc>) {
        self.offset_secs
            .store((to - Utc::now()).num_seconds(), Ordering::SeqCst);
    }
}

impl Clock for DemoClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now() + Duration::seconds(self.offset_secs.load(Ordering::SeqCst))
    }
}

fn print_envelope<T: Serialize>(label: &str, result: ticketing::Result<T>) -> anyhow::Result<()> {
    let envelope = ServiceResponse::from(result);
    println!("   {label}:\n{}\n", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

#[tokio::main]
#[allow(clippy::too_many_lines)]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ticketing=debug,kassa_payments=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("\n🎫 ============================================");
    println!("   Kassa - Live Demo");
    println!("============================================\n");

    let mollie = Arc::new(MockMollieClient::new());
    let clock = Arc::new(DemoClock::default());
    let app = TicketingApp::in_memory(config, mollie.clone(), mollie.clone(), clock.clone())?;

    // ========== Organization ==========

    println!("1️⃣  Setting up the organization...");
    let organizer = app.users.register("anna@paradiso.example", "Anna de Vries").await?;
    let door = app.users.register("sem@paradiso.example", "Sem Bakker").await?;
    let platform = app.users.register_platform_admin("ops@kassa.example", "Kassa Ops").await?;

    let organization = app.organizations.create(organizer.id, "Paradiso Events").await?;
    app.organizations
        .change_plan(organizer.id, organization.id, Plan::Pro)
        .await?;
    app.organizations
        .add_member(organizer.id, organization.id, &door.email, Role::Scanner)
        .await?;
    println!("   ✓ {} ({}) on the Pro plan", organization.name, organization.slug);
    println!("   ✓ {} added as SCANNER\n", door.name);

    // ========== Event ==========

    println!("2️⃣  Creating the event...");
    let starts_at = clock.now() + Duration::days(14);
    let event = app
        .events
        .create(
            organizer.id,
            organization.id,
            NewEvent {
                title: "Summer Jazz Night".to_string(),
                description: Some("Three bands, one night.".to_string()),
                venue: None,
                starts_at,
                ends_at: starts_at + Duration::hours(5),
            },
        )
        .await?;
    let event = app
        .events
        .update(
            organizer.id,
            event.id,
            EventChanges {
                venue: Some(Some("Paradiso, Amsterdam".to_string())),
                ..EventChanges::default()
            },
        )
        .await?;
    let regular = app
        .ticket_types
        .create(
            organizer.id,
            event.id,
            TicketTypeInput {
                name: "Regular".to_string(),
                description: None,
                price: Money::from_cents(2_500),
                vat_rate: VatRate::Reduced9,
                capacity: 300,
                max_per_order: Some(6),
                sales_start: None,
                sales_end: None,
                sort_order: 0,
            },
        )
        .await?;
    let kids = app
        .ticket_types
        .create(
            organizer.id,
            event.id,
            TicketTypeInput {
                name: "Kids (under 12)".to_string(),
                description: Some("Free with a paying adult".to_string()),
                price: Money::ZERO,
                vat_rate: VatRate::Exempt,
                capacity: 40,
                max_per_order: Some(2),
                sales_start: None,
                sales_end: None,
                sort_order: 1,
            },
        )
        .await?;
    println!("   ✓ {} at {} ({})", event.title, event.venue.as_deref().unwrap_or("-"), event.slug);
    println!("   ✓ Ticket types: {} at {}, {} free\n", regular.name, regular.price, kids.name);

    // ========== Payments ==========

    println!("3️⃣  Connecting Mollie and publishing...");
    print_envelope("Publish before connecting", app.events.publish(organizer.id, event.id).await)?;

    let start = app.payments.start_connect(organizer.id, organization.id).await?;
    println!("   → Organizer sent to {}", start.authorize_url);
    let connection = app
        .payments
        .complete_connect(organizer.id, "demo-authorization-code", &start.state)
        .await?;
    println!("   ✓ Mollie connected ({:?})", connection.status);

    let event = app.events.publish(organizer.id, event.id).await?;
    println!("   ✓ Event is {:?}\n", event.status);
    print_envelope("Public event page", app.events.get_public_event(&event.slug).await)?;

    // ========== Checkout ==========

    println!("4️⃣  A buyer checks out...");
    let checkout = app
        .orders
        .create_order(CheckoutRequest {
            event_id: event.id,
            buyer_name: "Lotte Jansen".to_string(),
            buyer_email: "Lotte@Example.NL".to_string(),
            items: vec![
                CheckoutItem {
                    ticket_type_id: regular.id,
                    quantity: 2,
                },
                CheckoutItem {
                    ticket_type_id: kids.id,
                    quantity: 1,
                },
            ],
        })
        .await?;
    let order = &checkout.order;
    println!("   ✓ Order {} is {:?}", order.id, order.status);
    println!(
        "   ✓ Tickets {} + service fee {} = {}",
        order.ticket_total, order.service_fee, order.total
    );
    println!(
        "   ✓ Platform keeps {} (fee) + {} (overage)",
        order.platform_fee, order.overage_fee
    );
    if let Some(url) = &checkout.checkout_url {
        println!("   → Buyer sent to {url}");
    }

    let payment_id = order.payment_id.clone().unwrap_or_default();
    mollie.set_payment_status(&payment_id, PaymentStatus::Paid)?;
    let paid = app.orders.handle_payment_webhook(&payment_id).await?;
    println!("   ✓ Webhook processed: order is {:?}\n", paid.status);

    let receipt = app.orders.receipt(paid.id).await?;
    println!("   ✓ {} tickets issued", receipt.tickets.len());
    print_envelope("Sales so far", app.events.sales_summary(organizer.id, event.id).await)?;

    // ========== At the door ==========

    println!("5️⃣  At the door...");
    clock.jump_to(starts_at + Duration::minutes(30));
    let first = receipt
        .tickets
        .first()
        .map(|t| t.qr_payload.clone())
        .unwrap_or_default();
    print_envelope("First scan", app.tickets.scan(door.id, event.id, &first).await)?;
    print_envelope("Second scan", app.tickets.scan(door.id, event.id, &first).await)?;
    print_envelope("Scanner tries to cancel", app.orders.cancel_order(door.id, paid.id).await)?;

    // ========== Month end ==========

    println!("6️⃣  Month end...");
    let sale_month = order.created_at;
    clock.jump_to(starts_at + Duration::days(40));
    let report = app.run_maintenance().await?;
    println!("   ✓ Maintenance: {} events ended", report.ended_events);
    print_envelope(
        "Invoice",
        app.invoices
            .generate_monthly(platform.id, organization.id, sale_month.year(), sale_month.month())
            .await,
    )?;

    println!("============================================");
    println!("   Demo complete");
    println!("============================================\n");
    Ok(())
}
