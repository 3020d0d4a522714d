//! Event lifecycle: DRAFT → LIVE → ENDED / CANCELLED, with the side
//! effects on orders and the public listing.
//!
//! Run with: `cargo test --test event_lifecycle_test`

#![allow(clippy::unwrap_used)]

mod common;

use chrono::Duration;
use common::harness;
use kassa_core::environment::Clock;
use kassa_payments::PaymentStatus;
use kassa_testing::test_epoch;
use ticketing::TicketingError;
use ticketing::aggregates::EventChanges;
use ticketing::services::NewEvent;
use ticketing::types::{EventStatus, Money, OrderStatus, TicketStatus};

#[tokio::test]
async fn events_start_as_drafts_with_unique_slugs() {
    let h = harness();
    let org = h.organizer("Melkweg").await;
    let first = h.draft_event(&org, "Jazz Night").await;
    let second = h.draft_event(&org, "Jazz Night").await;

    assert_eq!(first.status, EventStatus::Draft);
    assert_eq!(first.slug, "jazz-night");
    assert_eq!(second.slug, "jazz-night-2");
    assert!(first.published_at.is_none());

    let err = h
        .app
        .events
        .create(
            org.admin.id,
            org.organization.id,
            NewEvent {
                title: "Yesterday".into(),
                description: None,
                venue: None,
                starts_at: test_epoch() - Duration::days(1),
                ends_at: test_epoch() + Duration::hours(1),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TicketingError::Validation(_)));

    let err = h
        .app
        .events
        .update(org.admin.id, first.id, EventChanges::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TicketingError::Validation(_)));
}

#[tokio::test]
async fn publishing_needs_ticket_types_and_payments() {
    let h = harness();
    let org = h.organizer("Melkweg").await;
    let event = h.draft_event(&org, "Opening").await;

    let err = h.app.events.publish(org.admin.id, event.id).await.unwrap_err();
    assert!(matches!(err, TicketingError::InvalidTransition(_)));

    h.ticket_type(&org, event.id, "Regular", 2_000, 100).await;
    let err = h.app.events.publish(org.admin.id, event.id).await.unwrap_err();
    assert!(matches!(err, TicketingError::InvalidTransition(_)));

    // Connected, but Mollie has not finished onboarding the account.
    h.mollie.set_can_receive_payments(false);
    h.connect_mollie(&org).await;
    let err = h.app.events.publish(org.admin.id, event.id).await.unwrap_err();
    assert!(matches!(err, TicketingError::InvalidTransition(_)));

    h.mollie.set_can_receive_payments(true);
    let live = h.app.events.publish(org.admin.id, event.id).await.unwrap();
    assert_eq!(live.status, EventStatus::Live);
    assert_eq!(live.published_at, Some(h.clock.now()));

    let err = h.app.events.publish(org.admin.id, event.id).await.unwrap_err();
    assert!(matches!(err, TicketingError::InvalidTransition(_)));
}

#[tokio::test]
async fn free_events_publish_without_mollie() {
    let h = harness();
    let org = h.organizer("Open Air").await;
    let event = h.draft_event(&org, "Picnic").await;
    h.ticket_type(&org, event.id, "Entry", 0, 500).await;

    let live = h.app.events.publish(org.admin.id, event.id).await.unwrap();
    assert_eq!(live.status, EventStatus::Live);
}

#[tokio::test]
async fn cancelling_an_event_cancels_and_refunds_its_orders() {
    let h = harness();
    let org = h.organizer("Melkweg").await;
    let (event, regular) = h.live_event(&org, 2_500, 20).await;
    let paid = h.checkout(event.id, &[(regular.id, 2)]).await.unwrap().order;
    let paid = h.settle(&paid, PaymentStatus::Paid).await.unwrap();
    let pending = h.checkout(event.id, &[(regular.id, 1)]).await.unwrap().order;

    let cancelled = h.app.events.cancel(org.admin.id, event.id).await.unwrap();
    assert_eq!(cancelled.status, EventStatus::Cancelled);

    let orders = h.app.orders.list_for_event(org.admin.id, event.id).await.unwrap();
    assert!(orders.iter().all(|o| o.status == OrderStatus::Cancelled));
    let refunded = orders.iter().find(|o| o.id == paid.id).unwrap();
    assert!(refunded.refunded_at.is_some());
    let unpaid = orders.iter().find(|o| o.id == pending.id).unwrap();
    assert!(unpaid.refunded_at.is_none());

    assert_eq!(h.mollie.refunds().len(), 1);
    let tickets = h.app.tickets.list_for_order(org.admin.id, paid.id).await.unwrap();
    assert!(tickets.iter().all(|t| t.ticket.status == TicketStatus::Cancelled));
    assert_eq!(h.sold_count(&org, event.id, regular.id).await, 0);

    let err = h.app.events.publish(org.admin.id, event.id).await.unwrap_err();
    assert!(matches!(err, TicketingError::InvalidTransition(_)));
    let err = h
        .app
        .events
        .update(
            org.admin.id,
            event.id,
            EventChanges {
                title: Some("Back on".into()),
                ..EventChanges::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TicketingError::InvalidTransition(_)));
}

#[tokio::test]
async fn maintenance_ends_past_events_and_expires_orders() {
    let h = harness();
    let org = h.organizer("Melkweg").await;
    let (event, regular) = h.live_event(&org, 2_500, 20).await;
    h.checkout(event.id, &[(regular.id, 1)]).await.unwrap();

    let report = h.app.run_maintenance().await.unwrap();
    assert_eq!((report.expired_orders, report.ended_events), (0, 0));

    h.clock.set(event.ends_at);
    let report = h.app.run_maintenance().await.unwrap();
    assert_eq!(report.expired_orders, 1);
    assert_eq!(report.ended_events, 1);

    let ended = h.app.events.get(org.admin.id, event.id).await.unwrap();
    assert_eq!(ended.status, EventStatus::Ended);
    let err = h.app.events.end(org.admin.id, event.id).await.unwrap_err();
    assert!(matches!(err, TicketingError::InvalidTransition(_)));
    let err = h.app.events.cancel(org.admin.id, event.id).await.unwrap_err();
    assert!(matches!(err, TicketingError::InvalidTransition(_)));
}

#[tokio::test]
async fn only_unsold_drafts_can_be_deleted() {
    let h = harness();
    let org = h.organizer("Melkweg").await;
    let draft = h.draft_event(&org, "Maybe").await;
    h.ticket_type(&org, draft.id, "Regular", 1_000, 10).await;
    let (live, _) = h.live_event(&org, 1_000, 10).await;

    let err = h.app.events.delete(org.admin.id, live.id).await.unwrap_err();
    assert!(matches!(err, TicketingError::InvalidTransition(_)));

    h.app.events.delete(org.admin.id, draft.id).await.unwrap();
    let err = h.app.events.get(org.admin.id, draft.id).await.unwrap_err();
    assert!(matches!(err, TicketingError::NotFound { .. }));
}

#[tokio::test]
async fn public_pages_show_live_events_only() {
    let h = harness();
    let org = h.organizer("Melkweg").await;
    let draft = h.draft_event(&org, "Secret Gig").await;
    let (live, regular) = h.live_event(&org, 2_500, 4).await;
    h.checkout(live.id, &[(regular.id, 4)]).await.unwrap();

    let listed = h.app.events.list_public_events().await.unwrap();
    assert_eq!(listed.len(), 1);
    let page = h.app.events.get_public_event(&live.slug).await.unwrap();
    assert_eq!(page, listed[0]);
    assert_eq!(page.organizer, "Melkweg");
    assert_eq!(page.ticket_types.len(), 1);
    assert_eq!(page.ticket_types[0].available, 0);
    assert!(page.ticket_types[0].sold_out);

    let err = h.app.events.get_public_event(&draft.slug).await.unwrap_err();
    assert!(matches!(err, TicketingError::NotFound { .. }));
}

#[tokio::test]
async fn sales_summary_splits_sold_and_reserved() {
    let h = harness();
    let org = h.organizer("Melkweg").await;
    let (event, regular) = h.live_event(&org, 2_500, 20).await;
    let vip = h.ticket_type(&org, event.id, "VIP", 6_000, 5).await;

    let paid = h
        .checkout(event.id, &[(regular.id, 2), (vip.id, 1)])
        .await
        .unwrap()
        .order;
    h.settle(&paid, PaymentStatus::Paid).await.unwrap();
    h.checkout(event.id, &[(regular.id, 3)]).await.unwrap();
    let failed = h.checkout(event.id, &[(vip.id, 2)]).await.unwrap().order;
    h.settle(&failed, PaymentStatus::Failed).await.unwrap();

    let summary = h.app.events.sales_summary(org.admin.id, event.id).await.unwrap();
    assert_eq!(summary.paid_orders, 1);
    assert_eq!(summary.pending_orders, 1);
    assert_eq!(summary.tickets_sold, 3);
    assert_eq!(summary.revenue, Money::from_cents(11_000));

    let regular_sales = summary
        .ticket_types
        .iter()
        .find(|t| t.ticket_type_id == regular.id)
        .unwrap();
    assert_eq!(regular_sales.sold, 2);
    assert_eq!(regular_sales.reserved, 3);
    assert_eq!(regular_sales.available, 15);
    let vip_sales = summary.ticket_types.iter().find(|t| t.ticket_type_id == vip.id).unwrap();
    assert_eq!(vip_sales.sold, 1);
    assert_eq!(vip_sales.reserved, 0);
    assert_eq!(vip_sales.available, 4);
}

#[tokio::test]
async fn ticket_types_keep_what_was_sold() {
    let h = harness();
    let org = h.organizer("Melkweg").await;
    let (event, regular) = h.live_event(&org, 2_500, 20).await;
    h.checkout(event.id, &[(regular.id, 5)]).await.unwrap();

    let mut input = ticketing::services::TicketTypeInput {
        name: "Regular".into(),
        description: None,
        price: Money::from_cents(3_000),
        vat_rate: ticketing::pricing::VatRate::Reduced9,
        capacity: 4,
        max_per_order: Some(4),
        sales_start: None,
        sales_end: None,
        sort_order: 0,
    };
    let err = h
        .app
        .ticket_types
        .update(org.admin.id, regular.id, input.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, TicketingError::Conflict(_)));

    input.capacity = 5;
    let updated = h.app.ticket_types.update(org.admin.id, regular.id, input).await.unwrap();
    assert_eq!(updated.sold_count, 5);
    assert_eq!(updated.available(), 0);

    let err = h.app.ticket_types.delete(org.admin.id, regular.id).await.unwrap_err();
    assert!(matches!(err, TicketingError::Conflict(_)));

    h.app.events.cancel(org.admin.id, event.id).await.unwrap();
    let err = h
        .app
        .ticket_types
        .create(
            org.admin.id,
            event.id,
            ticketing::services::TicketTypeInput {
                name: "Late addition".into(),
                description: None,
                price: Money::from_cents(1_000),
                vat_rate: ticketing::pricing::VatRate::Reduced9,
                capacity: 10,
                max_per_order: None,
                sales_start: None,
                sales_end: None,
                sort_order: 1,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TicketingError::InvalidTransition(_)));
}
