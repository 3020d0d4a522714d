//! Month-end invoices built from plan, platform and overage fees.
//!
//! Run with: `cargo test --test invoicing_test`

#![allow(clippy::unwrap_used)]

mod common;

use chrono::{TimeZone, Utc};
use common::harness;
use kassa_payments::PaymentStatus;
use std::collections::HashSet;
use ticketing::TicketingError;
use ticketing::types::{Money, Plan};

#[tokio::test]
async fn month_of_sales_becomes_one_invoice() {
    let h = harness();
    let ops = h.platform_admin().await;
    let org = h.organizer("Melkweg").await;
    let (event, euro) = h.live_event(&org, 100, 200).await;

    // FREE plan: 2% platform fee, 100 tickets a month included, 50c after.
    for _ in 0..11 {
        let placed = h.checkout(event.id, &[(euro.id, 10)]).await.unwrap().order;
        h.settle(&placed, PaymentStatus::Paid).await.unwrap();
    }
    let last = h.app.orders.list_for_event(org.admin.id, event.id).await.unwrap();
    assert_eq!(last.iter().map(|o| o.overage_tickets).sum::<u32>(), 10);

    // Refunded orders are not billed.
    let placed = h.checkout(event.id, &[(euro.id, 5)]).await.unwrap().order;
    let paid = h.settle(&placed, PaymentStatus::Paid).await.unwrap();
    h.app.orders.cancel_order(org.admin.id, paid.id).await.unwrap();

    h.clock.set(Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap());
    let invoice = h
        .app
        .invoices
        .generate_monthly(ops.id, org.organization.id, 2025, 1)
        .await
        .unwrap();

    assert_eq!(invoice.number, "INV-202501-0001");
    assert_eq!(invoice.lines.len(), 2);
    assert_eq!(invoice.lines[0].description, "Platform fees");
    assert_eq!(invoice.lines[0].quantity, 11);
    assert_eq!(invoice.lines[0].amount, Money::from_cents(220));
    assert_eq!(invoice.lines[1].quantity, 10);
    assert_eq!(invoice.lines[1].amount, Money::from_cents(500));
    assert_eq!(invoice.subtotal, Money::from_cents(720));
    assert_eq!(invoice.vat, Money::from_cents(151));
    assert_eq!(invoice.total, Money::from_cents(871));

    let err = h
        .app
        .invoices
        .generate_monthly(ops.id, org.organization.id, 2025, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, TicketingError::Conflict(_)));

    let listed = h
        .app
        .invoices
        .list_invoices(org.admin.id, org.organization.id)
        .await
        .unwrap();
    assert_eq!(listed, vec![invoice]);
}

#[tokio::test]
async fn batch_run_skips_invoiced_and_idle_organizations() {
    let h = harness();
    let ops = h.platform_admin().await;
    let invoiced = h.organizer("Melkweg").await;
    let idle = h.organizer("Quiet Hall").await;
    let pro = h.organizer("Paradiso").await;
    h.app
        .organizations
        .change_plan(pro.admin.id, pro.organization.id, Plan::Pro)
        .await
        .unwrap();

    h.clock.set(Utc.with_ymd_and_hms(2025, 2, 3, 9, 0, 0).unwrap());
    h.app
        .invoices
        .generate_monthly(ops.id, invoiced.organization.id, 2025, 1)
        .await
        .unwrap();

    let batch = h.app.invoices.generate_all_monthly(ops.id, 2025, 1).await.unwrap();
    assert_eq!(batch.len(), 1);
    let subscription = &batch[0];
    assert_eq!(subscription.organization_id, pro.organization.id);
    assert_eq!(subscription.number, "INV-202501-0002");
    assert_eq!(subscription.lines[0].description, "Pro plan, 2025-01");
    assert_eq!(subscription.subtotal, Money::from_cents(4_900));
    assert_eq!(subscription.total, Money::from_cents(5_929));

    assert!(h.app.invoices.generate_all_monthly(ops.id, 2025, 1).await.unwrap().is_empty());
    assert!(
        h.app
            .invoices
            .list_invoices(idle.admin.id, idle.organization.id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn only_finished_months_are_invoiced() {
    let h = harness();
    let ops = h.platform_admin().await;
    let org = h.organizer("Melkweg").await;

    let err = h
        .app
        .invoices
        .generate_monthly(ops.id, org.organization.id, 2025, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, TicketingError::Validation(_)));

    let err = h
        .app
        .invoices
        .generate_monthly(ops.id, org.organization.id, 2024, 13)
        .await
        .unwrap_err();
    assert!(matches!(err, TicketingError::Validation(_)));

    let err = h.app.invoices.generate_all_monthly(ops.id, 2025, 1).await.unwrap_err();
    assert!(matches!(err, TicketingError::Validation(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn simultaneous_runs_never_share_a_number() {
    let h = harness();
    let ops = h.platform_admin().await;
    let mut organizations = Vec::new();
    for i in 0..24 {
        organizations.push(h.organizer(&format!("Venue {i}")).await);
    }
    h.clock.set(Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap());

    let handles: Vec<_> = organizations
        .iter()
        .map(|org| {
            let invoices = h.app.invoices.clone();
            let organization_id = org.organization.id;
            let admin = ops.id;
            tokio::spawn(async move { invoices.generate_monthly(admin, organization_id, 2025, 1).await })
        })
        .collect();
    let mut numbers = HashSet::new();
    for handle in handles {
        numbers.insert(handle.await.unwrap().unwrap().number);
    }

    let expected: HashSet<String> = (1..=24).map(|n| format!("INV-202501-{n:04}")).collect();
    assert_eq!(numbers, expected);
}
