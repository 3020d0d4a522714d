//! Door scanning: signed QR payloads, single admission, cancelled orders.
//!
//! Run with: `cargo test --test scanning_test`

#![allow(clippy::unwrap_used, clippy::panic)]

mod common;

use common::{Harness, Organizer, harness};
use kassa_core::environment::Clock;
use kassa_payments::PaymentStatus;
use ticketing::TicketingError;
use ticketing::services::{IssuedTicket, ScanOutcome};
use ticketing::types::{Event, Order, Role, TicketStatus};

/// A LIVE event with one paid order of `quantity` tickets.
async fn sold(h: &Harness, org: &Organizer, quantity: u32) -> (Event, Order, Vec<IssuedTicket>) {
    let (event, regular) = h.live_event(org, 2_500, 20).await;
    let placed = h.checkout(event.id, &[(regular.id, quantity)]).await.unwrap().order;
    let paid = h.settle(&placed, PaymentStatus::Paid).await.unwrap();
    let tickets = h.app.orders.receipt(paid.id).await.unwrap().tickets;
    (event, paid, tickets)
}

#[tokio::test]
async fn ticket_admits_once() {
    let h = harness();
    let org = h.organizer("Melkweg").await;
    let scanner = h.member(&org, Role::Scanner).await;
    let (event, order, tickets) = sold(&h, &org, 2).await;
    let payload = &tickets[0].qr_payload;

    let first = h.app.tickets.scan(scanner.id, event.id, payload).await.unwrap();
    assert_eq!(
        first,
        ScanOutcome::Valid {
            ticket_id: tickets[0].ticket.id,
            ticket_type: "Regular".into(),
        }
    );

    let second = h.app.tickets.scan(scanner.id, event.id, payload).await.unwrap();
    match second {
        ScanOutcome::AlreadyUsed { ticket_id, used_at } => {
            assert_eq!(ticket_id, tickets[0].ticket.id);
            assert_eq!(used_at, Some(h.clock.now()));
        }
        other => panic!("expected AlreadyUsed, got {other:?}"),
    }

    let stored = h.app.tickets.list_for_order(org.admin.id, order.id).await.unwrap();
    let used = stored.iter().find(|t| t.ticket.id == tickets[0].ticket.id).unwrap();
    assert_eq!(used.ticket.status, TicketStatus::Used);
    assert_eq!(used.ticket.scanned_by, Some(scanner.id));
    let untouched = stored.iter().find(|t| t.ticket.id == tickets[1].ticket.id).unwrap();
    assert_eq!(untouched.ticket.status, TicketStatus::Valid);
}

#[tokio::test]
async fn ticket_for_another_event_is_refused() {
    let h = harness();
    let org = h.organizer("Melkweg").await;
    let (_, _, tickets) = sold(&h, &org, 1).await;
    let (other_event, _) = h.live_event(&org, 1_000, 10).await;

    let outcome = h
        .app
        .tickets
        .scan(org.admin.id, other_event.id, &tickets[0].qr_payload)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ScanOutcome::WrongEvent {
            ticket_id: tickets[0].ticket.id
        }
    );
}

#[tokio::test]
async fn forged_payloads_are_invalid() {
    let h = harness();
    let org = h.organizer("Melkweg").await;
    let (event, _, tickets) = sold(&h, &org, 2).await;

    // Ticket id and signature of one ticket, secret of the other.
    let first: Vec<&str> = tickets[0].qr_payload.split('.').collect();
    let second: Vec<&str> = tickets[1].qr_payload.split('.').collect();
    let spliced = format!("{}.{}.{}", first[0], second[1], first[2]);

    for payload in [spliced.as_str(), "not-a-ticket", "", "a.b.c"] {
        let outcome = h.app.tickets.scan(org.admin.id, event.id, payload).await.unwrap();
        assert_eq!(outcome, ScanOutcome::Invalid, "payload {payload:?}");
    }

    // Neither ticket was consumed by the attempts.
    let outcome = h
        .app
        .tickets
        .scan(org.admin.id, event.id, &tickets[0].qr_payload)
        .await
        .unwrap();
    assert!(matches!(outcome, ScanOutcome::Valid { .. }));
}

#[tokio::test]
async fn cancelled_order_tickets_are_refused() {
    let h = harness();
    let org = h.organizer("Melkweg").await;
    let (event, order, tickets) = sold(&h, &org, 1).await;
    h.app.orders.cancel_order(org.admin.id, order.id).await.unwrap();

    let outcome = h
        .app
        .tickets
        .scan(org.admin.id, event.id, &tickets[0].qr_payload)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ScanOutcome::Cancelled {
            ticket_id: tickets[0].ticket.id
        }
    );
}

#[tokio::test]
async fn scanning_needs_a_live_event_and_a_member() {
    let h = harness();
    let org = h.organizer("Melkweg").await;
    let stranger = h.user("Stranger").await;
    let (event, _, tickets) = sold(&h, &org, 1).await;
    let payload = &tickets[0].qr_payload;

    let err = h.app.tickets.scan(stranger.id, event.id, payload).await.unwrap_err();
    assert!(matches!(err, TicketingError::NotFound { .. }));

    h.app.events.end(org.admin.id, event.id).await.unwrap();
    let err = h.app.tickets.scan(org.admin.id, event.id, payload).await.unwrap_err();
    assert!(matches!(err, TicketingError::InvalidTransition(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_scans_admit_one() {
    let h = harness();
    let org = h.organizer("Melkweg").await;
    let (event, _, tickets) = sold(&h, &org, 1).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = h.app.tickets.clone();
        let payload = tickets[0].qr_payload.clone();
        let admin = org.admin.id;
        let event_id = event.id;
        handles.push(tokio::spawn(async move { service.scan(admin, event_id, &payload).await }));
    }
    let mut admitted = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            ScanOutcome::Valid { .. } => admitted += 1,
            ScanOutcome::AlreadyUsed { .. } => refused += 1,
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(admitted, 1);
    assert_eq!(refused, 7);
}
