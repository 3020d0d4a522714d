//! Capacity holds under concurrent checkouts.
//!
//! Run with: `cargo test --test concurrency_test`

#![allow(clippy::unwrap_used, clippy::panic)]

mod common;

use common::harness;
use ticketing::TicketingError;
use ticketing::services::{CheckoutItem, CheckoutRequest};
use ticketing::types::{EventId, TicketTypeId};

fn request(event_id: EventId, items: &[(TicketTypeId, u32)], buyer: usize) -> CheckoutRequest {
    CheckoutRequest {
        event_id,
        buyer_name: format!("Buyer {buyer}"),
        buyer_email: format!("buyer{buyer}@example.nl"),
        items: items
            .iter()
            .map(|&(ticket_type_id, quantity)| CheckoutItem {
                ticket_type_id,
                quantity,
            })
            .collect(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_ticket_is_sold_once() {
    let h = harness();
    let org = h.organizer("Paradiso").await;
    let (event, last_one) = h.live_event(&org, 2_500, 1).await;

    let mut handles = Vec::new();
    for buyer in 0..20 {
        let orders = h.app.orders.clone();
        let request = request(event.id, &[(last_one.id, 1)], buyer);
        handles.push(tokio::spawn(async move { orders.create_order(request).await }));
    }

    let mut sold = 0;
    let mut sold_out = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => sold += 1,
            Err(TicketingError::SoldOut { available, .. }) => {
                assert_eq!(available, 0);
                sold_out += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(sold, 1);
    assert_eq!(sold_out, 19);
    assert_eq!(h.sold_count(&org, event.id, last_one.id).await, 1);
    assert_eq!(h.mollie.payment_requests().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checkouts_never_oversell() {
    let h = harness();
    let org = h.organizer("Paradiso").await;
    let (event, regular) = h.live_event(&org, 1_500, 25).await;

    let mut handles = Vec::new();
    for buyer in 0..30 {
        let orders = h.app.orders.clone();
        let request = request(event.id, &[(regular.id, 2)], buyer);
        handles.push(tokio::spawn(async move { orders.create_order(request).await }));
    }
    let mut tickets = 0;
    for handle in handles {
        if let Ok(result) = handle.await.unwrap() {
            tickets += result.order.ticket_count();
        }
    }

    // 12 orders of two fit; the single ticket left cannot serve a pair.
    assert_eq!(tickets, 24);
    assert_eq!(h.sold_count(&org, event.id, regular.id).await, 24);
}

#[tokio::test]
async fn failed_line_rolls_back_earlier_lines() {
    let h = harness();
    let org = h.organizer("Paradiso").await;
    let (event, regular) = h.live_event(&org, 2_500, 50).await;
    let vip = h.ticket_type(&org, event.id, "VIP", 7_500, 3).await;
    h.checkout(event.id, &[(vip.id, 2)]).await.unwrap();

    let err = h
        .checkout(event.id, &[(regular.id, 4), (vip.id, 2)])
        .await
        .unwrap_err();
    match err {
        TicketingError::SoldOut {
            ticket_type_id,
            requested,
            available,
        } => {
            assert_eq!(ticket_type_id, vip.id);
            assert_eq!(requested, 2);
            assert_eq!(available, 1);
        }
        other => panic!("expected SoldOut, got {other}"),
    }
    assert_eq!(h.sold_count(&org, event.id, regular.id).await, 0);
    assert_eq!(h.sold_count(&org, event.id, vip.id).await, 2);
    assert_eq!(h.mollie.payment_requests().len(), 1);
}
