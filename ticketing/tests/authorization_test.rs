//! Tenant isolation and role checks across the services.
//!
//! Run with: `cargo test --test authorization_test`

#![allow(clippy::unwrap_used)]

mod common;

use common::harness;
use kassa_payments::PaymentStatus;
use ticketing::TicketingError;
use ticketing::aggregates::EventChanges;
use ticketing::types::{Money, Plan, Role};

#[tokio::test]
async fn other_tenants_see_nothing() {
    let h = harness();
    let melkweg = h.organizer("Melkweg").await;
    let paradiso = h.organizer("Paradiso").await;
    let (event, regular) = h.live_event(&melkweg, 2_500, 10).await;
    let order = h.checkout(event.id, &[(regular.id, 1)]).await.unwrap().order;
    let outsider = paradiso.admin.id;

    let err = h.app.events.get(outsider, event.id).await.unwrap_err();
    assert!(matches!(err, TicketingError::NotFound { .. }));
    let err = h.app.events.sales_summary(outsider, event.id).await.unwrap_err();
    assert!(matches!(err, TicketingError::NotFound { .. }));
    let err = h.app.orders.get(outsider, order.id).await.unwrap_err();
    assert!(matches!(err, TicketingError::NotFound { .. }));
    let err = h.app.orders.cancel_order(outsider, order.id).await.unwrap_err();
    assert!(matches!(err, TicketingError::NotFound { .. }));
    let err = h.app.ticket_types.list(outsider, event.id).await.unwrap_err();
    assert!(matches!(err, TicketingError::NotFound { .. }));
    let err = h
        .app
        .organizations
        .get(outsider, melkweg.organization.id)
        .await
        .unwrap_err();
    assert!(matches!(err, TicketingError::NotFound { .. }));

    let own = h.app.events.list(outsider, paradiso.organization.id).await.unwrap();
    assert!(own.is_empty());
}

#[tokio::test]
async fn scanners_only_scan_and_view() {
    let h = harness();
    let org = h.organizer("Melkweg").await;
    let scanner = h.member(&org, Role::Scanner).await;
    let (event, regular) = h.live_event(&org, 2_500, 10).await;
    let placed = h.checkout(event.id, &[(regular.id, 1)]).await.unwrap().order;
    let paid = h.settle(&placed, PaymentStatus::Paid).await.unwrap();

    assert!(h.app.events.get(scanner.id, event.id).await.is_ok());

    let err = h
        .app
        .events
        .update(
            scanner.id,
            event.id,
            EventChanges {
                title: Some("Hijacked".into()),
                ..EventChanges::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TicketingError::Forbidden(_)));
    let err = h.app.orders.cancel_order(scanner.id, paid.id).await.unwrap_err();
    assert!(matches!(err, TicketingError::Forbidden(_)));
    let err = h.app.orders.get(scanner.id, paid.id).await.unwrap_err();
    assert!(matches!(err, TicketingError::Forbidden(_)));
    let err = h.app.events.sales_summary(scanner.id, event.id).await.unwrap_err();
    assert!(matches!(err, TicketingError::Forbidden(_)));
}

#[tokio::test]
async fn members_manage_events_but_not_the_organization() {
    let h = harness();
    let org = h.organizer("Melkweg").await;
    let member = h.member(&org, Role::Member).await;
    let event = h.draft_event(&org, "Members welcome").await;

    let renamed = h
        .app
        .events
        .update(
            member.id,
            event.id,
            EventChanges {
                title: Some("Renamed by a member".into()),
                ..EventChanges::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.title, "Renamed by a member");

    let err = h
        .app
        .organizations
        .change_plan(member.id, org.organization.id, Plan::Business)
        .await
        .unwrap_err();
    assert!(matches!(err, TicketingError::Forbidden(_)));
    let err = h
        .app
        .payments
        .start_connect(member.id, org.organization.id)
        .await
        .unwrap_err();
    assert!(matches!(err, TicketingError::Forbidden(_)));
    let err = h
        .app
        .invoices
        .list_invoices(member.id, org.organization.id)
        .await
        .unwrap_err();
    assert!(matches!(err, TicketingError::Forbidden(_)));
}

#[tokio::test]
async fn last_admin_stays() {
    let h = harness();
    let org = h.organizer("Melkweg").await;
    let id = org.organization.id;

    let err = h
        .app
        .organizations
        .change_role(org.admin.id, id, org.admin.id, Role::Member)
        .await
        .unwrap_err();
    assert!(matches!(err, TicketingError::Conflict(_)));
    let err = h
        .app
        .organizations
        .remove_member(org.admin.id, id, org.admin.id)
        .await
        .unwrap_err();
    assert!(matches!(err, TicketingError::Conflict(_)));

    // With a second admin the first may step down.
    let second = h.member(&org, Role::Admin).await;
    h.app
        .organizations
        .change_role(second.id, id, org.admin.id, Role::Member)
        .await
        .unwrap();
    let err = h
        .app
        .organizations
        .remove_member(second.id, id, second.id)
        .await
        .unwrap_err();
    assert!(matches!(err, TicketingError::Conflict(_)));
}

#[tokio::test]
async fn fee_overrides_are_for_platform_admins() {
    let h = harness();
    let org = h.organizer("Melkweg").await;
    let ops = h.platform_admin().await;
    let (event, regular) = h.live_event(&org, 2_500, 10).await;

    let err = h
        .app
        .events
        .set_fee_override(org.admin.id, event.id, Some(0), None)
        .await
        .unwrap_err();
    assert!(matches!(err, TicketingError::Forbidden(_)));

    let event = h
        .app
        .events
        .set_fee_override(ops.id, event.id, Some(0), Some(Money::ZERO))
        .await
        .unwrap();
    let fee_override = event.fee_override.unwrap();
    assert_eq!(fee_override.platform_fee_bp, Some(0));
    assert_eq!(fee_override.set_by, ops.id);

    let order = h.checkout(event.id, &[(regular.id, 2)]).await.unwrap().order;
    assert_eq!(order.platform_fee, Money::ZERO);
    let request = h.mollie.payment_requests().pop().unwrap();
    assert_eq!(request.application_fee.unwrap().amount.value, "1.98");

    let cleared = h
        .app
        .events
        .set_fee_override(ops.id, event.id, None, None)
        .await
        .unwrap();
    assert!(cleared.fee_override.is_none());

    let err = h
        .app
        .events
        .set_fee_override(ops.id, event.id, Some(10_001), None)
        .await
        .unwrap_err();
    assert!(matches!(err, TicketingError::Validation(_)));
}

#[tokio::test]
async fn invoices_are_generated_by_platform_admins() {
    let h = harness();
    let org = h.organizer("Melkweg").await;
    let err = h
        .app
        .invoices
        .generate_monthly(org.admin.id, org.organization.id, 2024, 12)
        .await
        .unwrap_err();
    assert!(matches!(err, TicketingError::Forbidden(_)));
    let err = h.app.invoices.generate_all_monthly(org.admin.id, 2024, 12).await.unwrap_err();
    assert!(matches!(err, TicketingError::Forbidden(_)));
}

#[tokio::test]
async fn connect_must_be_finished_by_whoever_started_it() {
    let h = harness();
    let org = h.organizer("Melkweg").await;
    let other_admin = h.member(&org, Role::Admin).await;

    let start = h
        .app
        .payments
        .start_connect(org.admin.id, org.organization.id)
        .await
        .unwrap();
    let err = h
        .app
        .payments
        .complete_connect(other_admin.id, "auth_code", &start.state)
        .await
        .unwrap_err();
    assert!(matches!(err, TicketingError::Forbidden(_)));

    let status = h
        .app
        .payments
        .connection_status(org.admin.id, org.organization.id)
        .await
        .unwrap();
    assert!(status.is_none());
    assert!(!h.app.payments.payments_enabled(org.organization.id).await.unwrap());
}

#[tokio::test]
async fn rejected_callback_keeps_the_working_connection() {
    let h = harness();
    let org = h.organizer("Melkweg").await;
    let member = h.member(&org, Role::Member).await;
    h.connect_mollie(&org).await;
    let before = h
        .app
        .payments
        .connection_status(org.admin.id, org.organization.id)
        .await
        .unwrap()
        .unwrap();

    let start = h
        .app
        .payments
        .start_connect(org.admin.id, org.organization.id)
        .await
        .unwrap();
    let err = h
        .app
        .payments
        .complete_connect(member.id, "auth_code", &start.state)
        .await
        .unwrap_err();
    assert!(matches!(err, TicketingError::Forbidden(_)));

    let after = h
        .app
        .payments
        .connection_status(org.admin.id, org.organization.id)
        .await
        .unwrap();
    assert_eq!(after, Some(before));
    assert!(h.mollie.revoked_tokens().is_empty());
    assert!(h.app.payments.payments_enabled(org.organization.id).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn admins_demoting_each_other_leave_one_admin() {
    let h = harness();
    let org = h.organizer("Melkweg").await;
    let second = h.member(&org, Role::Admin).await;
    let id = org.organization.id;

    let first_demotes_second = {
        let organizations = h.app.organizations.clone();
        let (actor, target) = (org.admin.id, second.id);
        tokio::spawn(async move { organizations.change_role(actor, id, target, Role::Member).await })
    };
    let second_demotes_first = {
        let organizations = h.app.organizations.clone();
        let (actor, target) = (second.id, org.admin.id);
        tokio::spawn(async move { organizations.change_role(actor, id, target, Role::Member).await })
    };
    let outcomes = [
        first_demotes_second.await.unwrap(),
        second_demotes_first.await.unwrap(),
    ];

    assert!(outcomes.iter().any(Result::is_ok));
    // Whoever is still an admin can list the members.
    let mut members = None;
    for actor in [org.admin.id, second.id] {
        if let Ok(listed) = h.app.organizations.list_members(actor, id).await {
            members = Some(listed);
            break;
        }
    }
    let admins = members.unwrap().into_iter().filter(|m| m.role == Role::Admin).count();
    assert_eq!(admins, 1);
}
