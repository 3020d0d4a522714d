//! Domain types for the ticketing platform.
//!
//! Entities are plain data. Lifecycle rules for events and orders live in
//! the reducers under [`crate::aggregates`]; tenant scoping lives in the
//! repositories.

use crate::pricing::VatRate;
use chrono::{DateTime, Utc};
use kassa_core::uuid_id;
use serde::{Deserialize, Serialize};

pub use kassa_core::{Money, OrganizationId, UserId};

// ============================================================================
// Identifiers
// ============================================================================

uuid_id! {
    /// Unique identifier for an event
    pub struct EventId;
}

uuid_id! {
    /// Unique identifier for a ticket type
    pub struct TicketTypeId;
}

uuid_id! {
    /// Unique identifier for an order
    pub struct OrderId;
}

uuid_id! {
    /// Unique identifier for an issued ticket
    pub struct TicketId;
}

uuid_id! {
    /// Unique identifier for an invoice
    pub struct InvoiceId;
}

// ============================================================================
// Users and tenants
// ============================================================================

/// A person who can log in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Identifier
    pub id: UserId,
    /// Login e-mail, stored lowercase
    pub email: String,
    /// Display name
    pub name: String,
    /// Platform staff: may override fees and generate invoices for any organization
    pub is_platform_admin: bool,
    /// Registration time
    pub created_at: DateTime<Utc>,
}

/// Subscription plan of an organization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Plan {
    /// No monthly price, highest platform fee
    #[default]
    Free,
    /// Mid tier
    Pro,
    /// Lowest platform fee
    Business,
}

impl Plan {
    /// Human readable name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Free => "Free",
            Self::Pro => "Pro",
            Self::Business => "Business",
        }
    }
}

/// The tenant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// Identifier
    pub id: OrganizationId,
    /// Display name
    pub name: String,
    /// Unique URL slug
    pub slug: String,
    /// Subscription plan
    pub plan: Plan,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Role of a member within an organization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Everything, including members, billing and the payment connection
    Admin,
    /// Events, ticket types and orders
    Member,
    /// Door staff: scanning and the event list
    Scanner,
}

/// Link between a user and an organization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// Organization
    pub organization_id: OrganizationId,
    /// Member
    pub user_id: UserId,
    /// Role
    pub role: Role,
    /// When the user joined
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Events
// ============================================================================

/// Event lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    /// Being prepared, not visible to the public
    Draft,
    /// Published and selling
    Live,
    /// Took place
    Ended,
    /// Called off
    Cancelled,
}

/// Per-event replacement of plan fee terms, set by platform staff.
///
/// Each field overrides the plan value independently; `None` keeps the plan's.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeOverride {
    /// Platform fee in basis points
    pub platform_fee_bp: Option<u32>,
    /// Overage fee per ticket above the plan allowance
    pub overage_fee_per_ticket: Option<Money>,
    /// Platform admin who set it
    pub set_by: UserId,
    /// When it was set
    pub set_at: DateTime<Utc>,
}

/// A ticketed happening.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Identifier
    pub id: EventId,
    /// Owning organization
    pub organization_id: OrganizationId,
    /// Title
    pub title: String,
    /// Globally unique public slug
    pub slug: String,
    /// Long description
    pub description: Option<String>,
    /// Venue name and address
    pub venue: Option<String>,
    /// Doors open
    pub starts_at: DateTime<Utc>,
    /// Event over
    pub ends_at: DateTime<Utc>,
    /// Lifecycle status
    pub status: EventStatus,
    /// Fee terms replacing the plan's for this event
    pub fee_override: Option<FeeOverride>,
    /// Member who created it
    pub created_by: UserId,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last change
    pub updated_at: DateTime<Utc>,
    /// When it went live
    pub published_at: Option<DateTime<Utc>>,
}

/// A priced, capacity-limited ticket category of an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketType {
    /// Identifier
    pub id: TicketTypeId,
    /// Event it belongs to
    pub event_id: EventId,
    /// Owning organization
    pub organization_id: OrganizationId,
    /// Name, e.g. "Early bird"
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Price per ticket, VAT included
    pub price: Money,
    /// VAT rate included in `price`
    pub vat_rate: VatRate,
    /// Tickets for sale in total
    pub capacity: u32,
    /// Tickets reserved by pending orders plus tickets sold
    pub sold_count: u32,
    /// Most tickets of this type in one order
    pub max_per_order: u32,
    /// Sales open at
    pub sales_start: Option<DateTime<Utc>>,
    /// Sales close at
    pub sales_end: Option<DateTime<Utc>>,
    /// Display order, ascending
    pub sort_order: i32,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl TicketType {
    /// Default cap on tickets per order.
    pub const DEFAULT_MAX_PER_ORDER: u32 = 10;

    /// Tickets still available.
    #[must_use]
    pub const fn available(&self) -> u32 {
        self.capacity.saturating_sub(self.sold_count)
    }

    /// Whether nothing is left.
    #[must_use]
    pub const fn is_sold_out(&self) -> bool {
        self.available() == 0
    }

    /// Whether tickets of this type cost nothing.
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.price.is_zero()
    }

    /// Whether the sales window includes `now`.
    #[must_use]
    pub fn on_sale_at(&self, now: DateTime<Utc>) -> bool {
        self.sales_start.is_none_or(|start| start <= now)
            && self.sales_end.is_none_or(|end| now < end)
    }
}

// ============================================================================
// Orders and tickets
// ============================================================================

/// Who is buying.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buyer {
    /// Full name
    pub name: String,
    /// E-mail the tickets go to, stored lowercase
    pub email: String,
}

/// One ticket type line of an order, with the price at purchase time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Ticket type bought
    pub ticket_type_id: TicketTypeId,
    /// Ticket type name at purchase time
    pub name: String,
    /// Number of tickets
    pub quantity: u32,
    /// Price per ticket at purchase time, VAT included
    pub unit_price: Money,
    /// VAT rate at purchase time
    pub vat_rate: VatRate,
}

impl OrderItem {
    /// `unit_price * quantity`, or `None` on overflow.
    #[must_use]
    pub const fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_multiply(self.quantity)
    }
}

/// Order status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Capacity reserved, awaiting payment
    Pending,
    /// Paid, tickets issued
    Paid,
    /// Cancelled by the buyer, the organizer, or expiry
    Cancelled,
    /// Payment failed
    Failed,
}

impl OrderStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Failed)
    }
}

/// A buyer's purchase for one event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Identifier
    pub id: OrderId,
    /// Organization selling
    pub organization_id: OrganizationId,
    /// Event
    pub event_id: EventId,
    /// Buyer
    pub buyer: Buyer,
    /// Lines
    pub items: Vec<OrderItem>,
    /// Sum of the lines, VAT included
    pub ticket_total: Money,
    /// Buyer-side service fee, VAT included
    pub service_fee: Money,
    /// `ticket_total + service_fee`, what the buyer pays
    pub total: Money,
    /// Platform fee deducted from the organizer's payout
    pub platform_fee: Money,
    /// Tickets of this order beyond the monthly allowance
    pub overage_tickets: u32,
    /// Overage fee deducted from the organizer's payout
    pub overage_fee: Money,
    /// Status
    pub status: OrderStatus,
    /// Mollie payment id, for paid orders
    pub payment_id: Option<String>,
    /// Mollie hosted checkout, while pending
    pub checkout_url: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Reservation deadline for pending orders
    pub expires_at: DateTime<Utc>,
    /// Payment time
    pub paid_at: Option<DateTime<Utc>>,
    /// Cancellation or failure time
    pub closed_at: Option<DateTime<Utc>>,
    /// When the payment was refunded
    pub refunded_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Total number of tickets.
    #[must_use]
    pub fn ticket_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Whether the buyer pays nothing.
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.total.is_zero()
    }
}

/// Ticket status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    /// Admits one
    Valid,
    /// Scanned at the door
    Used,
    /// Voided with its order
    Cancelled,
}

/// An issued ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Identifier
    pub id: TicketId,
    /// Order it was issued for
    pub order_id: OrderId,
    /// Event it admits to
    pub event_id: EventId,
    /// Ticket type
    pub ticket_type_id: TicketTypeId,
    /// Organization
    pub organization_id: OrganizationId,
    /// Random secret embedded in the QR code
    pub secret: String,
    /// Status
    pub status: TicketStatus,
    /// When it was scanned
    pub used_at: Option<DateTime<Utc>>,
    /// Who scanned it
    pub scanned_by: Option<UserId>,
    /// Issue time
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Invoices
// ============================================================================

/// One invoice line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    /// What is charged
    pub description: String,
    /// Quantity
    pub quantity: u32,
    /// Amount, VAT excluded
    pub amount: Money,
}

/// Monthly statement of what the platform charged an organization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Identifier
    pub id: InvoiceId,
    /// Invoiced organization
    pub organization_id: OrganizationId,
    /// `INV-YYYYMM-NNNN`
    pub number: String,
    /// Period year
    pub year: i32,
    /// Period month, 1-12
    pub month: u32,
    /// Lines, VAT excluded
    pub lines: Vec<InvoiceLine>,
    /// Sum of the lines
    pub subtotal: Money,
    /// 21% VAT on the subtotal
    pub vat: Money,
    /// `subtotal + vat`
    pub total: Money,
    /// Issue time
    pub issued_at: DateTime<Utc>,
}

impl Invoice {
    /// `INV-YYYYMM-NNNN` for the `sequence`-th invoice of a period.
    #[must_use]
    pub fn number_for(year: i32, month: u32, sequence: u32) -> String {
        format!("INV-{year:04}{month:02}-{sequence:04}")
    }
}
