//! Kassa: multi-tenant event ticketing.
//!
//! Organizations sell tickets to their events; buyers pay through the
//! organization's own Mollie account, and the platform takes its share as
//! an application fee on each payment.
//!
//! # Architecture
//!
//! ```text
//!   services (validate, authorize, shape)
//!        │
//!        ├──▶ aggregates (pure reducers: event and order lifecycles)
//!        │         │
//!        │         └── effects ──▶ repositories, tickets, Mollie
//!        │
//!        ├──▶ pricing (VAT, service fee, plan and overage charges)
//!        │
//!        └──▶ repository (tenant-scoped storage traits)
//! ```
//!
//! Every service takes the acting user and checks their role in the owning
//! organization before touching anything. Results convert into the
//! `{success, data|error}` envelope with [`services::ServiceResponse`].
//!
//! # Money
//!
//! Amounts are integer euro cents ([`types::Money`]). Ticket prices include
//! VAT; fee components are VAT-exclusive and get 21% on top. See
//! [`pricing`] for the exact rounding rules.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregates;
pub mod app;
pub mod config;
pub mod error;
pub mod pricing;
pub mod repository;
pub mod services;
pub mod signing;
pub mod types;

pub use app::{MaintenanceReport, TicketingApp};
pub use config::Config;
pub use error::{Result, TicketingError};
