//! Application wiring.
//!
//! [`TicketingApp`] builds every service over one set of repositories and
//! one Mollie Connect service, and runs the periodic maintenance sweeps.

mod coordinator;

pub use coordinator::{MaintenanceReport, TicketingApp};
