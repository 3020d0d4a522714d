//! Aggregate reducers for the ticketing platform.
//!
//! - Event: DRAFT → LIVE → ENDED, or CANCELLED
//! - Order: PENDING → PAID, FAILED or CANCELLED

pub mod event;
pub mod order;

pub use event::{EventAction, EventChanges, EventEffect, EventEnvironment, EventReducer, EventState};
pub use order::{OrderAction, OrderEffect, OrderEnvironment, OrderReducer, OrderState};
