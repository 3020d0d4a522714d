//! Mock provider implementations for testing.
//!
//! In-memory stand-ins for the Mollie vendor traits, for use in unit and
//! integration tests and the demo binary.

pub mod mollie;

pub use mollie::MockMollieClient;
