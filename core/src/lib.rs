//! # Kassa Core
//!
//! Core traits and shared primitives for the Kassa ticketing platform.
//!
//! Business rules live in reducers: pure functions that validate a command,
//! update state in place and describe the side effects the service layer has
//! to carry out.
//!
//! ```text
//! Command → Reducer → (State, Effects) → Service executes effects
//! ```
//!
//! ## Core Concepts
//!
//! - **State**: the aggregate being changed (an event, an order)
//! - **Action**: commands and the facts they produce
//! - **Reducer**: `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: a value describing I/O, never the I/O itself
//! - **Environment**: injected dependencies such as the [`environment::Clock`]
//!
//! Shared value types used by every crate in the workspace live here too:
//! tenant and user identifiers and [`Money`].

pub mod ids;
pub mod money;

pub use ids::{OrganizationId, UserId};
pub use money::Money;
pub use smallvec::{smallvec, SmallVec};

/// Reducer module - the core trait for business logic
///
/// Reducers are deterministic: given the same state, action and environment
/// they always produce the same state and the same effects.
pub mod reducer {
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The aggregate state this reducer operates on
    /// - `Action`: Commands and events this reducer processes
    /// - `Environment`: Injected dependencies (clock, configuration)
    /// - `Effect`: Side effect descriptions handed back to the caller
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for OrderReducer {
    ///     type State = OrderState;
    ///     type Action = OrderAction;
    ///     type Environment = OrderEnvironment;
    ///     type Effect = OrderEffect;
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut OrderState,
    ///         action: OrderAction,
    ///         env: &OrderEnvironment,
    ///     ) -> SmallVec<[OrderEffect; 4]> {
    ///         match action {
    ///             OrderAction::MarkPaid { .. } => smallvec![OrderEffect::Persist],
    ///             _ => SmallVec::new(),
    ///         }
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// The effect descriptions this reducer can produce
        type Effect;

        /// Reduce an action into state changes and effects
        ///
        /// 1. Validates the action against the current state
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed by the caller
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Self::Effect; 4]>;
    }
}

/// Environment module - Dependency injection traits
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use kassa_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = clock.now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
