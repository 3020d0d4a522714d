//! Event aggregate.
//!
//! Manages the event lifecycle: DRAFT → LIVE → ENDED, with CANCELLED
//! reachable from DRAFT and LIVE. Facts the reducer cannot know on its own
//! (how many ticket types exist, whether the organization can take payments)
//! are passed in with the command by the service layer.

use crate::types::{Event, EventId, EventStatus, FeeOverride, OrganizationId, UserId};
use chrono::{DateTime, Utc};
use kassa_core::{SmallVec, environment::Clock, reducer::Reducer, smallvec};
use std::sync::Arc;

/// Longest allowed event title, in characters.
pub const MAX_TITLE_LEN: usize = 200;

// ============================================================================
// Actions
// ============================================================================

/// Field changes for [`EventAction::Update`]. `None` leaves a field as is.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventChanges {
    /// New title
    pub title: Option<String>,
    /// New description; `Some(None)` clears it
    pub description: Option<Option<String>>,
    /// New venue; `Some(None)` clears it
    pub venue: Option<Option<String>>,
    /// New start
    pub starts_at: Option<DateTime<Utc>>,
    /// New end
    pub ends_at: Option<DateTime<Utc>>,
}

impl EventChanges {
    /// Whether nothing would change.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.venue.is_none()
            && self.starts_at.is_none()
            && self.ends_at.is_none()
    }
}

/// Commands for the event aggregate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventAction {
    /// Create a draft event
    Create {
        /// New identifier
        id: EventId,
        /// Owning organization
        organization_id: OrganizationId,
        /// Title
        title: String,
        /// Unique slug, chosen by the service
        slug: String,
        /// Description
        description: Option<String>,
        /// Venue
        venue: Option<String>,
        /// Start
        starts_at: DateTime<Utc>,
        /// End
        ends_at: DateTime<Utc>,
        /// Creating member
        created_by: UserId,
    },

    /// Change details of a draft or live event
    Update {
        /// Changes to apply
        changes: EventChanges,
    },

    /// Put a draft event on sale
    Publish {
        /// Number of ticket types the event has
        ticket_type_count: usize,
        /// Whether any ticket type has a price
        has_paid_ticket_types: bool,
        /// Whether the organization can receive payments
        payments_enabled: bool,
    },

    /// Close a live event after it took place
    End,

    /// Call off a draft or live event
    Cancel,

    /// Replace or clear the fee override
    SetFeeOverride {
        /// New override, `None` to clear
        fee_override: Option<FeeOverride>,
    },
}

/// Side effects requested by the event reducer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventEffect {
    /// Write the event
    Persist,
    /// Cancel every pending and paid order of the event
    CancelOpenOrders {
        /// Cancelled event
        event_id: EventId,
    },
}

// ============================================================================
// State
// ============================================================================

/// State of one event aggregate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventState {
    /// The event, once created
    pub event: Option<Event>,
    /// Why the last command was rejected
    pub last_error: Option<String>,
}

impl EventState {
    /// Empty state, before `Create`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            event: None,
            last_error: None,
        }
    }

    /// State holding an existing event.
    #[must_use]
    pub const fn with_event(event: Event) -> Self {
        Self {
            event: Some(event),
            last_error: None,
        }
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the event aggregate
#[derive(Clone)]
pub struct EventEnvironment {
    /// Clock for timestamps and "in the future" checks
    pub clock: Arc<dyn Clock>,
}

impl EventEnvironment {
    /// Creates a new `EventEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the event aggregate
#[derive(Clone, Debug, Default)]
pub struct EventReducer;

impl EventReducer {
    /// Creates a new `EventReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn validate_title(title: &str) -> Result<(), String> {
        let len = title.trim().chars().count();
        if len == 0 {
            return Err("Event title cannot be empty".to_string());
        }
        if len > MAX_TITLE_LEN {
            return Err(format!(
                "Event title too long: {len} characters (max {MAX_TITLE_LEN})"
            ));
        }
        Ok(())
    }

    fn validate_schedule(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Result<(), String> {
        if starts_at >= ends_at {
            return Err("Event must end after it starts".to_string());
        }
        Ok(())
    }

    fn validate_create(
        state: &EventState,
        title: &str,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), String> {
        if state.event.is_some() {
            return Err("Event already exists".to_string());
        }
        Self::validate_title(title)?;
        Self::validate_schedule(starts_at, ends_at)?;
        if starts_at <= now {
            return Err("Event must start in the future".to_string());
        }
        Ok(())
    }

    fn validate_update(
        event: &Event,
        changes: &EventChanges,
        now: DateTime<Utc>,
    ) -> Result<(), String> {
        if !matches!(event.status, EventStatus::Draft | EventStatus::Live) {
            return Err(format!("Cannot update event with status {:?}", event.status));
        }
        if changes.is_empty() {
            return Err("No fields to update".to_string());
        }
        if let Some(title) = &changes.title {
            Self::validate_title(title)?;
        }
        let starts_at = changes.starts_at.unwrap_or(event.starts_at);
        let ends_at = changes.ends_at.unwrap_or(event.ends_at);
        Self::validate_schedule(starts_at, ends_at)?;
        if changes.starts_at.is_some() && starts_at <= now {
            return Err("Event must start in the future".to_string());
        }
        Ok(())
    }

    fn validate_publish(
        event: &Event,
        ticket_type_count: usize,
        has_paid_ticket_types: bool,
        payments_enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<(), String> {
        if event.status != EventStatus::Draft {
            return Err(format!(
                "Event must be in Draft status to publish (current: {:?})",
                event.status
            ));
        }
        if ticket_type_count == 0 {
            return Err("Event needs at least one ticket type before publishing".to_string());
        }
        if has_paid_ticket_types && !payments_enabled {
            return Err(
                "Connect a payment account that can receive payments before selling paid tickets"
                    .to_string(),
            );
        }
        if event.ends_at <= now {
            return Err("Cannot publish an event that is already over".to_string());
        }
        Ok(())
    }

    fn validate_fee_override(fee_override: Option<&FeeOverride>) -> Result<(), String> {
        if let Some(bp) = fee_override.and_then(|o| o.platform_fee_bp) {
            if bp > 10_000 {
                return Err(format!("Platform fee cannot exceed 100% (got {bp} bp)"));
            }
        }
        Ok(())
    }

    fn fail(state: &mut EventState, error: String) -> SmallVec<[EventEffect; 4]> {
        state.last_error = Some(error);
        SmallVec::new()
    }
}

impl Reducer for EventReducer {
    type State = EventState;
    type Action = EventAction;
    type Environment = EventEnvironment;
    type Effect = EventEffect;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Self::Effect; 4]> {
        let now = env.clock.now();

        if let EventAction::Create {
            id,
            organization_id,
            title,
            slug,
            description,
            venue,
            starts_at,
            ends_at,
            created_by,
        } = action
        {
            if let Err(error) = Self::validate_create(state, &title, starts_at, ends_at, now) {
                return Self::fail(state, error);
            }
            state.event = Some(Event {
                id,
                organization_id,
                title: title.trim().to_string(),
                slug,
                description,
                venue,
                starts_at,
                ends_at,
                status: EventStatus::Draft,
                fee_override: None,
                created_by,
                created_at: now,
                updated_at: now,
                published_at: None,
            });
            state.last_error = None;
            return smallvec![EventEffect::Persist];
        }

        let Some(event) = state.event.as_mut() else {
            return Self::fail(state, "Event does not exist".to_string());
        };

        let result = match action {
            EventAction::Create { .. } => Err("Event already exists".to_string()),

            EventAction::Update { changes } => {
                Self::validate_update(event, &changes, now).map(|()| {
                    if let Some(title) = changes.title {
                        event.title = title.trim().to_string();
                    }
                    if let Some(description) = changes.description {
                        event.description = description;
                    }
                    if let Some(venue) = changes.venue {
                        event.venue = venue;
                    }
                    if let Some(starts_at) = changes.starts_at {
                        event.starts_at = starts_at;
                    }
                    if let Some(ends_at) = changes.ends_at {
                        event.ends_at = ends_at;
                    }
                    smallvec![EventEffect::Persist]
                })
            }

            EventAction::Publish {
                ticket_type_count,
                has_paid_ticket_types,
                payments_enabled,
            } => Self::validate_publish(
                event,
                ticket_type_count,
                has_paid_ticket_types,
                payments_enabled,
                now,
            )
            .map(|()| {
                event.status = EventStatus::Live;
                event.published_at = Some(now);
                smallvec![EventEffect::Persist]
            }),

            EventAction::End => {
                if event.status == EventStatus::Live {
                    event.status = EventStatus::Ended;
                    Ok(smallvec![EventEffect::Persist])
                } else {
                    Err(format!(
                        "Only live events can end (current: {:?})",
                        event.status
                    ))
                }
            }

            EventAction::Cancel => {
                if matches!(event.status, EventStatus::Draft | EventStatus::Live) {
                    event.status = EventStatus::Cancelled;
                    Ok(smallvec![
                        EventEffect::Persist,
                        EventEffect::CancelOpenOrders { event_id: event.id }
                    ])
                } else {
                    Err(format!(
                        "Cannot cancel event with status {:?}",
                        event.status
                    ))
                }
            }

            EventAction::SetFeeOverride { fee_override } => {
                Self::validate_fee_override(fee_override.as_ref()).map(|()| {
                    event.fee_override = fee_override;
                    smallvec![EventEffect::Persist]
                })
            }
        };

        match result {
            Ok(effects) => {
                event.updated_at = now;
                state.last_error = None;
                effects
            }
            Err(error) => Self::fail(state, error),
        }
    }
}
