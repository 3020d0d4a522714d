//! Application services.
//!
//! Each operation validates its input, checks the caller's role, runs the
//! relevant reducer or repository call and shapes the result. Callers that
//! need the `{success, data|error}` shape wrap results in
//! [`ServiceResponse`].

pub mod authorization;
pub mod envelope;
pub mod event;
pub mod fee;
pub mod invoice;
pub mod order;
pub mod organization;
pub mod payments;
pub mod ticket;
pub mod ticket_type;
pub mod user;

pub use authorization::{Authorizer, Permission};
pub use envelope::{ErrorBody, ServiceResponse};
pub use event::{EventService, NewEvent, PublicEvent, SalesSummary, TicketTypeSales};
pub use fee::FeeService;
pub use invoice::InvoiceService;
pub use order::{CheckoutItem, CheckoutRequest, CheckoutResult, OrderReceipt, OrderService};
pub use organization::{MemberView, OrganizationService, OrganizationView};
pub use payments::PaymentConnections;
pub use ticket::{IssuedTicket, ScanOutcome, TicketService};
pub use ticket_type::{PublicTicketType, TicketTypeInput, TicketTypeService};
pub use user::UserService;

use crate::error::{Result, TicketingError};
use crate::repository::EventRepository;
use crate::types::{Event, EventId, UserId};

/// Longest slug generated from a name.
const MAX_SLUG_LEN: usize = 60;

/// Turn a name into a URL slug: lowercase ASCII letters and digits separated
/// by single dashes. Returns `fallback` if nothing usable is left.
pub(crate) fn slugify(name: &str, fallback: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        fallback.to_string()
    } else {
        slug.to_string()
    }
}

/// `base` for the first attempt, then `base-2`, `base-3`, ...
pub(crate) fn slug_candidate(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        base.to_string()
    } else {
        format!("{base}-{attempt}")
    }
}

/// Trim and lowercase an e-mail address, rejecting obvious garbage.
pub(crate) fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
        })
        && !email.chars().any(char::is_whitespace);
    if valid {
        Ok(email)
    } else {
        Err(TicketingError::Validation(format!("Invalid e-mail address: {email}")))
    }
}

/// Trim a required text field and bound its length.
pub(crate) fn required_text(field: &str, value: &str, max: usize) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(TicketingError::Validation(format!("{field} cannot be empty")));
    }
    if value.chars().count() > max {
        return Err(TicketingError::Validation(format!(
            "{field} cannot be longer than {max} characters"
        )));
    }
    Ok(value.to_string())
}

/// Load an event the user may act on with `permission`.
///
/// Non-members get `NotFound`, members without the permission `Forbidden`.
pub(crate) async fn authorized_event(
    events: &dyn EventRepository,
    authorizer: &Authorizer,
    user_id: UserId,
    event_id: EventId,
    permission: Permission,
) -> Result<Event> {
    let event = events
        .get_event_for_user(event_id, user_id)
        .await?
        .ok_or_else(|| TicketingError::not_found("event", event_id))?;
    authorizer
        .require(user_id, event.organization_id, permission)
        .await?;
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs() {
        assert_eq!(slugify("Summer Fest 2025!", "event"), "summer-fest-2025");
        assert_eq!(slugify("  --Café  Noir-- ", "event"), "caf-noir");
        assert_eq!(slugify("???", "event"), "event");
        assert!(slugify(&"long ".repeat(40), "event").len() <= MAX_SLUG_LEN);
        assert_eq!(slug_candidate("fest", 1), "fest");
        assert_eq!(slug_candidate("fest", 3), "fest-3");
    }

    #[test]
    fn emails() {
        assert_eq!(normalize_email(" Jan@Example.NL ").ok().as_deref(), Some("jan@example.nl"));
        for bad in ["", "jan", "@example.nl", "jan@localhost", "jan@.nl", "j an@example.nl", "a@b@c.nl"] {
            assert!(normalize_email(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn required_text_trims_and_bounds() {
        assert_eq!(required_text("Name", "  VIP ", 10).ok().as_deref(), Some("VIP"));
        assert!(required_text("Name", "   ", 10).is_err());
        assert!(required_text("Name", "abcdefghijk", 10).is_err());
    }
}
