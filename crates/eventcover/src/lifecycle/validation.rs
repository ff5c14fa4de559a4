use chrono::{DateTime, Duration, Utc};

use super::domain::{EventDetails, PolicyHolderDetails, QuoteDetails, VenueDetails};
use crate::pricing::{MAX_COVERAGE_LEVEL, MIN_COVERAGE_LEVEL};

/// Minimum notice before the event date.
pub const MIN_LEAD_TIME_HOURS: i64 = 48;
/// Furthest an event may be booked ahead.
pub const MAX_BOOKING_WINDOW_DAYS: i64 = 730;

/// Input rejected before it reaches the repository.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("coverage level {0} is outside 1-10")]
    CoverageLevel(u8),
    #[error("liquor liability requires a liability option")]
    LiquorWithoutLiability,
    #[error("event date must be at least 48 hours away")]
    EventTooSoon,
    #[error("event date must be within 730 days")]
    EventTooFar,
    #[error("email address '{0}' is not valid")]
    Email(String),
    #[error("payment amount must be positive")]
    PaymentAmount,
}

pub(crate) fn validate_quote(
    details: &QuoteDetails,
    now: DateTime<Utc>,
) -> Result<(), ValidationError> {
    require("resident_state", &details.resident_state)?;
    require("event_type", &details.event_type)?;
    require("email", &details.email)?;

    if !(MIN_COVERAGE_LEVEL..=MAX_COVERAGE_LEVEL).contains(&details.coverage_level) {
        return Err(ValidationError::CoverageLevel(details.coverage_level));
    }
    if details.liquor_liability && !details.liability_option.is_selected() {
        return Err(ValidationError::LiquorWithoutLiability);
    }

    let earliest = (now + Duration::hours(MIN_LEAD_TIME_HOURS)).date_naive();
    let latest = now.date_naive() + Duration::days(MAX_BOOKING_WINDOW_DAYS);
    if details.event_date < earliest {
        return Err(ValidationError::EventTooSoon);
    }
    if details.event_date > latest {
        return Err(ValidationError::EventTooFar);
    }

    let email = details.email.trim();
    if is_plausible_email(email) {
        Ok(())
    } else {
        Err(ValidationError::Email(email.to_string()))
    }
}

/// One `@`, a non-empty local part, and a dotted domain with no empty labels.
fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

pub(crate) fn validate_event(
    event: &EventDetails,
    venue: &VenueDetails,
) -> Result<(), ValidationError> {
    validate_event_details(event)?;
    validate_venue(venue)
}

pub(crate) fn validate_event_details(event: &EventDetails) -> Result<(), ValidationError> {
    require("honoree1_first_name", &event.honoree1_first_name)?;
    require("honoree1_last_name", &event.honoree1_last_name)?;
    require("ceremony_location_type", &event.ceremony_location_type)
}

pub(crate) fn validate_venue(venue: &VenueDetails) -> Result<(), ValidationError> {
    require("venue.name", &venue.name)?;
    require("venue.address1", &venue.address1)?;
    require("venue.city", &venue.city)?;
    require("venue.state", &venue.state)?;
    require("venue.zip", &venue.zip)?;
    require("venue.country", &venue.country)
}

pub(crate) fn validate_policy_holder(
    holder: &PolicyHolderDetails,
) -> Result<(), ValidationError> {
    require("first_name", &holder.first_name)?;
    require("last_name", &holder.last_name)?;
    require("phone", &holder.phone)?;
    require("address", &holder.address)?;
    require("city", &holder.city)?;
    require("state", &holder.state)?;
    require("zip", &holder.zip)?;
    require("country", &holder.country)?;
    if !holder.legal_notices_accepted {
        return Err(ValidationError::MissingField("legal_notices_accepted"));
    }
    Ok(())
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(())
    }
}
